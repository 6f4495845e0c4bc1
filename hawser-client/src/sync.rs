//! Broadcast-once coordination cell.
//!
//! [`StartCell`] backs the one-time start sequence of a connection: the
//! first writer records a result exactly once, and any number of waiters
//! observe the identical clone, whether they subscribed before or after
//! assignment.

use std::cell::RefCell;

use tokio::sync::Notify;

/// Single-assignment result cell with broadcast wake.
///
/// Single-threaded: interior mutability via `RefCell`, wakeups via
/// [`Notify::notify_waiters`]. No borrow is held across a suspension
/// point.
pub struct StartCell<T: Clone> {
    value: RefCell<Option<T>>,
    changed: Notify,
}

impl<T: Clone> StartCell<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            value: RefCell::new(None),
            changed: Notify::new(),
        }
    }

    /// The recorded value, if any.
    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    /// Record the value and wake all waiters.
    ///
    /// Returns false (discarding `value`) when the cell was already
    /// assigned; the first assignment wins.
    pub fn set(&self, value: T) -> bool {
        {
            let mut slot = self.value.borrow_mut();
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
        }
        self.changed.notify_waiters();
        true
    }

    /// Whether the cell has been assigned.
    pub fn is_set(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Wait until the cell is assigned and return a clone of the value.
    ///
    /// Returns immediately for a cell that is already assigned.
    pub async fn wait(&self) -> T {
        loop {
            // Register for the wakeup before re-checking, otherwise an
            // assignment between check and await would be lost.
            let notified = self.changed.notified();
            if let Some(value) = self.get() {
                return value;
            }
            notified.await;
        }
    }
}

impl<T: Clone> Default for StartCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
