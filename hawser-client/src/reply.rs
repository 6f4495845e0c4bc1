//! Reply handles: single-threaded promise/future pairs.
//!
//! Every outgoing message carries a [`ReplyPromise`] that the external
//! response pipeline fulfills once the server answers (or the message
//! fails). Callers hold [`ReplyFuture`] subscriptions; futures are cheap
//! clones of the same slot, so a resend can hand back the same pending
//! handle without re-arming anything.
//!
//! If the promise is dropped without being fulfilled, every subscriber
//! resolves with [`ReplyError::BrokenPromise`].

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors delivered through a reply handle.
///
/// Serializable, since a remote failure arrives over the wire before it
/// is handed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ReplyError {
    /// The promise side was dropped without ever being fulfilled.
    #[error("reply promise dropped without fulfillment")]
    BrokenPromise,

    /// The message could not survive a transport swap and was discarded
    /// before it was ever sent.
    #[error("interrupted by reconnection before the message was sent")]
    Interrupted,

    /// The remote side answered with a failure.
    #[error("remote failure: {message}")]
    Remote {
        /// Failure text reported by the remote side.
        message: String,
    },
}

/// Shared single-assignment slot behind a reply pair.
struct ReplySlot<T> {
    value: RefCell<Option<Result<T, ReplyError>>>,
    wakers: RefCell<Vec<Waker>>,
}

impl<T> ReplySlot<T> {
    fn new() -> Self {
        Self {
            value: RefCell::new(None),
            wakers: RefCell::new(Vec::new()),
        }
    }

    /// Record the result and wake all subscribers. Returns false when a
    /// result was already recorded.
    fn fulfill(&self, value: Result<T, ReplyError>) -> bool {
        {
            let mut slot = self.value.borrow_mut();
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
        }
        for waker in self.wakers.borrow_mut().drain(..) {
            waker.wake();
        }
        true
    }
}

/// Create a connected promise/future pair.
pub fn reply_pair<T: Clone>() -> (ReplyPromise<T>, ReplyFuture<T>) {
    let slot = Rc::new(ReplySlot::new());
    (
        ReplyPromise { slot: slot.clone() },
        ReplyFuture { slot },
    )
}

/// Fulfilling half of a reply pair.
///
/// Consumed on `send`/`fail`, preventing double resolution. Dropping an
/// unfulfilled promise resolves every subscriber with
/// [`ReplyError::BrokenPromise`].
pub struct ReplyPromise<T: Clone> {
    slot: Rc<ReplySlot<T>>,
}

impl<T: Clone> ReplyPromise<T> {
    /// Resolve every subscriber with a success value.
    pub fn send(self, value: T) {
        self.slot.fulfill(Ok(value));
    }

    /// Resolve every subscriber with an error.
    pub fn fail(self, error: ReplyError) {
        self.slot.fulfill(Err(error));
    }

    /// Whether a result has been recorded.
    pub fn is_fulfilled(&self) -> bool {
        self.slot.value.borrow().is_some()
    }

    /// A new subscription resolving when this promise is fulfilled.
    pub fn subscribe(&self) -> ReplyFuture<T> {
        ReplyFuture {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Clone> Drop for ReplyPromise<T> {
    fn drop(&mut self) {
        if self.slot.fulfill(Err(ReplyError::BrokenPromise)) {
            tracing::debug!("reply promise dropped without fulfillment");
        }
    }
}

/// Suspending half of a reply pair.
///
/// Clones subscribe to the same slot; all of them observe the same result.
pub struct ReplyFuture<T: Clone> {
    slot: Rc<ReplySlot<T>>,
}

impl<T: Clone> Clone for ReplyFuture<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Clone> ReplyFuture<T> {
    /// The recorded result, if the pair has already resolved.
    pub fn peek(&self) -> Option<Result<T, ReplyError>> {
        self.slot.value.borrow().clone()
    }
}

impl<T: Clone> Future for ReplyFuture<T> {
    type Output = Result<T, ReplyError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(result) = self.slot.value.borrow().as_ref() {
            return Poll::Ready(result.clone());
        }
        // Register the waker; woken and drained on fulfillment.
        self.slot.wakers.borrow_mut().push(cx.waker().clone());
        Poll::Pending
    }
}
