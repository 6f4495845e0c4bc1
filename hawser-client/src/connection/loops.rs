//! Service-loop handles and the wake/signal contract.
//!
//! A connection runs up to six service loops. The connection owns one
//! [`LoopHandle`] per role, created on first use and kept for the life of
//! the connection object, so a loop body keeps its identity across
//! disconnect/reconnect cycles.
//!
//! The loop body itself lives outside the connection: it is spawned by
//! the embedder and blocks on [`LoopHandle::wait`]. Wakes are coalesced
//! through a single stored permit, so any number of
//! [`LoopHandle::resume`] calls between two waits produce exactly one
//! wake. Wakes may be spurious; bodies must re-check their condition.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tokio::sync::Notify;

/// The six service-loop roles of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopRole {
    /// Drains the pending queue onto the transport.
    Write,
    /// Pulls payloads off the transport.
    Read,
    /// Watches for stale reads and missed replies.
    Check,
    /// Drops settled messages from the queues.
    Cleanup,
    /// Keepalive pings on plain socket transports.
    Ping,
    /// Long-poll re-arming on HTTP transports.
    HttpWait,
}

impl LoopRole {
    /// Every role, in start order.
    pub const ALL: [LoopRole; 6] = [
        LoopRole::Write,
        LoopRole::Read,
        LoopRole::Check,
        LoopRole::Cleanup,
        LoopRole::Ping,
        LoopRole::HttpWait,
    ];

    /// Whether this role runs on a connection with the given traits.
    ///
    /// The core four always run. The long-poll loop only makes sense on
    /// HTTP transports; pings only on plain sockets that are neither
    /// media nor CDN connections.
    pub fn eligible(self, http: bool, media: bool, cdn: bool) -> bool {
        match self {
            LoopRole::Write | LoopRole::Read | LoopRole::Check | LoopRole::Cleanup => true,
            LoopRole::HttpWait => http,
            LoopRole::Ping => !http && !media && !cdn,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LoopRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopRole::Write => "write",
            LoopRole::Read => "read",
            LoopRole::Check => "check",
            LoopRole::Cleanup => "cleanup",
            LoopRole::Ping => "ping",
            LoopRole::HttpWait => "http_wait",
        };
        f.write_str(name)
    }
}

/// Out-of-band instruction delivered to a loop body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    /// Park until the connection comes back.
    Stop,
    /// The socket is gone and nothing more will be read from it.
    ///
    /// Sent to the read loop on disconnect in place of [`LoopSignal::Stop`].
    SocketEmpty,
}

/// What a call to [`LoopHandle::wait`] woke up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopWake {
    /// Plain wake; re-check the loop's work condition.
    Resumed,
    /// An out-of-band signal was delivered.
    Signal(LoopSignal),
}

/// Wake/signal endpoint for one service loop.
pub struct LoopHandle {
    role: LoopRole,
    started: Cell<bool>,
    wake: Notify,
    pending_signal: Cell<Option<LoopSignal>>,
}

impl LoopHandle {
    fn new(role: LoopRole) -> Self {
        Self {
            role,
            started: Cell::new(false),
            wake: Notify::new(),
            pending_signal: Cell::new(None),
        }
    }

    /// Role this handle belongs to.
    pub fn role(&self) -> LoopRole {
        self.role
    }

    /// Mark the loop started. Returns `true` on the first call only; the
    /// caller that sees `true` is responsible for spawning the body.
    pub fn start(&self) -> bool {
        !self.started.replace(true)
    }

    /// Whether a body has been started for this handle.
    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    /// Wake the loop body. Resumes between two waits coalesce into one
    /// wake.
    pub fn resume(&self) {
        self.wake.notify_one();
    }

    /// Deliver an out-of-band signal and wake the body.
    ///
    /// A later signal overwrites an undelivered earlier one.
    pub fn signal(&self, signal: LoopSignal) {
        self.pending_signal.set(Some(signal));
        self.wake.notify_one();
    }

    /// Take the pending signal without waiting.
    pub fn take_signal(&self) -> Option<LoopSignal> {
        self.pending_signal.take()
    }

    /// Discard any unconsumed signal and wake the body.
    ///
    /// Used when a connection comes back before the body consumed the
    /// stop from the previous teardown.
    pub fn revive(&self) {
        self.pending_signal.take();
        self.wake.notify_one();
    }

    /// Block until resumed or signaled.
    ///
    /// A pending signal wins over a stored wake permit.
    pub async fn wait(&self) -> LoopWake {
        if let Some(signal) = self.pending_signal.take() {
            return LoopWake::Signal(signal);
        }
        self.wake.notified().await;
        match self.pending_signal.take() {
            Some(signal) => LoopWake::Signal(signal),
            None => LoopWake::Resumed,
        }
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("role", &self.role)
            .field("started", &self.started.get())
            .field("pending_signal", &self.pending_signal.get())
            .finish_non_exhaustive()
    }
}

/// The connection's six loop slots.
///
/// Handles are created on first use and never replaced.
#[derive(Debug, Default)]
pub struct LoopSet {
    slots: [RefCell<Option<Rc<LoopHandle>>>; 6],
}

impl LoopSet {
    /// Handle for `role`, creating it if absent.
    pub fn ensure(&self, role: LoopRole) -> Rc<LoopHandle> {
        let mut slot = self.slots[role.index()].borrow_mut();
        Rc::clone(slot.get_or_insert_with(|| Rc::new(LoopHandle::new(role))))
    }

    /// Handle for `role`, if one was ever created.
    pub fn get(&self, role: LoopRole) -> Option<Rc<LoopHandle>> {
        self.slots[role.index()].borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[test]
    fn start_reports_first_call_only() {
        let set = LoopSet::default();
        let handle = set.ensure(LoopRole::Write);
        assert!(!handle.is_started());
        assert!(handle.start());
        assert!(!handle.start());
        assert!(handle.is_started());
    }

    #[test]
    fn handles_keep_identity_across_ensure() {
        let set = LoopSet::default();
        let first = set.ensure(LoopRole::Read);
        let again = set.ensure(LoopRole::Read);
        assert!(Rc::ptr_eq(&first, &again));
        let got = set.get(LoopRole::Read).expect("created handle");
        assert!(Rc::ptr_eq(&first, &got));
        assert!(set.get(LoopRole::Ping).is_none());
    }

    #[tokio::test]
    async fn resumes_coalesce_into_one_wake() {
        let set = LoopSet::default();
        let handle = set.ensure(LoopRole::Write);

        handle.resume();
        handle.resume();
        handle.resume();

        assert_eq!(handle.wait().await, LoopWake::Resumed);
        let second = timeout(Duration::from_millis(20), handle.wait()).await;
        assert!(second.is_err(), "coalesced wakes must not replay");
    }

    #[tokio::test]
    async fn signals_win_over_stored_permits() {
        let set = LoopSet::default();
        let handle = set.ensure(LoopRole::Read);

        handle.resume();
        handle.signal(LoopSignal::SocketEmpty);

        assert_eq!(
            handle.wait().await,
            LoopWake::Signal(LoopSignal::SocketEmpty)
        );
    }

    #[tokio::test]
    async fn revive_clears_stale_stops() {
        let set = LoopSet::default();
        let handle = set.ensure(LoopRole::Check);

        handle.signal(LoopSignal::Stop);
        handle.revive();

        assert_eq!(handle.wait().await, LoopWake::Resumed);
    }

    #[test]
    fn eligibility_follows_transport_traits() {
        // Plain socket, non-media: everything but the long-poll loop.
        for role in LoopRole::ALL {
            assert_eq!(role.eligible(false, false, false), role != LoopRole::HttpWait);
        }
        // HTTP transport: long-poll yes, ping no.
        assert!(LoopRole::HttpWait.eligible(true, false, false));
        assert!(!LoopRole::Ping.eligible(true, false, false));
        // Media and CDN sockets skip pings.
        assert!(!LoopRole::Ping.eligible(false, true, false));
        assert!(!LoopRole::Ping.eligible(false, false, true));
        assert!(LoopRole::Write.eligible(true, true, true));
    }
}
