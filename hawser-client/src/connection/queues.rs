//! Pending and parked outgoing-message queues.
//!
//! Two ordered maps keyed by [`MsgSeq`]: `pending` holds messages the
//! write loop should send next, `unsent` holds messages a send attempt
//! left behind. A message sits in at most one of the two; sequence
//! numbers are assigned on first entry and never change, so ordering
//! survives parking and requeueing.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::outgoing::{MsgSeq, OutgoingMessage};

/// The connection's outgoing queues.
#[derive(Debug)]
pub struct PendingQueues {
    next_seq: MsgSeq,
    pending: BTreeMap<MsgSeq, Rc<OutgoingMessage>>,
    unsent: BTreeMap<MsgSeq, Rc<OutgoingMessage>>,
}

impl PendingQueues {
    /// Empty queues with sequence numbering starting at 1.
    pub fn new() -> Self {
        Self {
            next_seq: MsgSeq::new(1),
            pending: BTreeMap::new(),
            unsent: BTreeMap::new(),
        }
    }

    fn seq_for(&mut self, message: &OutgoingMessage) -> MsgSeq {
        match message.seq() {
            Some(seq) => seq,
            None => {
                let seq = self.next_seq;
                self.next_seq = self.next_seq.next();
                message.assign_seq(seq);
                seq
            }
        }
    }

    /// Append a message to the pending queue, assigning a sequence on
    /// first entry. A parked copy under the same sequence is dropped.
    pub fn push(&mut self, message: Rc<OutgoingMessage>) -> MsgSeq {
        let seq = self.seq_for(&message);
        self.unsent.remove(&seq);
        self.pending.insert(seq, message);
        seq
    }

    /// Next message to send, lowest sequence first.
    pub fn pop_pending(&mut self) -> Option<Rc<OutgoingMessage>> {
        self.pending.pop_first().map(|(_, message)| message)
    }

    /// Park a message whose send attempt did not complete.
    pub fn park_unsent(&mut self, message: Rc<OutgoingMessage>) {
        let seq = self.seq_for(&message);
        self.pending.remove(&seq);
        self.unsent.insert(seq, message);
    }

    /// Move every parked message back into the pending queue, keeping
    /// sequence order. Returns how many moved.
    pub fn restore_unsent(&mut self) -> usize {
        let moved = self.unsent.len();
        self.pending.append(&mut self.unsent);
        moved
    }

    /// Remove and return every parked message, in sequence order.
    pub fn take_unsent(&mut self) -> Vec<Rc<OutgoingMessage>> {
        std::mem::take(&mut self.unsent).into_values().collect()
    }

    /// Remove and return every unsettled unencrypted message, in
    /// sequence order, from both queues.
    pub fn take_unencrypted(&mut self) -> Vec<Rc<OutgoingMessage>> {
        let mut taken = Vec::new();
        for queue in [&mut self.pending, &mut self.unsent] {
            queue.retain(|_, message| {
                if message.unencrypted() && !message.is_settled() {
                    taken.push(Rc::clone(message));
                    false
                } else {
                    true
                }
            });
        }
        taken.sort_by_key(|message| message.seq());
        taken
    }

    /// Drop settled messages from both queues. Returns how many dropped.
    pub fn prune_settled(&mut self) -> usize {
        let before = self.pending.len() + self.unsent.len();
        self.pending.retain(|_, message| !message.is_settled());
        self.unsent.retain(|_, message| !message.is_settled());
        before - self.pending.len() - self.unsent.len()
    }

    /// Messages waiting to be sent.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Messages parked after an interrupted send.
    pub fn unsent_len(&self) -> usize {
        self.unsent.len()
    }

    /// Whether both queues are empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.unsent.is_empty()
    }
}

impl Default for PendingQueues {
    fn default() -> Self {
        Self::new()
    }
}
