//! Subscription handle types.

use std::fmt;
use std::time::Duration;

/// Opaque handle returned by `subscribe`.
///
/// The generation distinguishes successive occupants of the same slot, so
/// unsubscribing with a stale id never removes a newer observer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({}v{})", self.slot, self.generation)
    }
}

/// Receiving end of a channel subscription.
///
/// The registry drops the subscription once the buffer fills up, after
/// which `recv` reports a disconnect.
pub struct EventReceiver<E> {
    pub id: SubscriptionId,
    pub(crate) receiver: crossbeam_channel::Receiver<E>,
}

impl<E> EventReceiver<E> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<E, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<E, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<E, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<E> {
        self.receiver.try_iter().collect()
    }
}
