//! Shutdown signalling for spigot.
//!
//! The dispatch loop runs until told otherwise, so something must be able to
//! tell it otherwise. The mechanism here has two components, a
//! [`Broadcaster`] and a [`Watcher`]. The `Broadcaster` fires exactly once,
//! at shutdown; any number of `Watcher` instances observe the signal. A
//! `Watcher` may be cloned freely and a clone made after the signal fires
//! still observes it.

use tokio::sync::broadcast;

/// Construct a connected `Watcher` and `Broadcaster` pair.
#[must_use]
pub fn signal() -> (Watcher, Broadcaster) {
    let (sender, receiver) = broadcast::channel(1);
    (Watcher { receiver }, Broadcaster { sender })
}

/// Mechanism to notify one or more [`Watcher`] instances that shutdown has
/// begun.
#[derive(Debug)]
pub struct Broadcaster {
    sender: broadcast::Sender<()>,
}

impl Broadcaster {
    /// Fire the signal. Consumes the broadcaster: the signal is one-shot.
    pub fn signal(self) {
        // No value ever travels the channel; closing it is the signal and
        // wakes every watcher blocked in `recv`.
        drop(self.sender);
    }
}

/// Mechanism to wait for the shutdown signal.
#[derive(Debug)]
pub struct Watcher {
    receiver: broadcast::Receiver<()>,
}

impl Watcher {
    /// Wait until the paired [`Broadcaster`] signals.
    pub async fn recv(mut self) {
        // The only possible results are Closed -- the signal itself -- and
        // Lagged, which cannot happen on a channel that never carries a
        // value.
        let _ = self.receiver.recv().await;
    }
}

impl Clone for Watcher {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.resubscribe(),
        }
    }
}
