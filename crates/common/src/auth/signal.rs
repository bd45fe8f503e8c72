//! Forced-logout broadcast
//!
//! Raised by the request gateway when a session cannot be restored; the
//! session controller subscribes and tears down local state. Any number of
//! subscribers may listen, and raising with no subscribers is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

const CHANNEL_CAPACITY: usize = 16;

/// Cloneable handle to the logout channel
#[derive(Debug, Clone)]
pub struct LogoutSignal {
    sender: broadcast::Sender<()>,
    raised: Arc<AtomicU64>,
}

impl Default for LogoutSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl LogoutSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, raised: Arc::new(AtomicU64::new(0)) }
    }

    /// Notify every current subscriber.
    pub fn raise(&self) {
        self.raised.fetch_add(1, Ordering::SeqCst);
        let listeners = self.sender.receiver_count();
        info!(listeners, "forced logout raised");
        // No subscribers is fine.
        let _ = self.sender.send(());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Number of times [`LogoutSignal::raise`] has been called on this
    /// channel.
    pub fn raised_count(&self) -> u64 {
        self.raised.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_the_raise() {
        let signal = LogoutSignal::new();
        let mut first = signal.subscribe();
        let mut second = signal.clone().subscribe();

        signal.raise();

        first.recv().await.unwrap();
        second.recv().await.unwrap();
        assert_eq!(signal.raised_count(), 1);
    }

    #[test]
    fn raise_without_subscribers_is_counted() {
        let signal = LogoutSignal::default();
        signal.raise();
        signal.raise();
        assert_eq!(signal.raised_count(), 2);
    }
}
