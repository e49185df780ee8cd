//! Stop signal shared by `main`, the signal handler and the HTTP server.

use std::sync::Arc;

use tokio::sync::watch;

/// Latching stop flag. Once triggered it stays triggered, so a listener
/// that starts waiting late still returns at once.
#[derive(Debug, Clone)]
pub struct Shutdown {
    flag: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn trigger(&self) {
        self.flag.send_replace(true);
    }

    /// Resolves once `trigger` has been called on any clone.
    pub async fn wait(&self) {
        let mut fired = self.flag.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = fired.wait_for(|fired| *fired).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
