#![forbid(unsafe_code)]

use crate::domain::DetectionSnapshot;
use std::sync::Arc;
use tokio::sync::watch;

/// The most recently published [`DetectionSnapshot`].
///
/// Publishing swaps the shared reference; readers that already hold an
/// older `Arc` keep seeing exactly that snapshot.
#[derive(Debug, Clone)]
pub struct DetectionCache {
    tx: Arc<watch::Sender<Arc<DetectionSnapshot>>>,
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionCache {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(DetectionSnapshot::empty()));
        Self { tx: Arc::new(tx) }
    }

    /// Replace the visible snapshot.
    pub fn publish(&self, snapshot: DetectionSnapshot) -> Arc<DetectionSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    pub fn current(&self) -> Arc<DetectionSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Receiver that is notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DetectionSnapshot>> {
        self.tx.subscribe()
    }
}
