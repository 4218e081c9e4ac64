use std::sync::Arc;

use tokio::sync::watch;

use crate::catalog::CatalogSnapshot;

/// The only handle that can publish snapshots.
#[derive(Debug)]
pub struct CatalogWriter {
    sender: watch::Sender<Arc<CatalogSnapshot>>,
}

/// Cheap, cloneable reader. Holding a snapshot never blocks the writer.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    receiver: watch::Receiver<Arc<CatalogSnapshot>>,
}

impl CatalogWriter {
    pub fn new(initial: CatalogSnapshot) -> (Self, CatalogCache) {
        let (sender, receiver) = watch::channel(Arc::new(initial));
        (Self { sender }, CatalogCache { receiver })
    }

    pub fn current(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.sender.borrow())
    }

    /// Swaps in a new snapshot. Readers already holding the old one keep it.
    pub fn publish(&self, snapshot: CatalogSnapshot) {
        self.sender.send_replace(Arc::new(snapshot));
    }
}

impl CatalogCache {
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.receiver.borrow())
    }
}
