use std::sync::Arc;
use tokio::sync::watch;

/// Tells list views that delivery records changed.
///
/// Holds a generation counter; subscribers wake whenever it moves. Cloning shares the counter.
#[derive(Clone, Debug)]
pub struct RefreshSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn notify(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}
