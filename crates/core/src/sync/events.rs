use crate::domain::MetricSnapshot;
use tokio::sync::mpsc;

/// Receives pipeline updates. Implementations must not block.
pub trait SyncObserver: Send + Sync {
    /// The full merged list after any change, in merge order.
    fn on_snapshot_list_updated(&self, list: &[MetricSnapshot]);

    fn on_progress(&self, message: &str);
}

/// Logs updates through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_snapshot_list_updated(&self, list: &[MetricSnapshot]) {
        tracing::debug!(count = list.len(), "snapshot list updated");
    }

    fn on_progress(&self, message: &str) {
        tracing::info!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    ListUpdated(Vec<MetricSnapshot>),
    Progress(String),
}

/// Forwards updates over an unbounded channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SyncObserver for ChannelObserver {
    fn on_snapshot_list_updated(&self, list: &[MetricSnapshot]) {
        let _ = self.tx.send(SyncEvent::ListUpdated(list.to_vec()));
    }

    fn on_progress(&self, message: &str) {
        let _ = self.tx.send(SyncEvent::Progress(message.to_string()));
    }
}
