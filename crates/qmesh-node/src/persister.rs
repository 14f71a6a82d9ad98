//! Background snapshot writer
//!
//! Workers only mark the table dirty. A single task owns all writes, so
//! saves never interleave and a burst of updates collapses into one save.
//! The task runs until its stop signal, then flushes one last time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, warn};

use qmesh_storage::SnapshotStore;

use crate::state::NodeState;

/// Handle workers use to request a save
#[derive(Debug, Clone, Default)]
pub struct SaveTrigger {
    notify: Arc<Notify>,
}

impl SaveTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a save of the current table
    ///
    /// Requests made while a save is pending are merged into it.
    pub fn mark_dirty(&self) {
        self.notify.notify_one();
    }
}

/// Background snapshot writer task
pub struct SnapshotWriter {
    state: Arc<NodeState>,
    store: Arc<dyn SnapshotStore>,
    trigger: SaveTrigger,
    debounce: Duration,
    /// Table version of the last completed save
    saved_version: u64,
}

impl SnapshotWriter {
    pub fn new(
        state: Arc<NodeState>,
        store: Arc<dyn SnapshotStore>,
        trigger: SaveTrigger,
        debounce: Duration,
    ) -> Self {
        let saved_version = state.table().version();
        Self {
            state,
            store,
            trigger,
            debounce,
            saved_version,
        }
    }

    /// Spawn the writer as a background task
    pub fn spawn(
        state: Arc<NodeState>,
        store: Arc<dyn SnapshotStore>,
        trigger: SaveTrigger,
        debounce: Duration,
        stop_rx: oneshot::Receiver<()>,
        span: Span,
    ) -> JoinHandle<()> {
        let writer = Self::new(state, store, trigger, debounce);
        tokio::spawn(writer.run(stop_rx).instrument(span))
    }

    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        debug!(debounce_ms = self.debounce.as_millis() as u64, "Snapshot writer started");

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = self.trigger.notify.notified() => {
                    if !self.debounce.is_zero() {
                        tokio::select! {
                            _ = &mut stop_rx => break,
                            _ = tokio::time::sleep(self.debounce) => {}
                        }
                    }
                    self.save_if_changed().await;
                }
            }
        }

        self.save_if_changed().await;
        info!(version = self.saved_version, "Snapshot writer stopped");
    }

    /// Save the table if it changed since the last completed save
    pub async fn save_if_changed(&mut self) -> bool {
        let (version, snapshot) = self.state.table().snapshot_versioned();
        if version == self.saved_version {
            return false;
        }
        match self.store.save(self.state.name(), &snapshot).await {
            Ok(()) => {
                debug!(version, destinations = snapshot.len(), "Cost table saved");
                self.saved_version = version;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save cost table");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmesh_core::Address;
    use qmesh_storage::InMemorySnapshotStore;

    use crate::config::NodeConfig;

    async fn setup() -> (Arc<NodeState>, Arc<InMemorySnapshotStore>) {
        let store = Arc::new(InMemorySnapshotStore::new());
        let config = NodeConfig::new(Address::v4(10, 0, 1, 1)).with_name("h11");
        let state = NodeState::load(&config, store.as_ref()).await.unwrap();
        (Arc::new(state), store)
    }

    #[tokio::test]
    async fn test_unchanged_table_is_not_saved() {
        let (state, store) = setup().await;
        let mut writer = SnapshotWriter::new(state, store.clone(), SaveTrigger::new(), Duration::ZERO);
        assert!(!writer.save_if_changed().await);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_save_after_change() {
        let (state, store) = setup().await;
        let mut writer =
            SnapshotWriter::new(state.clone(), store.clone(), SaveTrigger::new(), Duration::ZERO);

        let dest = Address::v4(10, 0, 3, 3);
        state.table().set(&dest, &Address::v4(10, 0, 1, 2), 3.5);

        assert!(writer.save_if_changed().await);
        assert!(!writer.save_if_changed().await);
        assert_eq!(store.save_count(), 1);
        assert_eq!(
            store.get("h11").unwrap().get(&dest, &Address::v4(10, 0, 1, 2)),
            Some(3.5)
        );
    }

    #[tokio::test]
    async fn test_stop_flushes_pending_changes() {
        let (state, store) = setup().await;
        let trigger = SaveTrigger::new();
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = SnapshotWriter::spawn(
            state.clone(),
            store.clone(),
            trigger.clone(),
            Duration::from_secs(3600),
            stop_rx,
            Span::none(),
        );

        state.table().ensure(&Address::v4(10, 0, 2, 2));
        stop_tx.send(()).unwrap();
        handle.await.unwrap();

        let saved = store.get("h11").unwrap();
        assert!(saved.row(&Address::v4(10, 0, 2, 2)).is_some());
    }

    #[tokio::test]
    async fn test_trigger_saves_in_background() {
        let (state, store) = setup().await;
        let trigger = SaveTrigger::new();
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = SnapshotWriter::spawn(
            state.clone(),
            store.clone(),
            trigger.clone(),
            Duration::ZERO,
            stop_rx,
            Span::none(),
        );

        state.table().ensure(&Address::v4(10, 0, 3, 1));
        trigger.mark_dirty();

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.save_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(store.save_count(), 1);
    }
}
