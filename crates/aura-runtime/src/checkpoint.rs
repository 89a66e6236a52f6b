//! [`CheckpointScheduler`] – periodic persistence of the score table.
//!
//! The scheduler owns nothing but a handle to the shared
//! [`KnowledgeStore`] and the [`SnapshotFile`] it writes to. Each cycle takes
//! a [`snapshot`][KnowledgeStore::snapshot] (holding the store lock only for
//! the copy) and hands the copy to a blocking thread for the file write, so
//! request handling never waits on disk I/O.
//!
//! Failed writes are logged and retried on the next tick at the same fixed
//! cadence. When the shutdown channel flips to `true` (or its sender is
//! dropped) the loop performs one final checkpoint and returns; callers bound
//! that flush with a timeout.

use std::sync::Arc;
use std::time::Duration;

use aura_memory::{KnowledgeStore, SnapshotFile};
use aura_types::AuraError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Default checkpoint period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct CheckpointScheduler {
    store: Arc<KnowledgeStore>,
    file: SnapshotFile,
    interval: Duration,
}

impl CheckpointScheduler {
    /// Create a scheduler writing `store` to `file` every `interval`.
    ///
    /// A zero interval is raised to one millisecond.
    pub fn new(store: Arc<KnowledgeStore>, file: SnapshotFile, interval: Duration) -> Self {
        Self {
            store,
            file,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn file(&self) -> &SnapshotFile {
        &self.file
    }

    /// Seed the store from the snapshot artifact.
    ///
    /// A missing artifact is the normal first-run case. An unreadable or
    /// malformed artifact is logged and the store is left as it was. Returns
    /// the number of restored actions.
    pub fn restore_on_startup(&self) -> usize {
        let path = self.file.path().display();
        let value = match self.file.load() {
            Ok(Some(value)) => value,
            Ok(None) => {
                info!(path = %path, "no snapshot found; starting with an empty knowledge base");
                return 0;
            }
            Err(e) => {
                warn!(path = %path, error = %e, "snapshot unreadable; starting with an empty knowledge base");
                return 0;
            }
        };

        match self.store.restore(&value) {
            Ok(count) => {
                info!(path = %path, actions = count, "knowledge base restored from snapshot");
                count
            }
            Err(e) => {
                warn!(path = %path, error = %e, "snapshot rejected; starting with an empty knowledge base");
                0
            }
        }
    }

    /// Write one snapshot now. Returns the number of actions written.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::PersistenceWrite`] if the artifact could not be
    /// written.
    pub async fn checkpoint(&self) -> Result<usize, AuraError> {
        let scores = self.store.snapshot();
        let count = scores.len();
        let file = self.file.clone();

        tokio::task::spawn_blocking(move || file.write(&scores))
            .await
            .map_err(|e| AuraError::PersistenceWrite(format!("checkpoint task failed: {e}")))??;
        Ok(count)
    }

    async fn checkpoint_logged(&self) {
        match self.checkpoint().await {
            Ok(count) => info!(
                path = %self.file.path().display(),
                actions = count,
                "checkpoint written"
            ),
            Err(e) => error!(
                path = %self.file.path().display(),
                error = %e,
                retry_in_secs = self.interval.as_secs_f64(),
                "checkpoint failed"
            ),
        }
    }

    /// Checkpoint every interval until `shutdown` becomes `true`, then flush
    /// once more and return.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        while !*shutdown.borrow_and_update() {
            tokio::select! {
                _ = ticker.tick() => self.checkpoint_logged().await,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("shutdown requested; writing final checkpoint");
        self.checkpoint_logged().await;
    }

    /// Run [`Self::run`] on its own task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
