//! Debounced snapshot persistence.
//!
//! One background task per engine owns all saves, so snapshots reach the
//! adapter in the order they were taken. Callers only ever enqueue a request
//! and never wait on storage, except for an explicit [`SnapshotWriter::flush`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::drill::config::PersistParams;
use crate::drill::persistence::SnapshotStore;
use crate::drill::store::WeightStore;
use crate::drill::types::Dojo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Debounce interval elapsed with no new changes.
    Debounce,
    /// Changes kept arriving until the max delay was reached.
    MaxDelay,
    /// Explicit flush, e.g. at the end of a drill session.
    Manual,
    /// Engine dropped with unsaved changes.
    Shutdown,
}

impl FlushReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            FlushReason::Debounce => "debounce",
            FlushReason::MaxDelay => "max_delay",
            FlushReason::Manual => "manual",
            FlushReason::Shutdown => "shutdown",
        }
    }
}

enum WriteRequest {
    Dirty,
    Flush(oneshot::Sender<bool>),
}

pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<WriteRequest>,
    degraded: Arc<AtomicBool>,
}

impl SnapshotWriter {
    /// Starts the writer task on the current tokio runtime.
    pub fn spawn(
        dojo: Dojo,
        storage: Arc<dyn SnapshotStore>,
        store: Arc<RwLock<WeightStore>>,
        params: PersistParams,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let degraded = Arc::new(AtomicBool::new(false));
        let task = WriterTask {
            dojo,
            storage,
            store,
            params,
            degraded: Arc::clone(&degraded),
        };
        tokio::spawn(task.run(rx));
        Self { tx, degraded }
    }

    /// Marks the store as changed. Never blocks.
    pub fn mark_dirty(&self) {
        if self.tx.send(WriteRequest::Dirty).is_err() {
            debug!("snapshot writer stopped, change kept in memory only");
        }
    }

    /// Saves pending changes now. Returns `false` when persistence is
    /// degraded or the save failed after retries.
    pub async fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriteRequest::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.await.unwrap_or(false)
    }

    /// True once saving has failed persistently; the session continues in
    /// memory only.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}

struct WriterTask {
    dojo: Dojo,
    storage: Arc<dyn SnapshotStore>,
    store: Arc<RwLock<WeightStore>>,
    params: PersistParams,
    degraded: Arc<AtomicBool>,
}

impl WriterTask {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<WriteRequest>) {
        let debounce = self.params.debounce();
        let max_delay = self.params.max_delay();
        let mut dirty_since: Option<Instant> = None;
        let mut deadline = Instant::now();

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(WriteRequest::Dirty) => {
                        let now = Instant::now();
                        let first = *dirty_since.get_or_insert(now);
                        deadline = (now + debounce).min(first + max_delay);
                    }
                    Some(WriteRequest::Flush(ack)) => {
                        let ok = if dirty_since.take().is_some() {
                            self.persist(FlushReason::Manual).await
                        } else {
                            !self.degraded.load(Ordering::SeqCst)
                        };
                        let _ = ack.send(ok);
                    }
                    None => {
                        if dirty_since.take().is_some() {
                            self.persist(FlushReason::Shutdown).await;
                        }
                        break;
                    }
                },
                () = sleep_until(deadline), if dirty_since.is_some() => {
                    let reason = match dirty_since.take() {
                        Some(first) if first.elapsed() >= max_delay => FlushReason::MaxDelay,
                        _ => FlushReason::Debounce,
                    };
                    self.persist(reason).await;
                }
            }
        }

        debug!(dojo = %self.dojo, "snapshot writer stopped");
    }

    async fn persist(&self, reason: FlushReason) -> bool {
        if self.degraded.load(Ordering::SeqCst) {
            debug!(dojo = %self.dojo, reason = reason.as_str(), "persistence degraded, skipping save");
            return false;
        }

        // Taken under the lock, so it always holds a complete prefix of the
        // applied outcomes.
        let snapshot = self.store.read().snapshot();
        let attempts = self.params.save_retries.saturating_add(1);
        let mut delay = self.params.retry_backoff();

        for attempt in 1..=attempts {
            match self.storage.save(self.dojo, &snapshot).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(dojo = %self.dojo, attempt, "snapshot saved after retry");
                    }
                    debug!(
                        dojo = %self.dojo,
                        reason = reason.as_str(),
                        records = snapshot.records.len(),
                        "snapshot saved"
                    );
                    return true;
                }
                Err(err) if attempt < attempts => {
                    warn!(dojo = %self.dojo, attempt, error = %err, "snapshot save failed, retrying");
                    sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(err) => {
                    warn!(
                        dojo = %self.dojo,
                        error = %err,
                        "snapshot save failed, continuing in memory only"
                    );
                    self.degraded.store(true, Ordering::SeqCst);
                }
            }
        }

        false
    }
}
