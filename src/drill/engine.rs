use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;

use crate::drill::config::DrillConfig;
use crate::drill::error::{DrillError, StorageError};
use crate::drill::persistence::SnapshotStore;
use crate::drill::selector::Selector;
use crate::drill::store::WeightStore;
use crate::drill::types::*;
use crate::drill::updater::apply_outcome;
use crate::drill::writer::SnapshotWriter;

struct Loaded {
    report: LoadReport,
    writer: SnapshotWriter,
}

/// Raises the loading flag for the lifetime of a load future. A load that is
/// dropped before finishing lowers it again, so a cancelled `ensure_loaded`
/// reports `Uninitialized` until the next caller restarts the load.
struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
    finished: bool,
}

impl<'a> LoadingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self {
            flag,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.flag.store(false, Ordering::SeqCst);
        }
    }
}

/// Item-selection engine for one dojo.
///
/// Lifecycle is `Uninitialized -> Loading -> Ready`. Everything except
/// [`DrillEngine::ensure_loaded`] is synchronous and fails with
/// [`DrillError::NotLoaded`] until the engine is ready; callers are expected
/// to await `ensure_loaded` once when a drill screen opens.
pub struct DrillEngine {
    dojo: Dojo,
    config: DrillConfig,
    storage: Arc<dyn SnapshotStore>,
    store: Arc<RwLock<WeightStore>>,
    selector: Mutex<Selector>,
    history: Mutex<RecentHistory>,
    loading: AtomicBool,
    loaded: OnceCell<Loaded>,
}

impl DrillEngine {
    pub fn new(dojo: Dojo, config: DrillConfig, storage: Arc<dyn SnapshotStore>) -> Self {
        Self::build(dojo, config, storage, None)
    }

    /// Engine whose draws are reproducible for a given seed.
    pub fn with_seed(
        dojo: Dojo,
        config: DrillConfig,
        storage: Arc<dyn SnapshotStore>,
        seed: u64,
    ) -> Self {
        Self::build(dojo, config, storage, Some(seed))
    }

    fn build(
        dojo: Dojo,
        config: DrillConfig,
        storage: Arc<dyn SnapshotStore>,
        seed: Option<u64>,
    ) -> Self {
        // The selector must see the repaired tunables, not the raw ones.
        let config = config.sanitized();
        let selector = match seed {
            Some(seed) => Selector::with_seed(config.direction.clone(), seed),
            None => Selector::new(config.direction.clone()),
        };
        Self {
            dojo,
            store: Arc::new(RwLock::new(WeightStore::new(&config.weights))),
            history: Mutex::new(RecentHistory::new(config.history_max)),
            selector: Mutex::new(selector),
            loading: AtomicBool::new(false),
            loaded: OnceCell::new(),
            storage,
            config,
        }
    }

    pub fn dojo(&self) -> Dojo {
        self.dojo
    }

    pub fn config(&self) -> &DrillConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        if self.loaded.initialized() {
            EngineState::Ready
        } else if self.loading.load(Ordering::SeqCst) {
            EngineState::Loading
        } else {
            EngineState::Uninitialized
        }
    }

    /// Loads persisted records once. Concurrent callers share the same
    /// in-flight load. A failed load is recovered by starting from defaults
    /// and reported as [`LoadReport::Recovered`].
    pub async fn ensure_loaded(&self) -> LoadReport {
        let loaded = self
            .loaded
            .get_or_init(|| async {
                let guard = LoadingGuard::enter(&self.loading);
                let loaded = self.load().await;
                guard.finish();
                loaded
            })
            .await;
        loaded.report.clone()
    }

    async fn load(&self) -> Loaded {
        let report = match self.storage.load(self.dojo).await {
            Ok(None) => {
                tracing::info!(dojo = %self.dojo, "no saved drill progress, starting fresh");
                LoadReport::Fresh
            }
            Ok(Some(snapshot)) => match snapshot.validate() {
                Ok(()) => {
                    let records = snapshot.records.len();
                    *self.store.write() = WeightStore::from_snapshot(snapshot, &self.config.weights);
                    tracing::info!(dojo = %self.dojo, records, "drill progress restored");
                    LoadReport::Restored { records }
                }
                Err(reason) => self.recover(StorageError::Corrupt(reason)),
            },
            Err(err) => self.recover(err),
        };

        let writer = SnapshotWriter::spawn(
            self.dojo,
            Arc::clone(&self.storage),
            Arc::clone(&self.store),
            self.config.persist.clone(),
        );

        Loaded { report, writer }
    }

    fn recover(&self, err: StorageError) -> LoadReport {
        tracing::warn!(
            dojo = %self.dojo,
            kind = err.kind(),
            error = %err,
            "failed to load drill progress, starting from defaults"
        );
        *self.store.write() = WeightStore::new(&self.config.weights);
        LoadReport::Recovered {
            reason: err.to_string(),
        }
    }

    fn ready(&self) -> Result<&Loaded, DrillError> {
        self.loaded.get().ok_or_else(|| {
            tracing::error!(dojo = %self.dojo, state = self.state().as_str(), "drill engine not loaded");
            DrillError::NotLoaded
        })
    }

    /// Draws the next prompt from `pool` using the engine's session history.
    pub fn next<'a, I>(&self, pool: I) -> Result<Draw, DrillError>
    where
        I: IntoIterator<Item = &'a ItemId>,
    {
        let mut history = self.history.lock();
        self.next_with_history(pool, &mut history)
    }

    /// Same as [`DrillEngine::next`] with a caller-owned history window.
    pub fn next_with_history<'a, I>(
        &self,
        pool: I,
        history: &mut RecentHistory,
    ) -> Result<Draw, DrillError>
    where
        I: IntoIterator<Item = &'a ItemId>,
    {
        self.ready()?;

        let mut store = self.store.write();
        let draw = self.selector.lock().next(&store, pool, history)?;
        store.get(&draw.item);

        tracing::debug!(
            dojo = %self.dojo,
            item = %draw.item,
            direction = draw.direction.as_str(),
            "drew item"
        );
        Ok(draw)
    }

    pub fn record_outcome(
        &self,
        item: &ItemId,
        direction: Direction,
        correct: bool,
    ) -> Result<WeightRecord, DrillError> {
        self.record_answer(Outcome {
            item: item.clone(),
            direction,
            correct,
            response_time_ms: None,
        })
    }

    pub fn record_answer(&self, outcome: Outcome) -> Result<WeightRecord, DrillError> {
        let loaded = self.ready()?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        let record = self.store.write().update(&outcome.item, |record| {
            apply_outcome(
                record,
                outcome.direction,
                outcome.correct,
                now_ms,
                &self.config.weights,
                self.config.learning_rate,
            )
        });
        loaded.writer.mark_dirty();

        tracing::debug!(
            dojo = %self.dojo,
            item = %outcome.item,
            direction = outcome.direction.as_str(),
            correct = outcome.correct,
            response_time_ms = outcome.response_time_ms,
            weight = record.weight,
            "recorded outcome"
        );
        Ok(record)
    }

    /// Restores records to defaults. Returns how many stored records were
    /// cleared.
    pub fn reset(&self, scope: ResetScope) -> Result<usize, DrillError> {
        let loaded = self.ready()?;
        let cleared = {
            let mut store = self.store.write();
            match &scope {
                ResetScope::All => store.reset_all(),
                ResetScope::Items(items) => store.reset_items(items.iter()),
            }
        };
        loaded.writer.mark_dirty();

        tracing::info!(
            dojo = %self.dojo,
            all = matches!(scope, ResetScope::All),
            cleared,
            "drill progress reset"
        );
        Ok(cleared)
    }

    /// Current record for `item` without creating one.
    pub fn record(&self, item: &ItemId) -> Option<WeightRecord> {
        self.store.read().peek(item).cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.read().snapshot()
    }

    pub fn progress<'a, I>(&self, pool: I) -> Result<ProgressSummary, DrillError>
    where
        I: IntoIterator<Item = &'a ItemId>,
    {
        self.ready()?;
        let store = self.store.read();
        Ok(crate::drill::progress::summarize(
            &store,
            pool,
            &self.config.progress,
        ))
    }

    /// Writes pending changes immediately, e.g. when a drill session ends.
    pub async fn flush(&self) -> Result<bool, DrillError> {
        let loaded = self.ready()?;
        Ok(loaded.writer.flush().await)
    }

    /// Whether saving has failed and this session is running in memory only.
    pub fn is_persistence_degraded(&self) -> bool {
        self.loaded
            .get()
            .map(|loaded| loaded.writer.is_degraded())
            .unwrap_or(false)
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill::persistence::MemorySnapshotStore;

    fn engine() -> DrillEngine {
        DrillEngine::with_seed(
            Dojo::Kana,
            DrillConfig::default(),
            Arc::new(MemorySnapshotStore::new()),
            7,
        )
    }

    #[tokio::test]
    async fn operations_fail_before_load() {
        let engine = engine();
        let pool = vec![ItemId::from("あ")];

        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(engine.next(&pool), Err(DrillError::NotLoaded));
        assert_eq!(
            engine.record_outcome(&pool[0], Direction::Forward, true),
            Err(DrillError::NotLoaded)
        );
        assert_eq!(engine.reset(ResetScope::All), Err(DrillError::NotLoaded));
        assert_eq!(engine.flush().await, Err(DrillError::NotLoaded));
    }

    #[tokio::test]
    async fn first_load_is_fresh_and_ready() {
        let engine = engine();
        assert_eq!(engine.ensure_loaded().await, LoadReport::Fresh);
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.ensure_loaded().await, LoadReport::Fresh);
    }

    #[tokio::test]
    async fn draw_materializes_default_record() {
        let engine = engine();
        engine.ensure_loaded().await;
        let pool = vec![ItemId::from("い")];

        let draw = engine.next(&pool).unwrap();
        assert_eq!(draw.item.as_str(), "い");
        assert_eq!(engine.record(&draw.item), Some(WeightRecord::default()));
    }

    #[tokio::test]
    async fn record_outcome_updates_store() {
        let engine = engine();
        engine.ensure_loaded().await;
        let id = ItemId::from("う");

        let record = engine.record_outcome(&id, Direction::Reverse, false).unwrap();
        assert_eq!(record.total_attempts, 1);
        assert_eq!(engine.record(&id), Some(record));
    }

    #[tokio::test]
    async fn direction_tunables_are_repaired_before_drawing() {
        let mut config = DrillConfig::default();
        config.direction.explore_threshold = 2.0;
        config.direction.weaker_direction_probability = f64::NAN;
        let engine = DrillEngine::with_seed(
            Dojo::Kana,
            config,
            Arc::new(MemorySnapshotStore::new()),
            11,
        );
        assert_eq!(engine.config().direction.explore_threshold, 0.1);
        assert_eq!(engine.config().direction.weaker_direction_probability, 0.8);

        engine.ensure_loaded().await;
        let id = ItemId::from("ぬ");
        for _ in 0..3 {
            engine.record_outcome(&id, Direction::Reverse, false).unwrap();
        }

        let pool = vec![id];
        let reverse = (0..2000)
            .filter(|_| engine.next(&pool).unwrap().direction == Direction::Reverse)
            .count();
        assert!(reverse > 1450, "reverse asked {reverse} of 2000 times");
    }
}
