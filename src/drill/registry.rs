use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use futures::future::join_all;

use crate::config::Config;
use crate::drill::config::DrillConfig;
use crate::drill::engine::DrillEngine;
use crate::drill::persistence::{FileSnapshotStore, SnapshotStore};
use crate::drill::types::{Dojo, LoadReport};

/// One engine per dojo, sharing a storage adapter.
pub struct EngineRegistry {
    engines: HashMap<Dojo, Arc<DrillEngine>>,
}

impl EngineRegistry {
    pub fn new(config: DrillConfig, storage: Arc<dyn SnapshotStore>) -> Self {
        let engines = Dojo::ALL
            .into_iter()
            .map(|dojo| {
                let engine = DrillEngine::new(dojo, config.clone(), Arc::clone(&storage));
                (dojo, Arc::new(engine))
            })
            .collect();
        Self { engines }
    }

    pub fn from_env() -> Self {
        let app_config = Config::from_env();
        let storage = Arc::new(FileSnapshotStore::new(app_config.data_dir));
        Self::new(DrillConfig::from_env(), storage)
    }

    pub fn engine(&self, dojo: Dojo) -> Arc<DrillEngine> {
        // Every dojo is inserted in `new`.
        Arc::clone(&self.engines[&dojo])
    }

    /// Loads every dojo concurrently, e.g. at startup before any drill screen
    /// opens. Reports come back in `Dojo::ALL` order.
    pub async fn load_all(&self) -> Vec<(Dojo, LoadReport)> {
        let loads = Dojo::ALL.into_iter().map(|dojo| {
            let engine = self.engine(dojo);
            async move { (dojo, engine.ensure_loaded().await) }
        });
        join_all(loads).await
    }
}

static GLOBAL_REGISTRY: OnceLock<EngineRegistry> = OnceLock::new();

/// Installs the process-wide registry. Returns `false` if one was already
/// installed, in which case the existing engines stay in place.
pub fn install_registry(registry: EngineRegistry) -> bool {
    GLOBAL_REGISTRY.set(registry).is_ok()
}

/// Shared engine for `dojo`, built from the environment on first use unless
/// a registry was installed earlier.
pub fn drill_engine(dojo: Dojo) -> Arc<DrillEngine> {
    GLOBAL_REGISTRY
        .get_or_init(EngineRegistry::from_env)
        .engine(dojo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill::persistence::MemorySnapshotStore;

    #[test]
    fn registry_hands_out_the_same_engine() {
        let registry = EngineRegistry::new(
            DrillConfig::default(),
            Arc::new(MemorySnapshotStore::new()),
        );
        let a = registry.engine(Dojo::Kanji);
        let b = registry.engine(Dojo::Kanji);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.dojo(), Dojo::Kanji);
        assert!(!Arc::ptr_eq(&a, &registry.engine(Dojo::Kana)));
    }

    #[tokio::test]
    async fn load_all_reports_each_dojo() {
        let mut records = std::collections::BTreeMap::new();
        records.insert(
            crate::drill::types::ItemId::from("日"),
            crate::drill::types::WeightRecord::default(),
        );
        let storage = MemorySnapshotStore::with_snapshot(
            Dojo::Kanji,
            crate::drill::types::Snapshot::new(records),
        );
        let registry = EngineRegistry::new(DrillConfig::default(), Arc::new(storage));

        let reports = registry.load_all().await;
        assert_eq!(
            reports,
            vec![
                (Dojo::Kana, LoadReport::Fresh),
                (Dojo::Kanji, LoadReport::Restored { records: 1 }),
                (Dojo::Vocabulary, LoadReport::Fresh),
            ]
        );
        assert!(Dojo::ALL
            .into_iter()
            .all(|dojo| registry.engine(dojo).state() == crate::drill::types::EngineState::Ready));
    }
}
