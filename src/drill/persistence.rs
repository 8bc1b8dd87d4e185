use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::drill::error::StorageError;
use crate::drill::types::{Dojo, Snapshot};

/// Durable storage for drill snapshots, one value per dojo.
///
/// Adapters only move bytes; validation of what comes back happens in the
/// engine.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` means nothing has been stored for this dojo yet.
    async fn load(&self, dojo: Dojo) -> Result<Option<Snapshot>, StorageError>;

    async fn save(&self, dojo: Dojo, snapshot: &Snapshot) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<Dojo, Snapshot>>,
    load_failure: Mutex<Option<StorageError>>,
    fail_saves: Mutex<usize>,
    save_count: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(dojo: Dojo, snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.snapshots.lock().insert(dojo, snapshot);
        store
    }

    /// Every subsequent load fails with `err`.
    pub fn fail_loads_with(&self, err: StorageError) {
        *self.load_failure.lock() = Some(err);
    }

    /// The next `count` saves fail with `Unavailable`.
    pub fn fail_saves(&self, count: usize) {
        *self.fail_saves.lock() = count;
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn stored(&self, dojo: Dojo) -> Option<Snapshot> {
        self.snapshots.lock().get(&dojo).cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, dojo: Dojo) -> Result<Option<Snapshot>, StorageError> {
        if let Some(err) = self.load_failure.lock().clone() {
            return Err(err);
        }
        Ok(self.snapshots.lock().get(&dojo).cloned())
    }

    async fn save(&self, dojo: Dojo, snapshot: &Snapshot) -> Result<(), StorageError> {
        {
            let mut remaining = self.fail_saves.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::Unavailable("injected save failure".to_string()));
            }
        }
        self.snapshots.lock().insert(dojo, snapshot.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Stores each dojo as `<dir>/<dojo>.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, dojo: Dojo) -> PathBuf {
        self.dir.join(format!("{}.json", dojo.as_str()))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, dojo: Dojo) -> Result<Option<Snapshot>, StorageError> {
        let path = self.path_for(dojo);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Unavailable(format!("{}: {err}", path.display()))),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot))
    }

    async fn save(&self, dojo: Dojo, snapshot: &Snapshot) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|err| StorageError::Unavailable(format!("serialize snapshot: {err}")))?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(dojo);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::drill::types::{ItemId, WeightRecord};

    fn sample_snapshot() -> Snapshot {
        let mut records = BTreeMap::new();
        records.insert(
            ItemId::from("さ"),
            WeightRecord {
                weight: 2.5,
                forward_confidence: 0.7,
                reverse_confidence: 0.2,
                total_attempts: 4,
                correct_attempts: 3,
                last_seen_at: Some(1_700_000_000_123),
            },
        );
        Snapshot::new(records)
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert_eq!(store.load(Dojo::Kana).await, Ok(None));

        let snapshot = sample_snapshot();
        store.save(Dojo::Kana, &snapshot).await.unwrap();
        assert_eq!(store.load(Dojo::Kana).await, Ok(Some(snapshot)));
        assert_eq!(store.load(Dojo::Kanji).await, Ok(None));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn memory_store_injected_failures() {
        let store = MemorySnapshotStore::new();
        store.fail_saves(1);
        assert!(store.save(Dojo::Kana, &sample_snapshot()).await.is_err());
        assert!(store.save(Dojo::Kana, &sample_snapshot()).await.is_ok());

        store.fail_loads_with(StorageError::Unavailable("offline".into()));
        assert!(matches!(
            store.load(Dojo::Kana).await,
            Err(StorageError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested"));
        assert_eq!(store.load(Dojo::Vocabulary).await, Ok(None));

        let snapshot = sample_snapshot();
        store.save(Dojo::Vocabulary, &snapshot).await.unwrap();
        assert!(store.path_for(Dojo::Vocabulary).exists());
        assert_eq!(store.load(Dojo::Vocabulary).await, Ok(Some(snapshot)));
    }

    #[tokio::test]
    async fn file_store_reports_garbage_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        std::fs::write(store.path_for(Dojo::Kana), b"{not json").unwrap();

        assert!(matches!(
            store.load(Dojo::Kana).await,
            Err(StorageError::Corrupt(_))
        ));
    }
}
