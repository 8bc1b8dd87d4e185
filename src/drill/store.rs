use std::collections::BTreeMap;

use crate::drill::config::WeightParams;
use crate::drill::types::{ItemId, Snapshot, WeightRecord};

/// Live mastery state for one dojo. Records are created lazily with default
/// values; nothing here performs I/O.
#[derive(Debug, Clone)]
pub struct WeightStore {
    records: BTreeMap<ItemId, WeightRecord>,
    min_weight: f64,
    max_weight: f64,
}

impl WeightStore {
    pub fn new(params: &WeightParams) -> Self {
        Self {
            records: BTreeMap::new(),
            min_weight: params.min_weight,
            max_weight: params.max_weight,
        }
    }

    /// Builds a store from an already validated snapshot, pulling weights
    /// into the configured bounds.
    pub fn from_snapshot(snapshot: Snapshot, params: &WeightParams) -> Self {
        let mut store = Self::new(params);
        for (id, record) in snapshot.records {
            store.set(id, record);
        }
        store
    }

    pub fn get(&mut self, id: &ItemId) -> WeightRecord {
        self.records.entry(id.clone()).or_default().clone()
    }

    /// Read-only lookup that does not create a record.
    pub fn peek(&self, id: &ItemId) -> Option<&WeightRecord> {
        self.records.get(id)
    }

    pub fn set(&mut self, id: ItemId, record: WeightRecord) {
        let record = record.clamped(self.min_weight, self.max_weight);
        self.records.insert(id, record);
    }

    pub fn update<F>(&mut self, id: &ItemId, f: F) -> WeightRecord
    where
        F: FnOnce(&mut WeightRecord),
    {
        let (min, max) = (self.min_weight, self.max_weight);
        let record = self.records.entry(id.clone()).or_default();
        f(record);
        *record = record.clone().clamped(min, max);
        record.clone()
    }

    /// Records for the given pool in ascending id order. Missing ids get a
    /// default record.
    pub fn entries<'a, I>(&mut self, ids: I) -> Vec<(ItemId, WeightRecord)>
    where
        I: IntoIterator<Item = &'a ItemId>,
    {
        let mut ids: Vec<&ItemId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .map(|id| (id.clone(), self.get(id)))
            .collect()
    }

    /// Weights for the pool without materializing records for unseen ids.
    pub fn weights<'a, I>(&self, ids: I) -> Vec<(ItemId, f64)>
    where
        I: IntoIterator<Item = &'a ItemId>,
    {
        let mut ids: Vec<&ItemId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .map(|id| {
                let weight = self
                    .records
                    .get(id)
                    .map(|r| r.weight)
                    .unwrap_or_else(|| WeightRecord::default().weight);
                (id.clone(), weight)
            })
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.records.clone())
    }

    pub fn reset_all(&mut self) -> usize {
        let cleared = self.records.len();
        self.records.clear();
        cleared
    }

    pub fn reset_items<'a, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a ItemId>,
    {
        ids.into_iter()
            .filter(|id| self.records.remove(*id).is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &WeightRecord)> {
        self.records.iter()
    }
}
