use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_WEIGHT: f64 = 1.0;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dojo {
    Kana,
    Kanji,
    Vocabulary,
}

impl Dojo {
    pub const ALL: [Dojo; 3] = [Dojo::Kana, Dojo::Kanji, Dojo::Vocabulary];

    pub const fn as_str(self) -> &'static str {
        match self {
            Dojo::Kana => "kana",
            Dojo::Kanji => "kanji",
            Dojo::Vocabulary => "vocabulary",
        }
    }
}

impl fmt::Display for Dojo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the item the learner is prompted with.
///
/// `Forward` shows the native script and asks for meaning or romaji,
/// `Reverse` shows meaning or romaji and asks for the native script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRecord {
    pub weight: f64,
    pub forward_confidence: f64,
    pub reverse_confidence: f64,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub last_seen_at: Option<i64>,
}

impl Default for WeightRecord {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
            forward_confidence: DEFAULT_CONFIDENCE,
            reverse_confidence: DEFAULT_CONFIDENCE,
            total_attempts: 0,
            correct_attempts: 0,
            last_seen_at: None,
        }
    }
}

impl WeightRecord {
    pub fn confidence(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Forward => self.forward_confidence,
            Direction::Reverse => self.reverse_confidence,
        }
    }

    pub fn confidence_mut(&mut self, direction: Direction) -> &mut f64 {
        match direction {
            Direction::Forward => &mut self.forward_confidence,
            Direction::Reverse => &mut self.reverse_confidence,
        }
    }

    /// Positive when reverse recall is stronger than forward recall.
    pub fn direction_bias(&self) -> f64 {
        self.reverse_confidence - self.forward_confidence
    }

    pub fn weaker_direction(&self) -> Direction {
        if self.reverse_confidence < self.forward_confidence {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        if self.total_attempts == 0 {
            return None;
        }
        Some(self.correct_attempts as f64 / self.total_attempts as f64)
    }

    pub fn is_untouched(&self) -> bool {
        *self == Self::default()
    }

    pub fn clamped(mut self, min_weight: f64, max_weight: f64) -> Self {
        self.weight = self.weight.clamp(min_weight, max_weight);
        self.forward_confidence = self.forward_confidence.clamp(0.0, 1.0);
        self.reverse_confidence = self.reverse_confidence.clamp(0.0, 1.0);
        self.correct_attempts = self.correct_attempts.min(self.total_attempts);
        self
    }

    fn check(&self) -> Result<(), String> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(format!("weight {} is not a positive number", self.weight));
        }
        for (label, value) in [
            ("forwardConfidence", self.forward_confidence),
            ("reverseConfidence", self.reverse_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{label} {value} outside [0, 1]"));
            }
        }
        if self.correct_attempts > self.total_attempts {
            return Err(format!(
                "correctAttempts {} exceeds totalAttempts {}",
                self.correct_attempts, self.total_attempts
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: u32,
    pub records: BTreeMap<ItemId, WeightRecord>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            records: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    pub fn new(records: BTreeMap<ItemId, WeightRecord>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            records,
        }
    }

    /// Rejects the whole payload when the version is unknown or any record
    /// breaks a record invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                self.schema_version
            ));
        }
        for (id, record) in &self.records {
            record
                .check()
                .map_err(|reason| format!("record {id}: {reason}"))?;
        }
        Ok(())
    }
}

/// Last drawn ids, newest at the back. Used only to suppress immediate repeats.
#[derive(Debug, Clone)]
pub struct RecentHistory {
    items: VecDeque<ItemId>,
    max_capacity: usize,
}

impl RecentHistory {
    pub fn new(max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(1);
        Self {
            items: VecDeque::with_capacity(max_capacity),
            max_capacity,
        }
    }

    /// Window length for a pool of `pool_len` items: half the pool, at least
    /// one, at most the configured capacity.
    pub fn window_for(&self, pool_len: usize) -> usize {
        (pool_len / 2).clamp(1, self.max_capacity)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains(id)
    }

    /// Whether `id` is within the most recent `window` draws.
    pub fn contains_within(&self, id: &ItemId, window: usize) -> bool {
        self.items.iter().rev().take(window).any(|seen| seen == id)
    }

    pub fn push(&mut self, id: ItemId) {
        self.items.push_back(id);
        while self.items.len() > self.max_capacity {
            self.items.pop_front();
        }
    }

    pub fn last(&self) -> Option<&ItemId> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub item: ItemId,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub item: ItemId,
    pub direction: Direction,
    pub correct: bool,
    pub response_time_ms: Option<u64>,
}

impl Outcome {
    pub fn new(item: impl Into<ItemId>, direction: Direction, correct: bool) -> Self {
        Self {
            item: item.into(),
            direction,
            correct,
            response_time_ms: None,
        }
    }

    pub fn with_response_time(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    All,
    Items(Vec<ItemId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Loading,
    Ready,
}

impl EngineState {
    pub const fn as_str(self) -> &'static str {
        match self {
            EngineState::Uninitialized => "UNINITIALIZED",
            EngineState::Loading => "LOADING",
            EngineState::Ready => "READY",
        }
    }
}

/// How the store was populated by `ensure_loaded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadReport {
    /// Nothing had been persisted yet.
    Fresh,
    Restored { records: usize },
    /// Loading failed and the engine started from defaults.
    Recovered { reason: String },
}

impl LoadReport {
    pub fn is_warning(&self) -> bool {
        matches!(self, LoadReport::Recovered { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub items: usize,
    pub seen: usize,
    pub attempts: u64,
    pub correct: u64,
    pub accuracy: Option<f64>,
    pub mastered: usize,
    pub struggling: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_matches_documented_values() {
        let record = WeightRecord::default();
        assert_eq!(record.weight, 1.0);
        assert_eq!(record.forward_confidence, 0.5);
        assert_eq!(record.reverse_confidence, 0.5);
        assert_eq!(record.total_attempts, 0);
        assert_eq!(record.correct_attempts, 0);
        assert!(record.last_seen_at.is_none());
        assert!(record.accuracy().is_none());
    }

    #[test]
    fn snapshot_uses_camel_case_layout() {
        let mut records = BTreeMap::new();
        records.insert(ItemId::from("あ"), WeightRecord::default());
        let json = serde_json::to_value(Snapshot::new(records)).unwrap();

        assert_eq!(json["schemaVersion"], 1);
        let record = &json["records"]["あ"];
        assert_eq!(record["weight"], 1.0);
        assert_eq!(record["forwardConfidence"], 0.5);
        assert_eq!(record["reverseConfidence"], 0.5);
        assert_eq!(record["totalAttempts"], 0);
        assert_eq!(record["correctAttempts"], 0);
        assert!(record["lastSeenAt"].is_null());
    }

    #[test]
    fn validate_rejects_newer_schema() {
        let snapshot = Snapshot {
            schema_version: SCHEMA_VERSION + 1,
            records: BTreeMap::new(),
        };
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn validate_rejects_any_bad_record() {
        let mut records = BTreeMap::new();
        records.insert(ItemId::from("a"), WeightRecord::default());
        records.insert(
            ItemId::from("b"),
            WeightRecord {
                total_attempts: 1,
                correct_attempts: 2,
                ..WeightRecord::default()
            },
        );
        let err = Snapshot::new(records).validate().unwrap_err();
        assert!(err.contains("record b"));

        let mut records = BTreeMap::new();
        records.insert(
            ItemId::from("c"),
            WeightRecord {
                weight: f64::NAN,
                ..WeightRecord::default()
            },
        );
        assert!(Snapshot::new(records).validate().is_err());
    }

    #[test]
    fn history_drops_oldest_when_full() {
        let mut history = RecentHistory::new(2);
        history.push("a".into());
        history.push("b".into());
        history.push("c".into());

        assert_eq!(history.len(), 2);
        assert!(!history.contains(&"a".into()));
        assert_eq!(history.last(), Some(&ItemId::from("c")));
    }

    #[test]
    fn history_window_scales_with_pool() {
        let history = RecentHistory::new(4);
        assert_eq!(history.window_for(1), 1);
        assert_eq!(history.window_for(2), 1);
        assert_eq!(history.window_for(5), 2);
        assert_eq!(history.window_for(46), 4);
    }

    #[test]
    fn weaker_direction_prefers_lower_confidence() {
        let record = WeightRecord {
            forward_confidence: 0.9,
            reverse_confidence: 0.2,
            ..WeightRecord::default()
        };
        assert_eq!(record.weaker_direction(), Direction::Reverse);
        assert!(record.direction_bias() < 0.0);
    }
}
