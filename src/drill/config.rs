use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightParams {
    pub min_weight: f64,
    pub max_weight: f64,
    pub correct_decay: f64,
    pub incorrect_growth: f64,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self {
            min_weight: 0.05,
            max_weight: 20.0,
            correct_decay: 0.55,
            incorrect_growth: 1.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionParams {
    pub explore_threshold: f64,
    pub weaker_direction_probability: f64,
}

impl Default for DirectionParams {
    fn default() -> Self {
        Self {
            explore_threshold: 0.1,
            weaker_direction_probability: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistParams {
    pub save_debounce_ms: u64,
    pub save_max_delay_ms: u64,
    pub save_retries: u32,
    pub save_retry_backoff_ms: u64,
}

impl Default for PersistParams {
    fn default() -> Self {
        Self {
            save_debounce_ms: 1500,
            save_max_delay_ms: 10_000,
            save_retries: 1,
            save_retry_backoff_ms: 250,
        }
    }
}

impl PersistParams {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Upper bound on how long a dirty store can wait while outcomes keep
    /// arriving faster than the debounce interval.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.save_max_delay_ms.max(self.save_debounce_ms))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.save_retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressParams {
    pub mastery_min_attempts: u32,
    pub mastery_confidence: f64,
    pub struggling_weight: f64,
}

impl Default for ProgressParams {
    fn default() -> Self {
        Self {
            mastery_min_attempts: 3,
            mastery_confidence: 0.8,
            struggling_weight: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillConfig {
    pub weights: WeightParams,
    pub direction: DirectionParams,
    pub persist: PersistParams,
    pub progress: ProgressParams,
    pub learning_rate: f64,
    pub history_max: usize,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            weights: WeightParams::default(),
            direction: DirectionParams::default(),
            persist: PersistParams::default(),
            progress: ProgressParams::default(),
            learning_rate: 0.3,
            history_max: 4,
        }
    }
}

impl DrillConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_f64("DRILL_MIN_WEIGHT") {
            config.weights.min_weight = val;
        }
        if let Some(val) = env_f64("DRILL_MAX_WEIGHT") {
            config.weights.max_weight = val;
        }
        if let Some(val) = env_f64("DRILL_CORRECT_DECAY") {
            config.weights.correct_decay = val;
        }
        if let Some(val) = env_f64("DRILL_INCORRECT_GROWTH") {
            config.weights.incorrect_growth = val;
        }
        if let Some(val) = env_f64("DRILL_LEARNING_RATE") {
            config.learning_rate = val;
        }
        if let Some(val) = env_f64("DRILL_EXPLORE_THRESHOLD") {
            config.direction.explore_threshold = val;
        }
        if let Some(val) = env_f64("DRILL_WEAKER_DIRECTION_PROBABILITY") {
            config.direction.weaker_direction_probability = val;
        }
        if let Some(val) = env_usize("DRILL_HISTORY_MAX") {
            config.history_max = val;
        }
        if let Some(val) = env_u64("DRILL_SAVE_DEBOUNCE_MS") {
            config.persist.save_debounce_ms = val;
        }
        if let Some(val) = env_u64("DRILL_SAVE_MAX_DELAY_MS") {
            config.persist.save_max_delay_ms = val;
        }
        if let Some(val) = env_u64("DRILL_SAVE_RETRIES") {
            config.persist.save_retries = val.min(u32::MAX as u64) as u32;
        }
        if let Some(val) = env_u64("DRILL_SAVE_RETRY_BACKOFF_MS") {
            config.persist.save_retry_backoff_ms = val;
        }
        if let Some(val) = env_u64("DRILL_MASTERY_MIN_ATTEMPTS") {
            config.progress.mastery_min_attempts = val.min(u32::MAX as u64) as u32;
        }
        if let Some(val) = env_f64("DRILL_MASTERY_CONFIDENCE") {
            config.progress.mastery_confidence = val;
        }
        if let Some(val) = env_f64("DRILL_STRUGGLING_WEIGHT") {
            config.progress.struggling_weight = val;
        }

        config.sanitized()
    }

    /// Repairs values that would break record invariants, falling back to
    /// defaults field by field.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        let weights_valid = self.weights.min_weight.is_finite()
            && self.weights.max_weight.is_finite()
            && self.weights.min_weight > 0.0
            && self.weights.min_weight < self.weights.max_weight;
        if !weights_valid {
            tracing::warn!(
                min_weight = self.weights.min_weight,
                max_weight = self.weights.max_weight,
                "invalid weight bounds, using defaults"
            );
            self.weights.min_weight = defaults.weights.min_weight;
            self.weights.max_weight = defaults.weights.max_weight;
        }
        if !(self.weights.correct_decay > 0.0 && self.weights.correct_decay < 1.0) {
            tracing::warn!(value = self.weights.correct_decay, "invalid correct decay, using default");
            self.weights.correct_decay = defaults.weights.correct_decay;
        }
        if !(self.weights.incorrect_growth > 1.0 && self.weights.incorrect_growth.is_finite()) {
            tracing::warn!(value = self.weights.incorrect_growth, "invalid incorrect growth, using default");
            self.weights.incorrect_growth = defaults.weights.incorrect_growth;
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            tracing::warn!(value = self.learning_rate, "invalid learning rate, using default");
            self.learning_rate = defaults.learning_rate;
        }
        if !(0.0..=1.0).contains(&self.direction.explore_threshold) {
            tracing::warn!(value = self.direction.explore_threshold, "invalid explore threshold, using default");
            self.direction.explore_threshold = defaults.direction.explore_threshold;
        }
        if !(0.0..=1.0).contains(&self.direction.weaker_direction_probability) {
            tracing::warn!(
                value = self.direction.weaker_direction_probability,
                "invalid weaker direction probability, using default"
            );
            self.direction.weaker_direction_probability =
                defaults.direction.weaker_direction_probability;
        }
        self.history_max = self.history_max.max(1);

        self
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_f64(key: &str) -> Option<f64> {
    env_string(key)?.trim().parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.trim().parse().ok()
}

fn env_usize(key: &str) -> Option<usize> {
    env_string(key)?.trim().parse().ok()
}
