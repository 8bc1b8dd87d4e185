//! Outcome updater.
//!
//! Applies one answered prompt to a record: attempt counters, an exponential
//! moving average on the confidence of the direction that was asked, and a
//! multiplicative weight change bounded by the configured limits. Scheduling
//! persistence is the engine's job.

use crate::drill::config::WeightParams;
use crate::drill::types::{Direction, WeightRecord};

pub fn apply_outcome(
    record: &mut WeightRecord,
    direction: Direction,
    correct: bool,
    now_ms: i64,
    weights: &WeightParams,
    learning_rate: f64,
) {
    record.total_attempts = record.total_attempts.saturating_add(1);
    if correct {
        record.correct_attempts = record.correct_attempts.saturating_add(1);
    }

    let target = if correct { 1.0 } else { 0.0 };
    let confidence = record.confidence_mut(direction);
    *confidence = (*confidence + learning_rate * (target - *confidence)).clamp(0.0, 1.0);

    record.weight = if correct {
        (record.weight * weights.correct_decay).max(weights.min_weight)
    } else {
        (record.weight * weights.incorrect_growth).min(weights.max_weight)
    };

    record.last_seen_at = Some(now_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn apply(record: &mut WeightRecord, direction: Direction, correct: bool) {
        apply_outcome(record, direction, correct, NOW, &WeightParams::default(), 0.3);
    }

    #[test]
    fn correct_answer_decays_weight_and_raises_confidence() {
        let mut record = WeightRecord::default();
        apply(&mut record, Direction::Forward, true);

        assert!((record.weight - 0.55).abs() < 1e-12);
        assert!((record.forward_confidence - 0.65).abs() < 1e-12);
        assert_eq!(record.reverse_confidence, 0.5);
        assert_eq!(record.total_attempts, 1);
        assert_eq!(record.correct_attempts, 1);
        assert_eq!(record.last_seen_at, Some(NOW));
    }

    #[test]
    fn incorrect_answer_grows_weight_and_lowers_confidence() {
        let mut record = WeightRecord::default();
        apply(&mut record, Direction::Reverse, false);

        assert!((record.weight - 1.8).abs() < 1e-12);
        assert!((record.reverse_confidence - 0.35).abs() < 1e-12);
        assert_eq!(record.forward_confidence, 0.5);
        assert_eq!(record.total_attempts, 1);
        assert_eq!(record.correct_attempts, 0);
    }

    #[test]
    fn weight_is_bounded_both_ways() {
        let mut record = WeightRecord::default();
        for _ in 0..50 {
            apply(&mut record, Direction::Forward, false);
        }
        assert_eq!(record.weight, 20.0);

        for _ in 0..50 {
            apply(&mut record, Direction::Forward, true);
        }
        assert_eq!(record.weight, 0.05);
    }

    #[test]
    fn five_misses_in_one_direction() {
        let mut record = WeightRecord::default();
        for _ in 0..5 {
            apply(&mut record, Direction::Forward, false);
        }
        assert!(record.weight >= 1.8);
        assert!(record.forward_confidence < 0.5 - 0.1);
        assert_eq!(record.reverse_confidence, 0.5);
    }
}
