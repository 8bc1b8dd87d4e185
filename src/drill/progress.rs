use crate::drill::config::ProgressParams;
use crate::drill::store::WeightStore;
use crate::drill::types::{Direction, ItemId, ProgressSummary, WeightRecord};

pub fn is_mastered(record: &WeightRecord, params: &ProgressParams) -> bool {
    record.total_attempts >= params.mastery_min_attempts
        && record.confidence(Direction::Forward) >= params.mastery_confidence
        && record.confidence(Direction::Reverse) >= params.mastery_confidence
}

pub fn is_struggling(record: &WeightRecord, params: &ProgressParams) -> bool {
    record.total_attempts > 0 && record.weight >= params.struggling_weight
}

/// Read-only summary of the pool for the progress screen. Items never drawn
/// count towards `items` only.
pub fn summarize<'a, I>(store: &WeightStore, pool: I, params: &ProgressParams) -> ProgressSummary
where
    I: IntoIterator<Item = &'a ItemId>,
{
    let mut ids: Vec<&ItemId> = pool.into_iter().collect();
    ids.sort();
    ids.dedup();

    let mut summary = ProgressSummary {
        items: ids.len(),
        ..ProgressSummary::default()
    };

    for record in ids.into_iter().filter_map(|id| store.peek(id)) {
        if record.total_attempts == 0 {
            continue;
        }
        summary.seen += 1;
        summary.attempts += u64::from(record.total_attempts);
        summary.correct += u64::from(record.correct_attempts);
        if is_mastered(record, params) {
            summary.mastered += 1;
        }
        if is_struggling(record, params) {
            summary.struggling += 1;
        }
    }

    if summary.attempts > 0 {
        summary.accuracy = Some(summary.correct as f64 / summary.attempts as f64);
    }
    summary
}
