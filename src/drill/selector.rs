//! Weighted item selection with a no-repeat window and direction balancing.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::drill::config::DirectionParams;
use crate::drill::error::DrillError;
use crate::drill::store::WeightStore;
use crate::drill::types::{Direction, Draw, ItemId, RecentHistory, WeightRecord};

pub struct Selector {
    rng: ChaCha8Rng,
    params: DirectionParams,
}

impl Selector {
    pub fn new(params: DirectionParams) -> Self {
        Self {
            rng: ChaCha8Rng::from_rng(&mut rand::rng()),
            params,
        }
    }

    pub fn with_seed(params: DirectionParams, seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            params,
        }
    }

    /// Draws the next item from `pool` and the direction to prompt it in,
    /// then records the item in `history`.
    ///
    /// Items drawn within the recent window are skipped unless that would
    /// leave nothing to draw. The store is only read: creating the record
    /// for a first draw is left to the engine, which holds the write lock.
    pub fn next<'a, I>(
        &mut self,
        store: &WeightStore,
        pool: I,
        history: &mut RecentHistory,
    ) -> Result<Draw, DrillError>
    where
        I: IntoIterator<Item = &'a ItemId>,
    {
        let weighted = store.weights(pool);
        if weighted.is_empty() {
            return Err(DrillError::EmptyPool);
        }

        let window = history.window_for(weighted.len());
        let fresh: Vec<(ItemId, f64)> = weighted
            .iter()
            .filter(|(id, _)| !history.contains_within(id, window))
            .cloned()
            .collect();
        let candidates = if fresh.is_empty() { weighted } else { fresh };

        let item = self.weighted_pick(&candidates);
        let record = store.peek(&item).cloned().unwrap_or_default();
        let direction = self.choose_direction(&record);

        history.push(item.clone());
        Ok(Draw { item, direction })
    }

    fn weighted_pick(&mut self, candidates: &[(ItemId, f64)]) -> ItemId {
        let total: f64 = candidates.iter().map(|(_, w)| *w).sum();
        let last = candidates.len() - 1;
        if !(total.is_finite() && total > 0.0) {
            return candidates[self.rng.random_range(0..=last)].0.clone();
        }

        let draw = self.rng.random::<f64>() * total;
        let mut cumulative = 0.0;
        for (id, weight) in candidates {
            cumulative += weight;
            if cumulative > draw {
                return id.clone();
            }
        }
        // Rounding can leave the draw at the very top of the range.
        candidates[last].0.clone()
    }

    fn weaker_probability(&self) -> f64 {
        let p = self.params.weaker_direction_probability;
        if p.is_finite() {
            p.clamp(0.0, 1.0)
        } else {
            DirectionParams::default().weaker_direction_probability
        }
    }

    pub fn choose_direction(&mut self, record: &WeightRecord) -> Direction {
        let bias = record.direction_bias();
        if bias.abs() < self.params.explore_threshold {
            return if self.rng.random_bool(0.5) {
                Direction::Forward
            } else {
                Direction::Reverse
            };
        }

        let weaker = record.weaker_direction();
        if self.rng.random_bool(self.weaker_probability()) {
            weaker
        } else {
            weaker.opposite()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::drill::config::WeightParams;

    fn pool(ids: &[&str]) -> Vec<ItemId> {
        ids.iter().map(|id| ItemId::from(*id)).collect()
    }

    fn selector(seed: u64) -> Selector {
        Selector::with_seed(DirectionParams::default(), seed)
    }

    #[test]
    fn empty_pool_is_an_error_and_leaves_history_alone() {
        let store = WeightStore::new(&WeightParams::default());
        let mut history = RecentHistory::new(4);
        let result = selector(1).next(&store, pool(&[]).iter(), &mut history);

        assert_eq!(result, Err(DrillError::EmptyPool));
        assert!(history.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn single_item_pool_repeats() {
        let store = WeightStore::new(&WeightParams::default());
        let mut history = RecentHistory::new(4);
        let mut selector = selector(2);
        let items = pool(&["あ"]);

        for _ in 0..5 {
            let draw = selector.next(&store, items.iter(), &mut history).unwrap();
            assert_eq!(draw.item.as_str(), "あ");
        }
    }

    #[test]
    fn never_repeats_last_item_in_pool_of_two() {
        let store = WeightStore::new(&WeightParams::default());
        let mut history = RecentHistory::new(4);
        let mut selector = selector(3);
        let items = pool(&["a", "b"]);

        let mut previous: Option<ItemId> = None;
        for _ in 0..200 {
            let draw = selector.next(&store, items.iter(), &mut history).unwrap();
            if let Some(prev) = &previous {
                assert_ne!(prev, &draw.item);
            }
            previous = Some(draw.item);
        }
    }

    #[test]
    fn heavier_items_are_drawn_more_often() {
        let mut store = WeightStore::new(&WeightParams::default());
        store.set(
            "heavy".into(),
            WeightRecord {
                weight: 10.0,
                ..WeightRecord::default()
            },
        );
        let items = pool(&["heavy", "light1", "light2", "light3", "light4", "light5"]);
        let mut selector = selector(4);
        let mut counts: HashMap<ItemId, usize> = HashMap::new();

        for _ in 0..2000 {
            // Fresh history each round so the window does not mask weights.
            let mut history = RecentHistory::new(1);
            let draw = selector.next(&store, items.iter(), &mut history).unwrap();
            *counts.entry(draw.item).or_default() += 1;
        }

        let heavy = counts.get(&ItemId::from("heavy")).copied().unwrap_or(0);
        let light = counts.get(&ItemId::from("light1")).copied().unwrap_or(0);
        assert!(heavy > light * 4, "heavy={heavy} light={light}");
    }

    #[test]
    fn balanced_confidence_explores_both_directions() {
        let mut selector = selector(5);
        let record = WeightRecord::default();
        let forward = (0..1000)
            .filter(|_| selector.choose_direction(&record) == Direction::Forward)
            .count();
        assert!((400..=600).contains(&forward), "forward={forward}");
    }

    #[test]
    fn weaker_direction_is_favoured() {
        let mut selector = selector(6);
        let record = WeightRecord {
            forward_confidence: 0.9,
            reverse_confidence: 0.3,
            ..WeightRecord::default()
        };
        let reverse = (0..1000)
            .filter(|_| selector.choose_direction(&record) == Direction::Reverse)
            .count();
        assert!((730..=870).contains(&reverse), "reverse={reverse}");
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let store = WeightStore::new(&WeightParams::default());
        let items = pool(&["a", "b", "c", "d", "e"]);
        let run = |seed| {
            let mut selector = selector(seed);
            let mut history = RecentHistory::new(4);
            (0..20)
                .map(|_| selector.next(&store, items.iter(), &mut history).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn non_finite_weaker_probability_falls_back_to_default() {
        let params = DirectionParams {
            explore_threshold: 0.1,
            weaker_direction_probability: f64::NAN,
        };
        let mut selector = Selector::with_seed(params, 8);
        let record = WeightRecord {
            forward_confidence: 0.9,
            reverse_confidence: 0.3,
            ..WeightRecord::default()
        };
        let reverse = (0..1000)
            .filter(|_| selector.choose_direction(&record) == Direction::Reverse)
            .count();
        assert!((730..=870).contains(&reverse), "reverse={reverse}");
    }
}
