//! Frequency tallies over a frame's entities.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::{ConfidenceLevel, Ripeness, Strawberry};

/// Aggregate view of one frame. Only buckets that occur are present in the maps.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Statistics {
    pub total: usize,
    pub by_ripeness: BTreeMap<Ripeness, usize>,
    pub by_confidence: BTreeMap<ConfidenceLevel, usize>,
    pub tracked: usize,
}

/// Stateless counting helpers.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountingService;

impl CountingService {
    pub fn new() -> Self {
        Self
    }

    pub fn count_by_ripeness(&self, strawberries: &[Strawberry]) -> BTreeMap<Ripeness, usize> {
        tally(strawberries.iter().map(Strawberry::ripeness))
    }

    pub fn count_by_confidence(
        &self,
        strawberries: &[Strawberry],
    ) -> BTreeMap<ConfidenceLevel, usize> {
        tally(strawberries.iter().map(Strawberry::confidence_level))
    }

    pub fn count_total(&self, strawberries: &[Strawberry]) -> usize {
        strawberries.len()
    }

    pub fn count_tracked(&self, strawberries: &[Strawberry]) -> usize {
        strawberries.iter().filter(|s| s.is_tracked()).count()
    }

    pub fn statistics(&self, strawberries: &[Strawberry]) -> Statistics {
        Statistics {
            total: self.count_total(strawberries),
            by_ripeness: self.count_by_ripeness(strawberries),
            by_confidence: self.count_by_confidence(strawberries),
            tracked: self.count_tracked(strawberries),
        }
    }
}

fn tally<K: Ord>(keys: impl Iterator<Item = K>) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BBox, Detection};

    fn berry(id: Option<u64>, score: f32, ripeness: Ripeness) -> Strawberry {
        let det = Detection::new(BBox::new(0, 0, 10, 10), score, "strawberry").unwrap();
        match id {
            Some(id) => Strawberry::with_id(id, det, ripeness),
            None => Strawberry::new(det, ripeness),
        }
    }

    #[test]
    fn counts_by_ripeness() {
        let counter = CountingService::new();
        let batch = vec![
            berry(Some(1), 0.9, Ripeness::Ripe),
            berry(Some(2), 0.9, Ripeness::Ripe),
            berry(Some(3), 0.9, Ripeness::SemiRipe),
        ];

        let counts = counter.count_by_ripeness(&batch);

        assert_eq!(counts.get(&Ripeness::Ripe), Some(&2));
        assert_eq!(counts.get(&Ripeness::SemiRipe), Some(&1));
        assert_eq!(counts.get(&Ripeness::Unripe), None);
        assert_eq!(counts.values().sum::<usize>(), batch.len());
    }

    #[test]
    fn counts_total() {
        let counter = CountingService::new();
        let batch = vec![
            berry(Some(1), 0.9, Ripeness::Ripe),
            berry(Some(2), 0.9, Ripeness::Unripe),
        ];
        assert_eq!(counter.count_total(&batch), 2);
        assert_eq!(counter.count_total(&[]), 0);
    }

    #[test]
    fn counts_by_confidence() {
        let counter = CountingService::new();
        let batch = vec![
            berry(Some(1), 0.95, Ripeness::Ripe),
            berry(Some(2), 0.5, Ripeness::Ripe),
        ];

        let counts = counter.count_by_confidence(&batch);

        assert_eq!(counts.get(&ConfidenceLevel::High), Some(&1));
        assert_eq!(counts.get(&ConfidenceLevel::Low), Some(&1));
        assert_eq!(counts.get(&ConfidenceLevel::Medium), None);
    }

    #[test]
    fn statistics_combine_all_tallies() {
        let counter = CountingService::new();
        let batch = vec![
            berry(Some(1), 0.95, Ripeness::Ripe),
            berry(None, 0.8, Ripeness::SemiRipe),
            berry(Some(3), 0.1, Ripeness::Unripe),
        ];

        let stats = counter.statistics(&batch);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.tracked, 2);
        assert_eq!(stats.by_ripeness.len(), 3);
        assert_eq!(stats.by_confidence.get(&ConfidenceLevel::Medium), Some(&1));
    }

    #[test]
    fn statistics_serialize_with_string_keys() {
        let counter = CountingService::new();
        let stats = counter.statistics(&[berry(Some(1), 0.95, Ripeness::SemiRipe)]);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["by_ripeness"]["semi_ripe"], 1);
        assert_eq!(json["by_confidence"]["high"], 1);
    }
}
