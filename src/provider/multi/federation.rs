//! Result federation strategies
//!
//! A federation method merges K per-child result lists into one ordered
//! list. Children rank their own results but scores are not normalized
//! across children, so every strategy preserves each list's internal
//! relative order and is deterministic for identical inputs.

use crate::result::SearchResultItem;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Federation strategy selector, read from configuration
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum FederationMethodKind {
    /// Interleave child lists evenly
    #[default]
    RoundRobin,
    /// Interleave proportionally to each child's share of results
    AdvancedRoundRobin,
    /// Merge by each item's declared relevance score
    Ranking,
}

impl FederationMethodKind {
    pub fn build(self) -> Box<dyn FederationMethod> {
        match self {
            FederationMethodKind::RoundRobin => Box::new(RoundRobin),
            FederationMethodKind::AdvancedRoundRobin => Box::new(AdvancedRoundRobin),
            FederationMethodKind::Ranking => Box::new(Ranking),
        }
    }
}

/// Merge strategy over per-child ordered result lists
pub trait FederationMethod: Send + Sync {
    fn merge(&self, lists: Vec<Vec<SearchResultItem>>) -> Vec<SearchResultItem>;
}

/// Even interleave: index 0 of every child (in child order), then index 1,
/// and so on; exhausted children drop out.
pub struct RoundRobin;

impl FederationMethod for RoundRobin {
    fn merge(&self, lists: Vec<Vec<SearchResultItem>>) -> Vec<SearchResultItem> {
        let total: usize = lists.iter().map(|l| l.len()).sum();
        let mut merged = Vec::with_capacity(total);
        let mut iterators: Vec<_> = lists.into_iter().map(|l| l.into_iter()).collect();

        while merged.len() < total {
            for iterator in iterators.iter_mut() {
                if let Some(item) = iterator.next() {
                    merged.push(item);
                }
            }
        }
        merged
    }
}

/// Weighted interleave: each child accrues credit proportional to its list
/// length per round; the child with the most credit emits next. Ties go to
/// the lower child index, which keeps the merge deterministic.
pub struct AdvancedRoundRobin;

impl FederationMethod for AdvancedRoundRobin {
    fn merge(&self, lists: Vec<Vec<SearchResultItem>>) -> Vec<SearchResultItem> {
        let total: usize = lists.iter().map(|l| l.len()).sum();
        if total == 0 {
            return Vec::new();
        }

        let weights: Vec<f64> = lists
            .iter()
            .map(|l| l.len() as f64 / total as f64)
            .collect();
        let mut credits = vec![0.0_f64; lists.len()];
        let mut queues: Vec<std::collections::VecDeque<SearchResultItem>> =
            lists.into_iter().map(|l| l.into()).collect();
        let mut merged = Vec::with_capacity(total);

        while merged.len() < total {
            for (index, weight) in weights.iter().enumerate() {
                if !queues[index].is_empty() {
                    credits[index] += weight;
                }
            }

            let next = credits
                .iter()
                .enumerate()
                .filter(|(index, _)| !queues[*index].is_empty())
                .max_by(|(ai, a), (bi, b)| {
                    a.partial_cmp(b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        // lower index wins ties
                        .then(bi.cmp(ai))
                })
                .map(|(index, _)| index);

            match next {
                Some(index) => {
                    credits[index] -= 1.0;
                    if let Some(item) = queues[index].pop_front() {
                        merged.push(item);
                    }
                }
                None => break,
            }
        }
        merged
    }
}

/// K-way merge by descending item score; ties resolved by child index, then
/// by position within the child list.
pub struct Ranking;

impl FederationMethod for Ranking {
    fn merge(&self, lists: Vec<Vec<SearchResultItem>>) -> Vec<SearchResultItem> {
        let mut indexed: Vec<(usize, usize, SearchResultItem)> = Vec::new();
        for (list_index, list) in lists.into_iter().enumerate() {
            for (position, item) in list.into_iter().enumerate() {
                indexed.push((list_index, position, item));
            }
        }

        indexed.sort_by(|(al, ap, a), (bl, bp, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| al.cmp(bl))
                .then_with(|| ap.cmp(bp))
        });

        indexed.into_iter().map(|(_, _, item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, score: f64) -> SearchResultItem {
        SearchResultItem::new(key, "ds", key).with_score(score)
    }

    fn keys(items: &[SearchResultItem]) -> Vec<&str> {
        items.iter().map(|i| i.key.as_str()).collect()
    }

    #[test]
    fn test_round_robin_interleaves_evenly() {
        let merged = RoundRobin.merge(vec![
            vec![item("a1", 0.0), item("a2", 0.0)],
            vec![item("b1", 0.0), item("b2", 0.0), item("b3", 0.0)],
        ]);
        assert_eq!(keys(&merged), vec!["a1", "b1", "a2", "b2", "b3"]);
    }

    #[test]
    fn test_round_robin_deterministic() {
        let lists = || {
            vec![
                vec![item("a1", 0.0), item("a2", 0.0)],
                vec![item("b1", 0.0)],
                vec![item("c1", 0.0), item("c2", 0.0)],
            ]
        };
        let first = RoundRobin.merge(lists());
        let second = RoundRobin.merge(lists());
        assert_eq!(keys(&first), keys(&second));
    }

    #[test]
    fn test_round_robin_preserves_list_order() {
        let merged = RoundRobin.merge(vec![
            vec![item("a1", 0.0), item("a2", 0.0), item("a3", 0.0)],
            vec![],
        ]);
        assert_eq!(keys(&merged), vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn test_advanced_round_robin_weights_longer_lists() {
        let merged = AdvancedRoundRobin.merge(vec![
            vec![item("a1", 0.0)],
            vec![
                item("b1", 0.0),
                item("b2", 0.0),
                item("b3", 0.0),
                item("b4", 0.0),
                item("b5", 0.0),
            ],
        ]);

        assert_eq!(merged.len(), 6);
        // The heavier child emits first and its internal order survives
        assert_eq!(merged[0].key, "b1");
        let b_positions: Vec<usize> = merged
            .iter()
            .enumerate()
            .filter(|(_, i)| i.key.starts_with('b'))
            .map(|(index, _)| index)
            .collect();
        assert!(b_positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_advanced_round_robin_deterministic() {
        let lists = || {
            vec![
                vec![item("a1", 0.0), item("a2", 0.0)],
                vec![item("b1", 0.0), item("b2", 0.0), item("b3", 0.0)],
            ]
        };
        assert_eq!(
            keys(&AdvancedRoundRobin.merge(lists())),
            keys(&AdvancedRoundRobin.merge(lists()))
        );
    }

    #[test]
    fn test_ranking_merges_by_score() {
        let merged = Ranking.merge(vec![
            vec![item("a1", 0.9), item("a2", 0.3)],
            vec![item("b1", 0.7), item("b2", 0.5)],
        ]);
        assert_eq!(keys(&merged), vec!["a1", "b1", "b2", "a2"]);
    }

    #[test]
    fn test_ranking_ties_resolved_by_child_index() {
        let merged = Ranking.merge(vec![
            vec![item("a1", 0.5)],
            vec![item("b1", 0.5)],
        ]);
        assert_eq!(keys(&merged), vec!["a1", "b1"]);
    }

    #[test]
    fn test_kind_parses_from_string() {
        use std::str::FromStr;
        assert_eq!(
            FederationMethodKind::from_str("Ranking").unwrap(),
            FederationMethodKind::Ranking
        );
        assert_eq!(FederationMethodKind::default(), FederationMethodKind::RoundRobin);
    }
}
