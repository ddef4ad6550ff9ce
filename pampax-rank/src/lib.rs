//! Hybrid Ranker: deterministic Reciprocal Rank Fusion across producer
//! outputs.

use pampax_core::{ItemRef, ProducerSource, RankError, ScoreBreakdown, SearchResult};
use std::collections::HashMap;

/// Per-producer weight applied before fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProducerWeights {
    pub lex: f32,
    pub vec: f32,
    pub sym: f32,
    pub mem: f32,
    pub graph: f32,
}

impl ProducerWeights {
    pub fn weight_for(&self, source: ProducerSource) -> f32 {
        match source {
            ProducerSource::Lex => self.lex,
            ProducerSource::Vec => self.vec,
            ProducerSource::Sym => self.sym,
            ProducerSource::Mem => self.mem,
            ProducerSource::Graph => self.graph,
        }
    }
}

impl Default for ProducerWeights {
    fn default() -> Self {
        ProducerWeights {
            lex: 1.0,
            vec: 1.0,
            sym: 1.0,
            mem: 1.0,
            graph: 1.0,
        }
    }
}

/// One fused candidate with a full score breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub item_id: ItemRef,
    pub score_breakdown: ScoreBreakdown,
    pub producer_count: usize,
}

fn item_sort_key(item: &ItemRef) -> String {
    match item {
        ItemRef::Span(id) => format!("span:{id}"),
        ItemRef::Memory(id) => format!("memory:{id}"),
    }
}

/// Fuse ranked producer outputs using Reciprocal Rank Fusion:
/// `fusedScore = sum_p weight_p / (k + rank_p)`.
///
/// `results` is sorted by `(source as discriminant)` before fusion so the
/// caller's input order never affects the output.
/// Ties are broken by producer count (more corroborating producers wins),
/// then by lexicographic item id.
pub fn fuse(
    results: &[SearchResult],
    weights: &ProducerWeights,
    k: f32,
    limit: usize,
) -> Result<Vec<FusedResult>, RankError> {
    if k <= 0.0 {
        return Err(RankError::NonPositiveK { k });
    }

    let mut by_producer: Vec<&SearchResult> = results.iter().collect();
    by_producer.sort_by_key(|r| producer_sort_rank(r.source));

    let mut accum: HashMap<ItemRef, (f32, Vec<(ProducerSource, f32)>)> = HashMap::new();
    for result in by_producer {
        let weight = weights.weight_for(result.source);
        let contribution = weight / (k + result.rank_in_source as f32);
        let entry = accum
            .entry(result.item_id)
            .or_insert_with(|| (0.0, Vec::new()));
        entry.0 += contribution;
        entry.1.push((result.source, contribution));
    }

    let mut fused: Vec<FusedResult> = accum
        .into_iter()
        .map(|(item_id, (fused_score, components))| FusedResult {
            item_id,
            producer_count: components.len(),
            score_breakdown: ScoreBreakdown {
                fused: fused_score,
                components,
            },
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score_breakdown
            .fused
            .partial_cmp(&a.score_breakdown.fused)
            .unwrap()
            .then_with(|| b.producer_count.cmp(&a.producer_count))
            .then_with(|| item_sort_key(&a.item_id).cmp(&item_sort_key(&b.item_id)))
    });

    fused.truncate(limit);
    Ok(fused)
}

fn producer_sort_rank(source: ProducerSource) -> u8 {
    match source {
        ProducerSource::Lex => 0,
        ProducerSource::Vec => 1,
        ProducerSource::Sym => 2,
        ProducerSource::Mem => 3,
        ProducerSource::Graph => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pampax_core::SpanId;

    fn result(id: SpanId, rank: u32, source: ProducerSource) -> SearchResult {
        SearchResult {
            item_id: ItemRef::Span(id),
            score: 0.0,
            rank_in_source: rank,
            source,
        }
    }

    #[test]
    fn fusion_rejects_non_positive_k() {
        let err = fuse(&[], &ProducerWeights::default(), 0.0, 10).unwrap_err();
        assert!(matches!(err, RankError::NonPositiveK { .. }));
    }

    #[test]
    fn items_in_multiple_producers_score_higher() {
        let a = SpanId::now_v7();
        let b = SpanId::now_v7();
        let results = vec![
            result(a, 0, ProducerSource::Lex),
            result(a, 0, ProducerSource::Vec),
            result(b, 0, ProducerSource::Lex),
        ];
        let fused = fuse(&results, &ProducerWeights::default(), 60.0, 10).unwrap();
        assert_eq!(fused[0].item_id, ItemRef::Span(a));
        assert_eq!(fused[0].producer_count, 2);
    }

    #[test]
    fn fusion_is_order_independent() {
        let a = SpanId::now_v7();
        let b = SpanId::now_v7();
        let forward = vec![
            result(a, 0, ProducerSource::Lex),
            result(b, 1, ProducerSource::Vec),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let f1 = fuse(&forward, &ProducerWeights::default(), 60.0, 10).unwrap();
        let f2 = fuse(&reversed, &ProducerWeights::default(), 60.0, 10).unwrap();
        assert_eq!(
            f1.iter().map(|r| r.item_id).collect::<Vec<_>>(),
            f2.iter().map(|r| r.item_id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn fusion_respects_limit() {
        let results: Vec<SearchResult> = (0..20)
            .map(|i| result(SpanId::now_v7(), i, ProducerSource::Lex))
            .collect();
        let fused = fuse(&results, &ProducerWeights::default(), 60.0, 5).unwrap();
        assert_eq!(fused.len(), 5);
    }

    #[test]
    fn zero_weight_producer_contributes_nothing() {
        let a = SpanId::now_v7();
        let weights = ProducerWeights {
            vec: 0.0,
            ..Default::default()
        };
        let results = vec![result(a, 0, ProducerSource::Vec)];
        let fused = fuse(&results, &weights, 60.0, 10).unwrap();
        assert_eq!(fused[0].score_breakdown.fused, 0.0);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use pampax_core::SpanId;
    use proptest::prelude::*;

    fn arb_results(n: usize) -> Vec<SearchResult> {
        (0..n)
            .map(|i| SearchResult {
                item_id: ItemRef::Span(SpanId::now_v7()),
                score: 0.0,
                rank_in_source: (i % 7) as u32,
                source: match i % 5 {
                    0 => ProducerSource::Lex,
                    1 => ProducerSource::Vec,
                    2 => ProducerSource::Sym,
                    3 => ProducerSource::Mem,
                    _ => ProducerSource::Graph,
                },
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_fused_scores_are_sorted_descending(n in 1usize..30) {
            let results = arb_results(n);
            let fused = fuse(&results, &ProducerWeights::default(), 60.0, 100).unwrap();
            for w in fused.windows(2) {
                prop_assert!(w[0].score_breakdown.fused >= w[1].score_breakdown.fused);
            }
        }

        #[test]
        fn prop_fusion_never_exceeds_limit(n in 1usize..30, limit in 1usize..10) {
            let results = arb_results(n);
            let fused = fuse(&results, &ProducerWeights::default(), 60.0, limit).unwrap();
            prop_assert!(fused.len() <= limit);
        }
    }
}
