//! Graph Traverser: best-first bounded BFS over the code graph.
//!
//! Traversal is a single async task with no internal concurrency —
//! interleaving frontier updates across tasks would break the
//! determinism guarantee — but it awaits the edge index on
//! each expansion step since that index is backed by the Store.

use async_trait::async_trait;
use pampax_core::{Direction, Edge, EdgeKind, EntityIdType, SpanId};

/// Abstraction over the code graph's edge index, so the traverser never
/// depends on a concrete Store implementation.
#[async_trait]
pub trait EdgeIndex: Send + Sync {
    /// Return edges touching `span` in `direction`, restricted to
    /// `allowed_kinds`. `None` signals the index itself is unavailable
    /// (not merely "no edges"), which halts expansion entirely.
    async fn edges_from(
        &self,
        span: SpanId,
        direction: Direction,
        allowed_kinds: &[EdgeKind],
    ) -> Option<Vec<Edge>>;
}

/// One node admitted into the traversal result.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitedNode {
    pub span_id: SpanId,
    pub depth: u32,
    pub via_edge_kind: Option<EdgeKind>,
    pub parent_id: Option<SpanId>,
    pub score_breakdown: f32,
}

/// Why traversal stopped producing new nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    DepthLimitReached,
    TokenBudgetExceeded,
    EdgeIndexUnavailable,
    FrontierExhausted,
}

/// Result of one bounded traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalResult {
    pub visited: Vec<VisitedNode>,
    pub tokens_used: i32,
    pub halt_reason: HaltReason,
}

struct FrontierItem {
    span_id: SpanId,
    depth: u32,
    via_edge_kind: Option<EdgeKind>,
    parent_id: Option<SpanId>,
    priority: f32,
    seed_score: f32,
}

/// Deterministic visit order: priority descending, then edge-kind
/// priority, then span id. Ordered so the item the traversal should pop
/// next compares greatest, matching `BinaryHeap`'s max-heap pop.
impl Ord for FrontierItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                edge_kind_rank(other.via_edge_kind).cmp(&edge_kind_rank(self.via_edge_kind))
            })
            .then_with(|| other.span_id.as_uuid().cmp(&self.span_id.as_uuid()))
    }
}

impl PartialOrd for FrontierItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for FrontierItem {}

/// Run a best-first bounded BFS from `seeds`.
///
/// `content_tokens` returns the token cost of tentatively adding a span;
/// it is consulted before a node is committed to `visited`. `max_depth`
/// is clamped to 5 regardless of what is requested.
pub async fn traverse<I, F>(
    seeds: &[(SpanId, f32)],
    edge_index: &I,
    allowed_kinds: &[EdgeKind],
    direction: Direction,
    max_depth: u32,
    token_budget: i32,
    content_tokens: F,
) -> TraversalResult
where
    I: EdgeIndex,
    F: Fn(SpanId) -> i32,
{
    let max_depth = max_depth.min(5);
    let mut visited: Vec<VisitedNode> = Vec::new();
    let mut visited_ids: std::collections::HashSet<SpanId> = std::collections::HashSet::new();
    let mut tokens_used: i32 = 0;

    let mut frontier: std::collections::BinaryHeap<FrontierItem> = seeds
        .iter()
        .map(|(id, score)| FrontierItem {
            span_id: *id,
            depth: 0,
            via_edge_kind: None,
            parent_id: None,
            priority: *score,
            seed_score: *score,
        })
        .collect();

    let mut halt_reason = HaltReason::FrontierExhausted;
    let mut index_unavailable = false;

    while let Some(next) = frontier.pop() {
        if visited_ids.contains(&next.span_id) {
            continue;
        }

        let cost = content_tokens(next.span_id);
        if tokens_used + cost > token_budget {
            halt_reason = HaltReason::TokenBudgetExceeded;
            break;
        }

        tokens_used += cost;
        visited_ids.insert(next.span_id);
        visited.push(VisitedNode {
            span_id: next.span_id,
            depth: next.depth,
            via_edge_kind: next.via_edge_kind,
            parent_id: next.parent_id,
            score_breakdown: next.priority,
        });

        if next.depth >= max_depth {
            continue;
        }

        match edge_index
            .edges_from(next.span_id, direction, allowed_kinds)
            .await
        {
            None => {
                index_unavailable = true;
                continue;
            }
            Some(edges) => {
                for edge in edges {
                    let neighbor = if edge.from == next.span_id {
                        edge.to
                    } else {
                        edge.from
                    };
                    if visited_ids.contains(&neighbor) {
                        continue;
                    }
                    let depth = next.depth + 1;
                    let priority =
                        (1.0 / (depth as f32 + 1.0)) * edge.kind.weight() * next.seed_score;
                    frontier.push(FrontierItem {
                        span_id: neighbor,
                        depth,
                        via_edge_kind: Some(edge.kind),
                        parent_id: Some(next.span_id),
                        priority,
                        seed_score: next.seed_score,
                    });
                }
            }
        }
    }

    if halt_reason == HaltReason::FrontierExhausted {
        if index_unavailable && visited.len() == seeds.len() {
            halt_reason = HaltReason::EdgeIndexUnavailable;
        } else if visited.iter().any(|n| n.depth >= max_depth) {
            halt_reason = HaltReason::DepthLimitReached;
        }
    }

    TraversalResult {
        visited,
        tokens_used,
        halt_reason,
    }
}

fn edge_kind_rank(kind: Option<EdgeKind>) -> u8 {
    kind.map(EdgeKind::priority_rank).unwrap_or(255)
}
