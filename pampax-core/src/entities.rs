//! Data-model entities shared by every PAMPAX crate.
//!
//! Behavior (ranking, traversal, packing) lives in the downstream crates;
//! this module only holds the shapes they read and write.

use crate::enums::{
    AssemblyPhase, EdgeKind, Intent, MemoryScope, PackAction, ProducerSource, Severity, StopKind,
};
use crate::identity::{MemoryItemId, SessionId, SpanId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A parsed, indexed unit of source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    pub repo: String,
    pub path: String,
    pub byte_start: u32,
    pub byte_end: u32,
    pub kind: crate::enums::SpanKind,
    pub name: Option<String>,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub parents: Vec<SpanId>,
    pub references: Vec<SpanId>,
    /// Source text covered by `byte_start..byte_end`, used for token
    /// counting and rendering. Not part of the id-stability invariant.
    pub content: String,
}

/// A directed relation between two spans. `(from, to, kind)` is idempotent
/// under repeated indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: SpanId,
    pub to: SpanId,
    pub kind: EdgeKind,
}

/// A durable or session-scoped memory note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: MemoryItemId,
    pub session_id: SessionId,
    pub scope: MemoryScope,
    pub text: String,
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub last_used_at: Timestamp,
    pub embedding: Option<Vec<f32>>,
}

/// Feedback recorded about a past retrieval, used to re-weight seed mixes
/// and policy thresholds (the seed-mix learning loop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSignal {
    pub session_id: SessionId,
    pub query: String,
    pub intent: Intent,
    pub bundle_signature: String,
    pub satisfied: bool,
    pub time_to_fix_ms: i64,
    pub token_usage: i32,
    pub seed_weights: HashMap<String, f32>,
    pub policy_thresholds: HashMap<String, f32>,
}

/// Reference to any retrievable item, unifying spans and memory items
/// across search results, evidence, and bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemRef {
    Span(SpanId),
    Memory(MemoryItemId),
}

/// One producer's ranked hit for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub item_id: ItemRef,
    pub score: f32,
    pub rank_in_source: u32,
    pub source: ProducerSource,
}

/// Per-producer score contributions behind a fused score, kept for
/// explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub fused: f32,
    pub components: Vec<(ProducerSource, f32)>,
}

/// Why an item is in the candidate set, with enough provenance to explain
/// it in the final bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub item_id: ItemRef,
    pub reason: String,
    pub edge_kind: Option<EdgeKind>,
    pub rank: u32,
    pub source: ProducerSource,
    pub cached: bool,
    pub score_breakdown: ScoreBreakdown,
    pub tokens: i32,
    pub action: PackAction,
}

/// Query-routing policy gate. An enumerated, closed set of fields —
/// unknown keys in a serialized policy are rejected by serde's default
/// (non-`#[serde(flatten)]`) struct handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub max_depth: i32,
    pub early_stop_threshold: i32,
    pub allow_graph_expansion: bool,
    pub allow_memory: bool,
    pub min_score: f32,
}

impl Policy {
    pub fn default_for(intent: Intent) -> Self {
        match intent {
            Intent::Symbol | Intent::Api => Policy {
                max_depth: 3,
                early_stop_threshold: 5,
                allow_graph_expansion: true,
                allow_memory: true,
                min_score: 0.1,
            },
            Intent::Config => Policy {
                max_depth: 1,
                early_stop_threshold: 3,
                allow_graph_expansion: true,
                allow_memory: true,
                min_score: 0.15,
            },
            Intent::Incident => Policy {
                max_depth: 4,
                early_stop_threshold: 8,
                allow_graph_expansion: true,
                allow_memory: true,
                min_score: 0.05,
            },
            Intent::Refactor => Policy {
                max_depth: 5,
                early_stop_threshold: 10,
                allow_graph_expansion: true,
                allow_memory: false,
                min_score: 0.05,
            },
            Intent::Search => Policy {
                max_depth: 2,
                early_stop_threshold: 6,
                allow_graph_expansion: false,
                allow_memory: true,
                min_score: 0.1,
            },
        }
    }
}

/// Seed-mix weights and fan-out bounds for one request. Also an
/// enumerated, closed set of fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedMixConfig {
    pub vector_weight: f32,
    pub bm25_weight: f32,
    pub memory_weight: f32,
    pub symbol_weight: f32,
    pub max_depth: i32,
    pub early_stop_threshold: i32,
    pub confidence_multiplier: f32,
}

impl SeedMixConfig {
    pub fn base_profile(intent: Intent) -> Self {
        match intent {
            Intent::Symbol => SeedMixConfig {
                bm25_weight: 0.1,
                vector_weight: 0.2,
                symbol_weight: 0.6,
                memory_weight: 0.1,
                max_depth: 3,
                early_stop_threshold: 5,
                confidence_multiplier: 1.0,
            },
            Intent::Api => SeedMixConfig {
                bm25_weight: 0.2,
                vector_weight: 0.3,
                symbol_weight: 0.4,
                memory_weight: 0.1,
                max_depth: 2,
                early_stop_threshold: 5,
                confidence_multiplier: 1.0,
            },
            Intent::Config => SeedMixConfig {
                bm25_weight: 0.5,
                vector_weight: 0.2,
                symbol_weight: 0.2,
                memory_weight: 0.1,
                max_depth: 1,
                early_stop_threshold: 3,
                confidence_multiplier: 1.0,
            },
            Intent::Incident => SeedMixConfig {
                bm25_weight: 0.2,
                vector_weight: 0.3,
                symbol_weight: 0.2,
                memory_weight: 0.3,
                max_depth: 4,
                early_stop_threshold: 8,
                confidence_multiplier: 1.0,
            },
            Intent::Refactor => SeedMixConfig {
                bm25_weight: 0.15,
                vector_weight: 0.25,
                symbol_weight: 0.5,
                memory_weight: 0.1,
                max_depth: 5,
                early_stop_threshold: 10,
                confidence_multiplier: 1.0,
            },
            Intent::Search => SeedMixConfig {
                bm25_weight: 0.35,
                vector_weight: 0.35,
                symbol_weight: 0.15,
                memory_weight: 0.15,
                max_depth: 2,
                early_stop_threshold: 6,
                confidence_multiplier: 1.0,
            },
        }
    }

    /// Scale the four producer weights by `0.7 + 0.3 * confidence`
    ///, leaving depth/threshold/multiplier untouched.
    pub fn scaled_by_confidence(mut self, confidence: f32) -> Self {
        let factor = 0.7 + 0.3 * confidence.clamp(0.0, 1.0);
        self.bm25_weight *= factor;
        self.vector_weight *= factor;
        self.symbol_weight *= factor;
        self.memory_weight *= factor;
        self.confidence_multiplier = factor;
        self
    }

    /// Clamp `max_depth` and `early_stop_threshold` to a policy's ceiling.
    pub fn clamp_to_policy(mut self, policy_max_depth: i32, policy_early_stop: i32) -> Self {
        self.max_depth = self.max_depth.min(policy_max_depth);
        self.early_stop_threshold = self.early_stop_threshold.min(policy_early_stop);
        self
    }

    /// Normalize the four producer weights to sum to 1.0, leaving an
    /// all-zero mix untouched.
    pub fn normalized(self) -> Self {
        let sum = self.bm25_weight + self.vector_weight + self.symbol_weight + self.memory_weight;
        if sum <= f32::EPSILON {
            return self;
        }
        SeedMixConfig {
            bm25_weight: self.bm25_weight / sum,
            vector_weight: self.vector_weight / sum,
            symbol_weight: self.symbol_weight / sum,
            memory_weight: self.memory_weight / sum,
            ..self
        }
    }
}

/// A single item placed into the final bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BundleItem {
    Span(Span),
    Memory(MemoryItem),
}

impl BundleItem {
    pub fn item_ref(&self) -> ItemRef {
        match self {
            BundleItem::Span(s) => ItemRef::Span(s.id),
            BundleItem::Memory(m) => ItemRef::Memory(m.id),
        }
    }
}

/// A recorded reason assembly stopped producing, degrading, or expanding
/// further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopCondition {
    pub kind: StopKind,
    pub severity: Severity,
    pub phase: AssemblyPhase,
    pub title: String,
    pub explanation: String,
    pub recommendation: String,
    pub tokens_used: i32,
    pub tokens_budget: i32,
    pub items_considered: u32,
    pub items_kept: u32,
    /// Which producer this condition is about, when it is producer-scoped
    /// (e.g. `SearchFailure`); `None` for conditions that apply to the
    /// whole request.
    pub producer: Option<String>,
}

/// Cache hit/miss counters attached to a finished bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_served: u64,
}

/// The final assembled context handed back to the caller (C10/C11 output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub items: Vec<BundleItem>,
    pub total_tokens: i32,
    pub budget: i32,
    pub intent: Intent,
    pub policy: Policy,
    pub evidence: Vec<Evidence>,
    pub stopping_reasons: Vec<StopCondition>,
    pub cache_stats: CacheStats,
}

/// Mutable state threaded through one assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub query: String,
    pub budget: i32,
    pub limit: u32,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub conditions: Vec<StopCondition>,
}
