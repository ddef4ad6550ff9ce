//! Enum types for PAMPAX entities and pipeline phases.

use serde::{Deserialize, Serialize};

/// Kind of a parsed source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanKind {
    Module,
    Class,
    Function,
    Method,
    Field,
    Const,
    Interface,
    Enum,
    Other,
}

/// Kind of a directed code-graph relation between two spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Call,
    Import,
    TestOf,
    Routes,
    ConfigKey,
}

impl EdgeKind {
    /// Static edge weight used by the graph traverser's priority score.
    pub fn weight(self) -> f32 {
        match self {
            EdgeKind::Call => 1.0,
            EdgeKind::Routes => 0.9,
            EdgeKind::TestOf => 0.8,
            EdgeKind::Import => 0.7,
            EdgeKind::ConfigKey => 0.6,
        }
    }

    /// Fixed tie-break priority used for deterministic traversal order
    /// (lower sorts first, i.e. higher priority).
    pub fn priority_rank(self) -> u8 {
        match self {
            EdgeKind::Call => 0,
            EdgeKind::Routes => 1,
            EdgeKind::TestOf => 2,
            EdgeKind::Import => 3,
            EdgeKind::ConfigKey => 4,
        }
    }
}

/// Retention scope of a `MemoryItem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryScope {
    Pinned,
    Auto,
    Ephemeral,
}

/// Which producer emitted a `SearchResult` or contributed an `Evidence`
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProducerSource {
    Lex,
    Vec,
    Sym,
    Mem,
    Graph,
}

impl ProducerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ProducerSource::Lex => "lex",
            ProducerSource::Vec => "vec",
            ProducerSource::Sym => "sym",
            ProducerSource::Mem => "mem",
            ProducerSource::Graph => "graph",
        }
    }
}

/// Classified query intent. Ties are broken by the fixed priority
/// order `Symbol > Api > Config > Incident > Refactor > Search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    Symbol,
    Api,
    Config,
    Incident,
    Refactor,
    Search,
}

impl Intent {
    /// All variants in fixed tie-break priority order (highest first).
    pub const PRIORITY_ORDER: [Intent; 6] = [
        Intent::Symbol,
        Intent::Api,
        Intent::Config,
        Intent::Incident,
        Intent::Refactor,
        Intent::Search,
    ];

    pub fn priority_rank(self) -> u8 {
        Self::PRIORITY_ORDER
            .iter()
            .position(|i| *i == self)
            .expect("Intent::PRIORITY_ORDER is exhaustive") as u8
    }
}

/// Graph traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Callers,
    Callees,
    Both,
}

/// Enumerated, non-overlapping stopping-reason kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopKind {
    TokenBudgetExceeded,
    ResultLimitReached,
    QualityThreshold,
    SearchFailure,
    CacheBoundary,
    GraphDepthLimit,
    GraphTokenLimit,
    Timeout,
    DegradationTriggered,
    CompletedNormally,
}

impl StopKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StopKind::TokenBudgetExceeded => "token-budget-exceeded",
            StopKind::ResultLimitReached => "result-limit-reached",
            StopKind::QualityThreshold => "quality-threshold",
            StopKind::SearchFailure => "search-failure",
            StopKind::CacheBoundary => "cache-boundary",
            StopKind::GraphDepthLimit => "graph-depth-limit",
            StopKind::GraphTokenLimit => "graph-token-limit",
            StopKind::Timeout => "timeout",
            StopKind::DegradationTriggered => "degradation-triggered",
            StopKind::CompletedNormally => "completed-normally",
        }
    }
}

/// Severity of a recorded stopping condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Med,
    High,
}

/// Assembly pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssemblyPhase {
    Init,
    Classify,
    Plan,
    Retrieve,
    Fuse,
    Expand,
    Pack,
    Explain,
    Done,
    Error,
}

impl AssemblyPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            AssemblyPhase::Init => "init",
            AssemblyPhase::Classify => "classify",
            AssemblyPhase::Plan => "plan",
            AssemblyPhase::Retrieve => "retrieve",
            AssemblyPhase::Fuse => "fuse",
            AssemblyPhase::Expand => "expand",
            AssemblyPhase::Pack => "pack",
            AssemblyPhase::Explain => "explain",
            AssemblyPhase::Done => "done",
            AssemblyPhase::Error => "error",
        }
    }
}

/// Reason an item was included, degraded, or dropped from the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackAction {
    Kept,
    Degraded,
    Dropped,
}
