//! Error types for PAMPAX operations.
//!
//! Domain error enums live here rather than in the behavior crates that
//! raise them: one small enum per failure domain, aggregated into a
//! single top-level error.

use crate::SpanId;
use thiserror::Error;

/// Bad query/budget/model on the request surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("budget must be > 0, got {budget}")]
    NonPositiveBudget { budget: i64 },

    #[error("unknown model: {model}")]
    UnknownModel { model: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Token counting / budgeting errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("budget must be >= 0, got {budget}")]
    NegativeBudget { budget: i64 },
}

/// Intent classification errors. Classification is total over any
/// input string, so this is currently uninhabited but kept for symmetry
/// and future extension (e.g. pluggable classifiers that can fail).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntentError {
    #[error("classifier produced an unnormalized confidence: {confidence}")]
    UnnormalizedConfidence { confidence: String },
}

/// Policy gate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("maxDepth must be in 1..=5, got {max_depth}")]
    DepthOutOfRange { max_depth: i32 },

    #[error("earlyStopThreshold must be in 1..=10, got {threshold}")]
    ThresholdOutOfRange { threshold: i32 },
}

/// Seed mix optimizer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SeedMixError {
    #[error("seed weights must be non-negative, got {weight} for {producer}")]
    NegativeWeight { producer: String, weight: f32 },
}

/// Hybrid ranker / RRF errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RankError {
    #[error("RRF constant k must be > 0, got {k}")]
    NonPositiveK { k: f32 },
}

/// Graph traversal errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("edge index unavailable")]
    EdgeIndexUnavailable,

    #[error("maxDepth must be in 1..=5, got {max_depth}")]
    DepthOutOfRange { max_depth: i32 },
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache namespace not found: {namespace}")]
    UnknownNamespace { namespace: String },
}

/// Evidence tracker / stopping-reason errors (C8/C9). Recording is
/// infallible by construction; kept for symmetry with the other domains
/// and for invariant checks performed at session close.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("bundle item {item:?} has no matching evidence record")]
    MissingEvidence { item: String },

    #[error("session ended with zero recorded stopping conditions")]
    NoStoppingCondition,
}

/// Store (external collaborator) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("span not found: {0:?}")]
    SpanNotFound(SpanId),

    #[error("index version mismatch: expected {expected}, got {got}")]
    IndexVersionMismatch { expected: String, got: String },
}

/// Master error type for all PAMPAX operations.
#[derive(Debug, Clone, Error)]
pub enum PampaxError {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("intent error: {0}")]
    Intent(#[from] IntentError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("seed mix error: {0}")]
    SeedMix(#[from] SeedMixError),

    #[error("rank error: {0}")]
    Rank(#[from] RankError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("evidence error: {0}")]
    Evidence(#[from] EvidenceError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("operation timed out in phase {phase}")]
    Timeout { phase: String },

    #[error("operation cancelled in phase {phase}")]
    Cancelled { phase: String },

    #[error("internal invariant violated: {reason}")]
    Internal { reason: String },
}

impl PampaxError {
    /// Map to a CLI-style exit code.
    ///
    /// The core never exits a process; this is a convenience for callers
    /// (an out-of-scope CLI surface) that want a ready-made mapping.
    pub fn exit_code(&self) -> i32 {
        match self {
            PampaxError::Input(_) | PampaxError::Config(_) => 2,
            PampaxError::Store(_) => 5,
            PampaxError::Timeout { .. } => 4,
            PampaxError::Internal { .. } => 1,
            _ => 1,
        }
    }
}

/// Result type alias for PAMPAX operations.
pub type PampaxResult<T> = Result<T, PampaxError>;
