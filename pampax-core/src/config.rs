//! Runtime configuration for the PAMPAX pipeline.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-phase timeout budget, expressed in milliseconds so it serializes
/// cleanly and round-trips through config files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimeouts {
    pub classify_ms: u64,
    pub plan_ms: u64,
    pub retrieve_ms: u64,
    pub fuse_ms: u64,
    pub expand_ms: u64,
    pub pack_ms: u64,
    pub explain_ms: u64,
}

impl PhaseTimeouts {
    pub fn retrieve(&self) -> Duration {
        Duration::from_millis(self.retrieve_ms)
    }

    pub fn expand(&self) -> Duration {
        Duration::from_millis(self.expand_ms)
    }

    pub fn pack(&self) -> Duration {
        Duration::from_millis(self.pack_ms)
    }
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        PhaseTimeouts {
            classify_ms: 50,
            plan_ms: 50,
            retrieve_ms: 5_000,
            fuse_ms: 100,
            expand_ms: 3_000,
            pack_ms: 1_000,
            explain_ms: 100,
        }
    }
}

/// Retry/backoff parameters for transient Store/Adapter failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 900,
        }
    }
}

/// Cache tuning: TTL, capacity, staleness tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheTuning {
    pub ttl_ms: u64,
    pub max_entries: usize,
    pub max_staleness_ms: u64,
}

impl Default for CacheTuning {
    fn default() -> Self {
        CacheTuning {
            ttl_ms: 5 * 60 * 1_000,
            max_entries: 10_000,
            max_staleness_ms: 30 * 1_000,
        }
    }
}

/// Top-level configuration for one PAMPAX engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PampaxConfig {
    /// Default token budget applied when a request omits one.
    pub default_token_budget: i32,
    /// Hard ceiling no request may exceed, regardless of what it asks for.
    pub max_token_budget: i32,
    /// Default result-count limit applied when a request omits one.
    pub default_result_limit: u32,
    /// RRF fusion constant `k`; must be > 0.
    pub rrf_k: f32,
    /// Maximum graph expansion depth allowed by any policy.
    pub max_graph_depth: i32,
    /// Bound on concurrent producer fan-out.
    pub max_concurrent_producers: usize,
    /// Whole-request deadline; assembly is cancelled past this point
    /// regardless of per-phase timeouts.
    pub overall_deadline_ms: u64,
    pub phase_timeouts: PhaseTimeouts,
    pub retry: RetryConfig,
    pub cache: CacheTuning,
}

impl PampaxConfig {
    /// A configuration with reasonable interactive-latency defaults.
    pub fn default_interactive() -> Self {
        PampaxConfig {
            default_token_budget: 8_000,
            max_token_budget: 64_000,
            default_result_limit: 50,
            rrf_k: 60.0,
            max_graph_depth: 5,
            max_concurrent_producers: 4,
            overall_deadline_ms: 2_000,
            phase_timeouts: PhaseTimeouts::default(),
            retry: RetryConfig::default(),
            cache: CacheTuning::default(),
        }
    }

    /// Validate cross-field and range invariants, one `ConfigError` per
    /// failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_token_budget <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_token_budget".into(),
                value: self.default_token_budget.to_string(),
                reason: "must be > 0".into(),
            });
        }
        if self.max_token_budget < self.default_token_budget {
            return Err(ConfigError::InvalidValue {
                field: "max_token_budget".into(),
                value: self.max_token_budget.to_string(),
                reason: "must be >= default_token_budget".into(),
            });
        }
        if self.default_result_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_result_limit".into(),
                value: self.default_result_limit.to_string(),
                reason: "must be > 0".into(),
            });
        }
        if self.rrf_k <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "rrf_k".into(),
                value: self.rrf_k.to_string(),
                reason: "must be > 0".into(),
            });
        }
        if !(1..=5).contains(&self.max_graph_depth) {
            return Err(ConfigError::InvalidValue {
                field: "max_graph_depth".into(),
                value: self.max_graph_depth.to_string(),
                reason: "must be in 1..=5".into(),
            });
        }
        if self.max_concurrent_producers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_producers".into(),
                value: self.max_concurrent_producers.to_string(),
                reason: "must be > 0".into(),
            });
        }
        if self.overall_deadline_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "overall_deadline_ms".into(),
                value: self.overall_deadline_ms.to_string(),
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interactive_config_is_valid() {
        assert!(PampaxConfig::default_interactive().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_rrf_k() {
        let mut cfg = PampaxConfig::default_interactive();
        cfg.rrf_k = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "rrf_k"
        ));
    }

    #[test]
    fn rejects_graph_depth_out_of_range() {
        let mut cfg = PampaxConfig::default_interactive();
        cfg.max_graph_depth = 6;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_max_budget_below_default() {
        let mut cfg = PampaxConfig::default_interactive();
        cfg.max_token_budget = cfg.default_token_budget - 1;
        assert!(cfg.validate().is_err());
    }
}
