//! Evidence Tracker and Stopping-Reason Engine.
//!
//! Both are passive accumulators threaded through the assembly phases:
//! phases emit into them, never read back out, which prevents the
//! phases from developing an implicit ordering dependency on each
//! other's bookkeeping.

use pampax_core::{
    AssemblyPhase, Evidence, EvidenceError, ItemRef, Severity, StopCondition, StopKind,
};

/// Accumulates per-item provenance for one assembly request.
#[derive(Debug, Clone, Default)]
pub struct EvidenceSink {
    records: Vec<Evidence>,
}

impl EvidenceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, evidence: Evidence) {
        self.records.push(evidence);
    }

    pub fn records(&self) -> &[Evidence] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Evidence> {
        self.records
    }

    /// Every kept item must have exactly one evidence record with a
    /// matching id.
    pub fn validate_completeness(&self, kept_items: &[ItemRef]) -> Result<(), EvidenceError> {
        for item in kept_items {
            let count = self
                .records
                .iter()
                .filter(|e| e.item_id == *item)
                .count();
            if count != 1 {
                return Err(EvidenceError::MissingEvidence {
                    item: format!("{item:?}"),
                });
            }
        }
        Ok(())
    }
}

/// Accumulates stopping-reason conditions for one assembly session.
#[derive(Debug, Clone, Default)]
pub struct StopConditionLog {
    conditions: Vec<StopCondition>,
}

impl StopConditionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, condition: StopCondition) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[StopCondition] {
        &self.conditions
    }

    pub fn into_conditions(self) -> Vec<StopCondition> {
        self.conditions
    }

    /// Pure function over recorded conditions: true iff any carries
    /// `High` severity.
    pub fn should_stop(&self) -> bool {
        self.conditions.iter().any(|c| c.severity == Severity::High)
    }

    /// Every request must end with at least one condition, minimally
    /// `completed-normally`.
    pub fn validate_nonempty(&self) -> Result<(), EvidenceError> {
        if self.conditions.is_empty() {
            return Err(EvidenceError::NoStoppingCondition);
        }
        Ok(())
    }
}

/// Human-facing templates for each `StopKind`, filled in with the
/// numeric facts of one occurrence.
pub struct StopConditionFacts {
    pub phase: AssemblyPhase,
    pub severity: Severity,
    pub tokens_used: i32,
    pub tokens_budget: i32,
    pub items_considered: u32,
    pub items_kept: u32,
    /// Producer identity for producer-scoped conditions (`SearchFailure`);
    /// `None` for conditions that apply to the whole request.
    pub producer: Option<String>,
}

/// Build a fully-worded `StopCondition` for `kind` from `facts`.
pub fn build_condition(kind: StopKind, facts: StopConditionFacts) -> StopCondition {
    let (title, explanation, recommendation) = templates(kind, &facts);
    StopCondition {
        kind,
        severity: facts.severity,
        phase: facts.phase,
        title,
        explanation,
        recommendation,
        tokens_used: facts.tokens_used,
        tokens_budget: facts.tokens_budget,
        items_considered: facts.items_considered,
        items_kept: facts.items_kept,
        producer: facts.producer,
    }
}

fn templates(kind: StopKind, facts: &StopConditionFacts) -> (String, String, String) {
    match kind {
        StopKind::TokenBudgetExceeded => (
            "Token budget exceeded".to_string(),
            format!(
                "Packing used {} of {} available tokens before all candidates fit.",
                facts.tokens_used, facts.tokens_budget
            ),
            "Increase the token budget or narrow the query to reduce candidate volume.".to_string(),
        ),
        StopKind::ResultLimitReached => (
            "Result limit reached".to_string(),
            format!(
                "{} of {} considered items were kept; the remainder were cut by the result limit.",
                facts.items_kept, facts.items_considered
            ),
            "Raise the result limit if the dropped items look relevant.".to_string(),
        ),
        StopKind::QualityThreshold => (
            "Quality threshold not met".to_string(),
            "Remaining candidates scored below the policy's minimum relevance threshold."
                .to_string(),
            "Broaden the query or lower the policy's minimum score.".to_string(),
        ),
        StopKind::SearchFailure => (
            match &facts.producer {
                Some(producer) => format!("Producer search failed: {producer}"),
                None => "Producer search failed".to_string(),
            },
            match &facts.producer {
                Some(producer) => format!(
                    "The {producer} retrieval producer failed; its weight was zeroed for this request."
                ),
                None => "One or more retrieval producers failed; their weight was zeroed for this request."
                    .to_string(),
            },
            "Retry once the affected producer's backing store recovers.".to_string(),
        ),
        StopKind::CacheBoundary => (
            "Cache boundary crossed".to_string(),
            "The index version changed since the cache was last warmed, forcing a fresh lookup."
                .to_string(),
            "No action needed; subsequent calls will hit the refreshed cache.".to_string(),
        ),
        StopKind::GraphDepthLimit => (
            "Graph depth limit reached".to_string(),
            format!(
                "Traversal stopped at the policy's maximum depth after considering {} items.",
                facts.items_considered
            ),
            "Raise the policy's maxDepth to expand further.".to_string(),
        ),
        StopKind::GraphTokenLimit => (
            "Graph expansion token limit reached".to_string(),
            format!(
                "Expansion used {} of its {}-token reservation before the frontier was exhausted.",
                facts.tokens_used, facts.tokens_budget
            ),
            "Increase the overall token budget to grow the expansion reservation.".to_string(),
        ),
        StopKind::Timeout => (
            "Phase timeout".to_string(),
            format!("The {} phase missed its wall-clock deadline.", facts.phase.as_str()),
            "Retry, or raise the phase timeout if this occurs consistently.".to_string(),
        ),
        StopKind::DegradationTriggered => (
            "Items degraded to fit budget".to_string(),
            "One or more items were replaced with a shorter capsule before any were dropped."
                .to_string(),
            "Increase the token budget to keep full content for all items.".to_string(),
        ),
        StopKind::CompletedNormally => (
            "Completed normally".to_string(),
            format!(
                "Assembly finished with {} of {} considered items kept, within budget.",
                facts.items_kept, facts.items_considered
            ),
            "No action needed.".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pampax_core::{ProducerSource, ScoreBreakdown, SpanId, PackAction};

    fn facts() -> StopConditionFacts {
        StopConditionFacts {
            phase: AssemblyPhase::Pack,
            severity: Severity::Low,
            tokens_used: 100,
            tokens_budget: 200,
            items_considered: 10,
            items_kept: 8,
            producer: None,
        }
    }

    #[test]
    fn search_failure_explanation_names_the_producer() {
        let mut with_producer = facts();
        with_producer.producer = Some("vec".to_string());
        let cond = build_condition(StopKind::SearchFailure, with_producer);
        assert!(cond.title.contains("vec"));
        assert!(cond.explanation.contains("vec"));
    }

    #[test]
    fn should_stop_true_only_on_high_severity() {
        let mut log = StopConditionLog::new();
        log.record(build_condition(StopKind::CompletedNormally, facts()));
        assert!(!log.should_stop());

        let mut high_facts = facts();
        high_facts.severity = Severity::High;
        log.record(build_condition(StopKind::Timeout, high_facts));
        assert!(log.should_stop());
    }

    #[test]
    fn validate_nonempty_rejects_empty_log() {
        let log = StopConditionLog::new();
        assert!(log.validate_nonempty().is_err());
    }

    #[test]
    fn evidence_completeness_detects_missing_record() {
        let span = SpanId::now_v7();
        let sink = EvidenceSink::new();
        let err = sink.validate_completeness(&[ItemRef::Span(span)]).unwrap_err();
        assert!(matches!(err, EvidenceError::MissingEvidence { .. }));
    }

    #[test]
    fn evidence_completeness_passes_with_exactly_one_record() {
        let span = SpanId::now_v7();
        let mut sink = EvidenceSink::new();
        sink.record(Evidence {
            item_id: ItemRef::Span(span),
            reason: "top-ranked".into(),
            edge_kind: None,
            rank: 0,
            source: ProducerSource::Sym,
            cached: false,
            score_breakdown: ScoreBreakdown {
                fused: 1.0,
                components: vec![],
            },
            tokens: 50,
            action: PackAction::Kept,
        });
        assert!(sink.validate_completeness(&[ItemRef::Span(span)]).is_ok());
    }

    #[test]
    fn templates_reference_the_numeric_facts() {
        let cond = build_condition(StopKind::TokenBudgetExceeded, facts());
        assert!(cond.explanation.contains("100"));
        assert!(cond.explanation.contains("200"));
    }
}
