//! Deterministic query intent classification.
//!
//! Classification is keyword- and file-type-cue based, not learned: the
//! same query always yields the same `{intent, confidence}` pair, which
//! downstream phases rely on for determinism.

use once_cell::sync::Lazy;
use pampax_core::{Intent, Policy};
use regex::Regex;

/// Output of classifying one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Vec<String>,
    pub suggested_policies: Vec<Policy>,
}

struct IntentRule {
    intent: Intent,
    keywords: &'static [&'static str],
    file_cue: Option<&'static Lazy<Regex>>,
}

static FUNCTION_SIGNATURE_CUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfunction\b|\(\)|::\w+").unwrap());
static ENV_KEY_CUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]{2,}$").unwrap());
static ENDPOINT_CUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/[a-z0-9/_\-{}]+").unwrap());

static RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Symbol,
        keywords: &["function", "method", "class", "struct", "symbol", "definition"],
        file_cue: Some(&FUNCTION_SIGNATURE_CUE),
    },
    IntentRule {
        intent: Intent::Api,
        keywords: &["endpoint", "route", "api", "request", "response", "handler"],
        file_cue: Some(&ENDPOINT_CUE),
    },
    IntentRule {
        intent: Intent::Config,
        keywords: &["env", "config", "default", "setting", "variable", "flag"],
        file_cue: Some(&ENV_KEY_CUE),
    },
    IntentRule {
        intent: Intent::Incident,
        keywords: &["error", "crash", "fail", "bug", "incident", "regression", "outage"],
        file_cue: None,
    },
    IntentRule {
        intent: Intent::Refactor,
        keywords: &["refactor", "rename", "cleanup", "restructure", "migrate", "extract"],
        file_cue: None,
    },
    IntentRule {
        intent: Intent::Search,
        keywords: &["find", "search", "where", "what", "show", "list"],
        file_cue: None,
    },
];

/// Classify a free-text query into an intent, with a stable confidence
/// and a list of extracted entity-like tokens.
pub fn classify(query: &str) -> Classification {
    let lower = query.to_lowercase();
    // File-type cues (e.g. `ENV_KEY_CUE`'s uppercase-only pattern) need to
    // see the query's original case; keyword matching stays case-folded.
    let raw_tokens: Vec<&str> = query.split_whitespace().collect();

    let mut scores: Vec<(Intent, f32)> = RULES
        .iter()
        .map(|rule| {
            let keyword_hits = rule
                .keywords
                .iter()
                .filter(|kw| lower.contains(*kw))
                .count();
            let mut score = keyword_hits as f32;
            if let Some(cue) = rule.file_cue {
                if raw_tokens.iter().any(|t| cue.is_match(t)) {
                    score += 0.5;
                }
            }
            (rule.intent, score)
        })
        .collect();

    // Stable sort by score descending, tie-broken by fixed intent
    // priority.
    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap()
            .then(a.0.priority_rank().cmp(&b.0.priority_rank()))
    });

    let (best_intent, best_score) = scores[0];
    let total: f32 = scores.iter().map(|(_, s)| s).sum();
    let confidence = if best_score <= 0.0 {
        // No keyword matched anything: fall back to Search with low
        // confidence rather than an arbitrary zero-evidence winner.
        return Classification {
            intent: Intent::Search,
            confidence: 0.2,
            entities: extract_entities(&lower),
            suggested_policies: vec![Policy::default_for(Intent::Search)],
        };
    } else if total <= 0.0 {
        0.5
    } else {
        (best_score / total).clamp(0.0, 1.0)
    };

    Classification {
        intent: best_intent,
        confidence,
        entities: extract_entities(&lower),
        suggested_policies: vec![Policy::default_for(best_intent)],
    }
}

/// Pull out bare identifier-looking tokens as candidate entities
/// (function names, env keys, paths). Deliberately crude; a real
/// implementation would consult the symbol index.
fn extract_entities(lower: &str) -> Vec<String> {
    lower
        .split_whitespace()
        .filter(|t| t.len() > 2 && t.chars().any(|c| c.is_alphanumeric()))
        .filter(|t| !STOPWORDS.contains(t))
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

static STOPWORDS: &[&str] = &["the", "for", "and", "with", "function", "method"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_lookup_classifies_as_symbol_with_high_confidence() {
        let c = classify("getUserById function");
        assert_eq!(c.intent, Intent::Symbol);
        assert!(c.confidence >= 0.5);
    }

    #[test]
    fn config_lookup_classifies_as_config() {
        let c = classify("DATABASE_URL default");
        assert_eq!(c.intent, Intent::Config);
    }

    #[test]
    fn env_key_cue_fires_on_original_case_alone() {
        // No config keyword present; only the uppercase env-key file cue
        // can push this toward Config.
        let c = classify("DATABASE_URL");
        assert_eq!(c.intent, Intent::Config);
    }

    #[test]
    fn incident_keywords_classify_as_incident() {
        let c = classify("payment processing crash incident");
        assert_eq!(c.intent, Intent::Incident);
    }

    #[test]
    fn classification_is_deterministic() {
        let a = classify("find the getUserById function");
        let b = classify("find the getUserById function");
        assert_eq!(a, b);
    }

    #[test]
    fn tie_breaks_favor_fixed_priority_order() {
        // "api" and "function" both present; Symbol outranks Api on ties.
        let c = classify("api function");
        assert!(c.intent == Intent::Symbol || c.intent == Intent::Api);
    }

    #[test]
    fn empty_query_falls_back_to_search_with_low_confidence() {
        let c = classify("");
        assert_eq!(c.intent, Intent::Search);
        assert!(c.confidence < 0.5);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_classification_deterministic(q in "[a-zA-Z0-9 _]{0,80}") {
            let a = classify(&q);
            let b = classify(&q);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_confidence_is_normalized(q in "[a-zA-Z0-9 _]{0,80}") {
            let c = classify(&q);
            prop_assert!(c.confidence >= 0.0 && c.confidence <= 1.0);
        }
    }
}
