//! Policy Gate: maps `(intent, repoHints)` to a concrete `Policy`.

use pampax_core::{Intent, Policy, PolicyError};

/// Repository-level hints that can widen or narrow the intent's default
/// policy. All fields are optional nudges, never hard requirements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoHints {
    /// Repository is small enough that wider graph expansion is cheap.
    pub small_repo: bool,
    /// Caller explicitly disabled graph expansion for this request.
    pub disable_graph: bool,
    /// Caller explicitly disabled memory recall for this request.
    pub disable_memory: bool,
}

/// Select a `Policy` for `intent`, adjusted by `hints`, and validate it.
pub fn select_policy(intent: Intent, hints: &RepoHints) -> Result<Policy, PolicyError> {
    let mut policy = Policy::default_for(intent);

    if hints.small_repo {
        policy.max_depth = (policy.max_depth + 1).min(5);
    }
    if hints.disable_graph {
        policy.allow_graph_expansion = false;
    }
    if hints.disable_memory {
        policy.allow_memory = false;
    }

    validate(&policy)?;
    Ok(policy)
}

fn validate(policy: &Policy) -> Result<(), PolicyError> {
    if !(1..=5).contains(&policy.max_depth) {
        return Err(PolicyError::DepthOutOfRange {
            max_depth: policy.max_depth,
        });
    }
    if !(1..=10).contains(&policy.early_stop_threshold) {
        return Err(PolicyError::ThresholdOutOfRange {
            threshold: policy.early_stop_threshold,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_intent_gets_depth_three() {
        let policy = select_policy(Intent::Symbol, &RepoHints::default()).unwrap();
        assert_eq!(policy.max_depth, 3);
        assert!(policy.allow_graph_expansion);
    }

    #[test]
    fn config_intent_gets_depth_one_with_single_hop_graph() {
        let policy = select_policy(Intent::Config, &RepoHints::default()).unwrap();
        assert_eq!(policy.max_depth, 1);
        assert!(policy.allow_graph_expansion);
    }

    #[test]
    fn incident_intent_gets_depth_four() {
        let policy = select_policy(Intent::Incident, &RepoHints::default()).unwrap();
        assert_eq!(policy.max_depth, 4);
    }

    #[test]
    fn small_repo_hint_widens_depth_without_exceeding_cap() {
        let hints = RepoHints {
            small_repo: true,
            ..Default::default()
        };
        let policy = select_policy(Intent::Refactor, &hints).unwrap();
        assert_eq!(policy.max_depth, 5); // refactor base is already 5, clamped
    }

    #[test]
    fn disable_graph_hint_overrides_intent_default() {
        let hints = RepoHints {
            disable_graph: true,
            ..Default::default()
        };
        let policy = select_policy(Intent::Symbol, &hints).unwrap();
        assert!(!policy.allow_graph_expansion);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn any_intent() -> impl Strategy<Value = Intent> {
        prop_oneof![
            Just(Intent::Symbol),
            Just(Intent::Api),
            Just(Intent::Config),
            Just(Intent::Incident),
            Just(Intent::Refactor),
            Just(Intent::Search),
        ]
    }

    proptest! {
        #[test]
        fn prop_selected_policy_always_valid(
            intent in any_intent(),
            small_repo in any::<bool>(),
            disable_graph in any::<bool>(),
            disable_memory in any::<bool>(),
        ) {
            let hints = RepoHints { small_repo, disable_graph, disable_memory };
            let policy = select_policy(intent, &hints).unwrap();
            prop_assert!((1..=5).contains(&policy.max_depth));
            prop_assert!((1..=10).contains(&policy.early_stop_threshold));
        }
    }
}
