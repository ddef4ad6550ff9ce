//! Token estimation and budget-aware truncation.
//!
//! Token counts are approximate: a cheap chars-to-tokens ratio rather than
//! a real tokenizer, which keeps this on the hot path of every assembly
//! phase without paying for a model-specific BPE pass. The ratio is
//! per-model rather than one flat constant, since different model
//! families tokenize source code at noticeably different densities.

use once_cell::sync::Lazy;
use pampax_core::TokenError;
use std::collections::HashMap;

/// Characters-per-token ratio used when `model` has no profile in
/// [`TOKEN_PROFILES`]. Pinned at 4 chars/token regardless of how any
/// known model's profile is tuned.
const UNKNOWN_MODEL_CHARS_PER_TOKEN: f32 = 4.0;

/// One model's empirically-tuned chars-per-token ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenProfile {
    pub chars_per_token: f32,
}

/// Per-model token-counting profiles. `"default"` keeps the ratio this
/// estimator shipped with before it was made model-aware, tuned for
/// source-code-heavy text, which tends to run shorter per token than
/// prose. Models absent from this table fall back to
/// `UNKNOWN_MODEL_CHARS_PER_TOKEN` in [`profile_for`].
static TOKEN_PROFILES: Lazy<HashMap<&'static str, TokenProfile>> = Lazy::new(|| {
    let mut profiles = HashMap::new();
    profiles.insert("default", TokenProfile { chars_per_token: 0.75 });
    profiles.insert("gpt-4o", TokenProfile { chars_per_token: 0.72 });
    profiles.insert("gpt-4", TokenProfile { chars_per_token: 0.75 });
    profiles.insert("claude-3-opus", TokenProfile { chars_per_token: 0.8 });
    profiles.insert("claude-3-sonnet", TokenProfile { chars_per_token: 0.8 });
    profiles
});

/// Look up `model`'s token-counting profile, falling back to the
/// documented 4-chars-per-token estimate for any model not in the table.
/// This fallback is a graceful default, not an error: an unrecognized
/// model name shouldn't block assembly over a non-essential estimate.
pub fn profile_for(model: &str) -> TokenProfile {
    TOKEN_PROFILES.get(model).copied().unwrap_or(TokenProfile {
        chars_per_token: UNKNOWN_MODEL_CHARS_PER_TOKEN,
    })
}

/// Estimate the token count of `text` under `model`'s profile.
///
/// Always returns at least 1 for non-empty input, and 0 for empty input.
pub fn estimate_tokens(text: &str, model: &str) -> i32 {
    if text.is_empty() {
        return 0;
    }
    let chars_per_token = profile_for(model).chars_per_token;
    ((text.len() as f32) * chars_per_token).ceil().max(1.0) as i32
}

/// Validate a requested budget is usable: negative budgets are rejected.
pub fn validate_budget(budget: i64) -> Result<(), TokenError> {
    if budget < 0 {
        return Err(TokenError::NegativeBudget { budget });
    }
    Ok(())
}

/// Truncate `text` to fit within `budget` estimated tokens for `model`,
/// preferring to cut at a sentence boundary, then a word boundary, then a
/// raw UTF-8-safe byte boundary, in that order.
pub fn truncate_to_token_budget(text: &str, budget: i32, model: &str) -> String {
    if budget <= 0 {
        return String::new();
    }
    if estimate_tokens(text, model) <= budget {
        return text.to_string();
    }

    let chars_per_token = profile_for(model).chars_per_token;
    let target_chars = ((budget as f32) / chars_per_token).floor() as usize;
    let target_chars = target_chars.min(text.len());
    let truncated = safe_truncate(text, target_chars);

    if let Some(cut) = find_sentence_boundary(&truncated) {
        return truncated[..cut].to_string();
    }
    if let Some(cut) = find_word_boundary(&truncated) {
        return truncated[..cut].to_string();
    }
    truncated
}

/// Truncate `s` to at most `max_bytes` bytes without splitting a UTF-8
/// character.
fn safe_truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Find the last sentence-ending punctuation in the trailing quarter of
/// `s`, so truncation doesn't chop mid-sentence when one is close by.
fn find_sentence_boundary(s: &str) -> Option<usize> {
    let search_start = s.len().saturating_sub(s.len() / 4);
    let tail = &s[search_start..];
    let mut best = None;
    for (i, c) in tail.char_indices() {
        if c == '.' || c == '!' || c == '?' {
            best = Some(search_start + i + c.len_utf8());
        }
    }
    best.filter(|&end| end > 0)
}

/// Find the last whitespace boundary in `s`, so truncation doesn't split
/// a word in half.
fn find_word_boundary(s: &str) -> Option<usize> {
    s.rfind(char::is_whitespace).map(|i| i)
}

/// A text fragment degraded to a cheaper form (e.g. signature-only
/// instead of full body) to survive a tight budget.
pub fn degrade_to_signature(signature: Option<&str>, full: &str, model: &str) -> String {
    match signature {
        Some(sig) if !sig.is_empty() => sig.to_string(),
        _ => truncate_to_token_budget(full, 1, model),
    }
}

/// Anything `fit_to_budget` can pack, degrade, or drop.
///
/// Implemented by the assembler crate's candidate-item wrapper, not by
/// `Span`/`MemoryItem` directly, so this crate stays ignorant of the
/// bundle's concrete item shape.
pub trait Budgetable {
    fn tokens(&self) -> i32;
    fn score(&self) -> f32;
    /// Token cost if this item were replaced by its capsule form.
    /// `None` if the item has no cheaper form (e.g. a memory note).
    fn capsule_tokens(&self) -> Option<i32>;
    /// Replace this item's content with its capsule form in place.
    fn degrade(&mut self);
    /// Test code/comments are dropped before non-test code at the same
    /// budget pressure.
    fn is_test(&self) -> bool {
        false
    }
}

/// Why one item did not survive `fit_to_budget` untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackOutcome {
    Kept,
    Degraded,
    Dropped,
}

/// One line of `fit_to_budget`'s report: what happened to the item at
/// this original index, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct PackReportEntry {
    pub index: usize,
    pub outcome: PackOutcome,
    pub tokens_before: i32,
    pub tokens_after: i32,
}

/// Result of packing a candidate set into a token budget.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult<T> {
    pub kept: Vec<T>,
    pub report: Vec<PackReportEntry>,
}

/// Greedily fit `items` into `budget` tokens.
///
/// Degrade pass first: items are degraded to their capsule form in
/// ascending-score order (cheapest-to-lose first), one degrade per item,
/// until the total fits or nothing is left to degrade. If that's not
/// enough, items are dropped — test items before non-test items, each
/// group in ascending-score order — until the total fits.
///
/// Each item is degraded at most once per call, and every degrade pass
/// runs before any drop.
pub fn fit_to_budget<T: Budgetable + Clone>(items: Vec<T>, budget: i32) -> FitResult<T> {
    let mut working: Vec<(usize, T)> = items.into_iter().enumerate().collect();
    let mut report: Vec<PackReportEntry> = Vec::new();

    let total = |items: &[(usize, T)]| items.iter().map(|(_, i)| i.tokens()).sum::<i32>();

    if total(&working) <= budget {
        return FitResult {
            kept: working.into_iter().map(|(_, i)| i).collect(),
            report,
        };
    }

    // Degrade pass: ascending score, i.e. least-valuable items first.
    let mut degrade_order: Vec<usize> = (0..working.len()).collect();
    degrade_order.sort_by(|&a, &b| {
        working[a]
            .1
            .score()
            .partial_cmp(&working[b].1.score())
            .unwrap()
    });

    for &pos in &degrade_order {
        if total(&working) <= budget {
            break;
        }
        let (index, item) = &mut working[pos];
        if let Some(capsule_tokens) = item.capsule_tokens() {
            let before = item.tokens();
            item.degrade();
            report.push(PackReportEntry {
                index: *index,
                outcome: PackOutcome::Degraded,
                tokens_before: before,
                tokens_after: capsule_tokens,
            });
        }
    }

    // Drop pass: test items first, then remaining items, both ascending
    // by score, until the total fits.
    let mut drop_order: Vec<usize> = (0..working.len()).collect();
    drop_order.sort_by(|&a, &b| {
        let (ia, ib) = (&working[a].1, &working[b].1);
        ib.is_test()
            .cmp(&ia.is_test()) // test=true sorts first (true > false reversed)
            .then_with(|| ia.score().partial_cmp(&ib.score()).unwrap())
    });

    let mut running_total = total(&working);
    let mut dropped_positions: Vec<usize> = Vec::new();
    for &pos in &drop_order {
        if running_total <= budget {
            break;
        }
        let tokens_before = working[pos].1.tokens();
        running_total -= tokens_before;
        dropped_positions.push(pos);
        report.push(PackReportEntry {
            index: working[pos].0,
            outcome: PackOutcome::Dropped,
            tokens_before,
            tokens_after: 0,
        });
    }

    dropped_positions.sort_unstable();
    for &pos in dropped_positions.iter().rev() {
        working.remove(pos);
    }

    FitResult {
        kept: working.into_iter().map(|(_, i)| i).collect(),
        report,
    }
}

#[cfg(test)]
mod fit_to_budget_tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestItem {
        tokens: i32,
        score: f32,
        capsule_tokens: Option<i32>,
        degraded: bool,
        is_test: bool,
    }

    impl Budgetable for TestItem {
        fn tokens(&self) -> i32 {
            if self.degraded {
                self.capsule_tokens.unwrap_or(self.tokens)
            } else {
                self.tokens
            }
        }
        fn score(&self) -> f32 {
            self.score
        }
        fn capsule_tokens(&self) -> Option<i32> {
            if self.degraded {
                None
            } else {
                self.capsule_tokens
            }
        }
        fn degrade(&mut self) {
            self.degraded = true;
        }
        fn is_test(&self) -> bool {
            self.is_test
        }
    }

    fn item(tokens: i32, score: f32) -> TestItem {
        TestItem {
            tokens,
            score,
            capsule_tokens: Some(tokens / 2),
            degraded: false,
            is_test: false,
        }
    }

    #[test]
    fn under_budget_keeps_everything_untouched() {
        let items = vec![item(10, 0.5), item(10, 0.9)];
        let result = fit_to_budget(items.clone(), 100);
        assert_eq!(result.kept, items);
        assert!(result.report.is_empty());
    }

    #[test]
    fn degrades_lowest_score_before_dropping() {
        let items = vec![item(100, 0.9), item(100, 0.1)];
        let result = fit_to_budget(items, 150);
        assert!(result
            .report
            .iter()
            .any(|e| e.outcome == PackOutcome::Degraded));
        let total: i32 = result.kept.iter().map(|i| i.tokens()).sum();
        assert!(total <= 150);
    }

    #[test]
    fn drops_lowest_score_items_first() {
        let items = vec![
            TestItem { tokens: 100, score: 0.9, capsule_tokens: None, degraded: false, is_test: false },
            TestItem { tokens: 100, score: 0.1, capsule_tokens: None, degraded: false, is_test: false },
        ];
        let result = fit_to_budget(items, 100);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.kept[0].score, 0.9);
        assert!(result.report.iter().any(|e| e.outcome == PackOutcome::Dropped));
    }

    #[test]
    fn test_items_drop_before_non_test_items_of_same_score() {
        let items = vec![
            TestItem { tokens: 100, score: 0.5, capsule_tokens: None, degraded: false, is_test: false },
            TestItem { tokens: 100, score: 0.5, capsule_tokens: None, degraded: false, is_test: true },
        ];
        let result = fit_to_budget(items, 100);
        assert_eq!(result.kept.len(), 1);
        assert!(!result.kept[0].is_test);
    }

    #[test]
    fn kept_set_never_exceeds_budget_in_tokens() {
        let items: Vec<TestItem> = (0..10).map(|i| item(50, i as f32 / 10.0)).collect();
        let result = fit_to_budget(items, 120);
        let total: i32 = result.kept.iter().map(|i| i.tokens()).sum();
        assert!(total <= 120);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_costs_zero_tokens() {
        assert_eq!(estimate_tokens("", "default"), 0);
    }

    #[test]
    fn nonempty_text_costs_at_least_one_token() {
        assert_eq!(estimate_tokens("a", "default"), 1);
    }

    #[test]
    fn unknown_model_falls_back_to_four_chars_per_token() {
        assert_eq!(profile_for("some-future-model").chars_per_token, 4.0);
        let text = "x".repeat(40);
        assert_eq!(estimate_tokens(&text, "some-future-model"), 10);
    }

    #[test]
    fn known_models_can_diverge_from_the_default_ratio() {
        let default_tokens = estimate_tokens("x".repeat(100).as_str(), "default");
        let opus_tokens = estimate_tokens("x".repeat(100).as_str(), "claude-3-opus");
        assert_ne!(default_tokens, opus_tokens);
    }

    #[test]
    fn validate_budget_rejects_negative() {
        assert!(validate_budget(-1).is_err());
        assert!(validate_budget(0).is_ok());
    }

    #[test]
    fn truncation_respects_budget() {
        let text = "a".repeat(1000);
        let truncated = truncate_to_token_budget(&text, 10, "default");
        assert!(estimate_tokens(&truncated, "default") <= 10);
    }

    #[test]
    fn truncation_is_noop_under_budget() {
        let text = "short text";
        assert_eq!(truncate_to_token_budget(text, 1000, "default"), text);
    }

    #[test]
    fn truncation_prefers_sentence_boundary() {
        let text = "First sentence is here. Second sentence keeps going and going and going.";
        let truncated = truncate_to_token_budget(text, 20, "default");
        assert!(truncated.ends_with('.') || truncated.len() < text.len());
    }

    #[test]
    fn safe_truncate_never_splits_utf8() {
        let text = "héllo wörld 世界";
        for n in 0..text.len() {
            let t = safe_truncate(text, n);
            assert!(std::str::from_utf8(t.as_bytes()).is_ok());
        }
    }

    #[test]
    fn zero_budget_yields_empty_string() {
        assert_eq!(truncate_to_token_budget("anything", 0, "default"), "");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_truncation_respects_budget(text in ".{0,500}", budget in 10i32..200) {
            let truncated = truncate_to_token_budget(&text, budget, "default");
            // A single indivisible word longer than the budget can still
            // overshoot; the guarantee is "close to budget", not exact.
            prop_assert!(estimate_tokens(&truncated, "default") <= budget + 10);
        }

        #[test]
        fn prop_estimate_tokens_monotonic_in_length(a in ".{0,200}", extra in ".{1,100}") {
            let combined = format!("{a}{extra}");
            prop_assert!(estimate_tokens(&combined, "default") >= estimate_tokens(&a, "default"));
        }

        #[test]
        fn prop_truncate_output_never_exceeds_input_length(text in ".{0,500}", budget in 0i32..500) {
            let truncated = truncate_to_token_budget(&text, budget, "default");
            prop_assert!(truncated.len() <= text.len());
        }
    }
}
