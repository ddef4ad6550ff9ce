//! Candidate items flowing from Fuse/Expand into Pack.

use pampax_core::{BundleItem, EdgeKind, ItemRef, MemoryItem, ProducerSource, Span};
use pampax_token::Budgetable;

/// One item under consideration for the final bundle, carrying enough
/// state for `fit_to_budget` to degrade or drop it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub item_ref: ItemRef,
    pub score: f32,
    pub producer_count: usize,
    pub source: ProducerSource,
    pub rank: u32,
    pub edge_kind: Option<EdgeKind>,
    pub cached: bool,
    path: Option<String>,
    signature: Option<String>,
    effective_text: String,
    degraded: bool,
    content: CandidateContent,
    /// Model this candidate's token counts are estimated under, carried
    /// from the request so `Budgetable::tokens`/`capsule_tokens` route
    /// through the right profile.
    model: String,
}

#[derive(Debug, Clone)]
enum CandidateContent {
    Span(Span),
    Memory(MemoryItem),
}

impl Candidate {
    pub fn from_span(
        span: Span,
        score: f32,
        producer_count: usize,
        source: ProducerSource,
        rank: u32,
        model: &str,
    ) -> Self {
        Candidate {
            item_ref: ItemRef::Span(span.id),
            score,
            producer_count,
            source,
            rank,
            edge_kind: None,
            cached: false,
            path: Some(span.path.clone()),
            signature: span.signature.clone(),
            effective_text: span.content.clone(),
            degraded: false,
            content: CandidateContent::Span(span),
            model: model.to_string(),
        }
    }

    pub fn from_memory(item: MemoryItem, score: f32, producer_count: usize, rank: u32, model: &str) -> Self {
        Candidate {
            item_ref: ItemRef::Memory(item.id),
            score,
            producer_count,
            source: ProducerSource::Mem,
            rank,
            edge_kind: None,
            cached: false,
            path: None,
            signature: None,
            effective_text: item.text.clone(),
            degraded: false,
            content: CandidateContent::Memory(item),
            model: model.to_string(),
        }
    }

    pub fn with_edge_kind(mut self, edge_kind: Option<EdgeKind>) -> Self {
        self.edge_kind = edge_kind;
        self
    }

    pub fn was_degraded(&self) -> bool {
        self.degraded
    }

    /// Path used to break score ties when ordering candidates for Pack;
    /// memory items (which carry no path) sort after every span.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Turn this candidate into its final `BundleItem`, reflecting any
    /// degrade pass applied by `fit_to_budget`.
    pub fn into_bundle_item(self) -> BundleItem {
        match self.content {
            CandidateContent::Span(mut span) => {
                span.content = self.effective_text;
                BundleItem::Span(span)
            }
            CandidateContent::Memory(item) => BundleItem::Memory(item),
        }
    }
}

impl Budgetable for Candidate {
    fn tokens(&self) -> i32 {
        pampax_token::estimate_tokens(&self.effective_text, &self.model)
    }

    fn score(&self) -> f32 {
        self.score
    }

    fn capsule_tokens(&self) -> Option<i32> {
        if self.degraded {
            return None;
        }
        self.signature
            .as_deref()
            .map(|sig| pampax_token::estimate_tokens(sig, &self.model))
    }

    fn degrade(&mut self) {
        if let Some(sig) = self.signature.clone() {
            self.effective_text = sig;
            self.degraded = true;
        }
    }

    fn is_test(&self) -> bool {
        self.path
            .as_deref()
            .map(|p| p.contains("test"))
            .unwrap_or(false)
    }
}
