//! Context Assembler: the `Init → Classify → Plan → Retrieve →
//! Fuse → Expand → Pack → Explain → Done|Error` state machine that
//! orchestrates every other component.

use crate::candidate::Candidate;
use crate::request::{query_signature, AssembleRequest};
use crate::session::AssemblyLatch;
use crate::store::{RawHit, SearchFilters, Store};
use pampax_core::{
    AssemblyPhase, Bundle, CacheStats, Evidence, EvidenceError, InputError, ItemRef, PampaxConfig,
    PampaxError, PampaxResult, ProducerSource, ScoreBreakdown, Severity, SpanId, StopKind,
};
use pampax_evidence::{build_condition, EvidenceSink, StopConditionFacts, StopConditionLog};
use pampax_rank::ProducerWeights;
use pampax_token::{fit_to_budget, Budgetable, PackOutcome};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The bundle-plan cache's namespace is the only one this orchestrator
/// wires up today; search/traversal results are cheap enough to recompute
/// and the bundle-plan layer already captures the end-to-end savings.
type BundlePlanCache = pampax_cache::NamespacedCaches<Bundle>;

/// Flat per-node token estimate used only to bound graph-traversal breadth
/// before any span content has been fetched; see `expand()`.
const AVG_SPAN_TOKENS: i32 = 60;

/// Orchestrates one or more `assemble()` calls against a shared `Store`.
pub struct Assembler<S: Store> {
    store: Arc<S>,
    config: PampaxConfig,
    latch: AssemblyLatch,
    seedmix: pampax_seedmix::SeedMixOptimizer,
    cache: Mutex<BundlePlanCache>,
}

impl<S: Store> Assembler<S> {
    pub fn new(store: Arc<S>, config: PampaxConfig) -> PampaxResult<Self> {
        config.validate()?;
        let cache = BundlePlanCache::new(
            config.cache.max_entries,
            Duration::from_millis(config.cache.ttl_ms),
        );
        Ok(Assembler {
            store,
            config,
            latch: AssemblyLatch::new(),
            seedmix: pampax_seedmix::SeedMixOptimizer::default(),
            cache: Mutex::new(cache),
        })
    }

    pub async fn assemble(&self, request: AssembleRequest) -> PampaxResult<Bundle> {
        if request.query.trim().is_empty() {
            return Err(InputError::EmptyQuery.into());
        }
        if request.budget <= 0 {
            return Err(InputError::NonPositiveBudget {
                budget: request.budget as i64,
            }
            .into());
        }

        let session_id = request
            .session_id
            .unwrap_or_else(pampax_core::EntityIdType::now_v7);
        let signature = query_signature(&request);
        let index_version = self.store.index_version().await?;
        let cache_key = pampax_cache::bundle_plan_key(
            &signature,
            &request.budget.to_string(),
            &request.model,
            &index_version,
        );
        if let Some(cached) = self.cache.lock().unwrap().bundle_plan.get(&cache_key) {
            let stats = self.cache.lock().unwrap().bundle_plan.stats();
            return Ok(Bundle {
                cache_stats: stats,
                ..cached
            });
        }

        let _guard = self.latch.try_acquire(session_id, &signature).ok_or_else(|| {
            PampaxError::Internal {
                reason: format!("E_BUSY: assembly already in flight for session {session_id}"),
            }
        })?;

        let mut evidence = EvidenceSink::new();
        let mut stops = StopConditionLog::new();

        // --- Classify ---
        let classification = pampax_intent::classify(&request.query);

        // --- Plan ---
        let policy =
            pampax_policy::select_policy(classification.intent, &pampax_policy::RepoHints::default())?;
        let seed_mix = self.seedmix.compute(classification.intent, classification.confidence, &policy);

        // --- Retrieve ---
        let retrieved = self
            .retrieve(&request, session_id, &mut stops)
            .await?;

        // --- Fuse ---
        let weights = ProducerWeights {
            lex: seed_mix.bm25_weight,
            vec: seed_mix.vector_weight,
            sym: seed_mix.symbol_weight,
            mem: seed_mix.memory_weight,
            graph: 0.0,
        };
        let top_k = policy.early_stop_threshold.max(1) as usize * 4;
        let fused = pampax_rank::fuse(&retrieved.hits, &weights, self.config.rrf_k, top_k)?;

        let mut candidates = self
            .materialize(&request, &fused, &retrieved)
            .await?;

        // --- Expand ---
        let expansion_budget = (request.budget as f32 * 0.2) as i32;
        if request.include_graph && policy.allow_graph_expansion && !candidates.is_empty() {
            self.expand(&request, &policy, expansion_budget, &mut candidates, &mut stops)
                .await?;
        }

        // --- Pack ---
        // Establish primary candidate order (score desc, then path) before
        // packing; fit_to_budget's own ascending-score passes only decide
        // what to degrade or drop, not the order kept items are returned in.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path().cmp(&b.path()))
        });
        let fit_result = fit_to_budget(candidates, request.budget);
        let total_tokens: i32 = fit_result.kept.iter().map(|c| c.tokens()).sum();

        let degraded_any = fit_result
            .report
            .iter()
            .any(|e| e.outcome == PackOutcome::Degraded);
        let dropped_any = fit_result
            .report
            .iter()
            .any(|e| e.outcome == PackOutcome::Dropped);

        if degraded_any || dropped_any {
            stops.record(build_condition(
                StopKind::TokenBudgetExceeded,
                StopConditionFacts {
                    phase: AssemblyPhase::Pack,
                    severity: Severity::Med,
                    tokens_used: total_tokens,
                    tokens_budget: request.budget,
                    items_considered: (fit_result.kept.len() + fit_result.report.len()) as u32,
                    items_kept: fit_result.kept.len() as u32,
                    producer: None,
                },
            ));
        }
        if degraded_any {
            stops.record(build_condition(
                StopKind::DegradationTriggered,
                StopConditionFacts {
                    phase: AssemblyPhase::Pack,
                    severity: Severity::Low,
                    tokens_used: total_tokens,
                    tokens_budget: request.budget,
                    items_considered: fit_result.kept.len() as u32,
                    items_kept: fit_result.kept.len() as u32,
                    producer: None,
                },
            ));
        }

        // --- Explain ---
        let items_considered = fit_result.kept.len() + fit_result.report.len();
        for candidate in &fit_result.kept {
            evidence.record(Evidence {
                item_id: candidate.item_ref,
                reason: reason_for(candidate),
                edge_kind: candidate.edge_kind,
                rank: candidate.rank,
                source: candidate.source,
                cached: candidate.cached,
                score_breakdown: ScoreBreakdown {
                    fused: candidate.score,
                    components: vec![(candidate.source, candidate.score)],
                },
                tokens: candidate.tokens(),
                action: if candidate.was_degraded() {
                    pampax_core::PackAction::Degraded
                } else {
                    pampax_core::PackAction::Kept
                },
            });
        }

        if stops.conditions().is_empty() {
            stops.record(build_condition(
                StopKind::CompletedNormally,
                StopConditionFacts {
                    phase: AssemblyPhase::Explain,
                    severity: Severity::Low,
                    tokens_used: total_tokens,
                    tokens_budget: request.budget,
                    items_considered: items_considered as u32,
                    items_kept: fit_result.kept.len() as u32,
                    producer: None,
                },
            ));
        }
        stops.validate_nonempty().map_err(|e: EvidenceError| PampaxError::Internal {
            reason: e.to_string(),
        })?;

        let kept_refs: Vec<ItemRef> = fit_result.kept.iter().map(|c| c.item_ref).collect();
        evidence
            .validate_completeness(&kept_refs)
            .map_err(|e| PampaxError::Internal { reason: e.to_string() })?;

        let items = fit_result.kept.into_iter().map(|c| c.into_bundle_item()).collect();

        let bundle = Bundle {
            items,
            total_tokens,
            budget: request.budget,
            intent: classification.intent,
            policy,
            evidence: evidence.into_records(),
            stopping_reasons: stops.into_conditions(),
            cache_stats: retrieved.cache_stats,
        };

        let mut cache = self.cache.lock().unwrap();
        cache.bundle_plan.put(cache_key, bundle.clone());
        let stats = cache.bundle_plan.stats();
        drop(cache);

        Ok(Bundle {
            cache_stats: stats,
            ..bundle
        })
    }

    async fn retrieve(
        &self,
        request: &AssembleRequest,
        session_id: pampax_core::SessionId,
        stops: &mut StopConditionLog,
    ) -> PampaxResult<RetrievedHits> {
        let timeout = self.config.phase_timeouts.retrieve();
        let mut hits = Vec::new();
        let cache_stats = CacheStats::default();

        match tokio::time::timeout(
            timeout,
            self.store.search_lexical(&request.query, &request.filters, request.limit as usize),
        )
        .await
        {
            Ok(Ok(lex_hits)) => hits.extend(tag(lex_hits, ProducerSource::Lex)),
            _ => record_search_failure(stops, "lex"),
        }

        if !request.query_embedding.is_empty() {
            match tokio::time::timeout(
                timeout,
                self.store.search_vector(&request.query_embedding, &request.filters, request.limit as usize),
            )
            .await
            {
                Ok(Ok(vec_hits)) => hits.extend(tag(vec_hits, ProducerSource::Vec)),
                _ => record_search_failure(stops, "vec"),
            }
        }

        let symbol_query = classification_entities_query(request);
        if !symbol_query.is_empty() {
            match tokio::time::timeout(
                timeout,
                self.store.search_lexical(&symbol_query, &request.filters, request.limit as usize),
            )
            .await
            {
                Ok(Ok(sym_hits)) => hits.extend(tag(sym_hits, ProducerSource::Sym)),
                _ => record_search_failure(stops, "sym"),
            }
        }

        match tokio::time::timeout(timeout, self.store.get_memory(session_id, &request.filters)).await {
            Ok(Ok(memory)) => {
                return Ok(RetrievedHits {
                    hits,
                    memory,
                    cache_stats,
                })
            }
            _ => record_search_failure(stops, "mem"),
        }

        Ok(RetrievedHits {
            hits,
            memory: Vec::new(),
            cache_stats,
        })
    }

    async fn materialize(
        &self,
        request: &AssembleRequest,
        fused: &[pampax_rank::FusedResult],
        retrieved: &RetrievedHits,
    ) -> PampaxResult<Vec<Candidate>> {
        let span_ids: Vec<SpanId> = fused
            .iter()
            .filter_map(|f| match f.item_id {
                ItemRef::Span(id) => Some(id),
                ItemRef::Memory(_) => None,
            })
            .collect();
        let spans = self.store.get_symbols(&span_ids).await?;

        let mut candidates = Vec::new();
        for result in fused {
            match result.item_id {
                ItemRef::Span(id) => {
                    if let Some(span) = spans.iter().find(|s| s.id == id).cloned() {
                        let source = result
                            .score_breakdown
                            .components
                            .first()
                            .map(|(s, _)| *s)
                            .unwrap_or(ProducerSource::Lex);
                        candidates.push(Candidate::from_span(
                            span,
                            result.score_breakdown.fused,
                            result.producer_count,
                            source,
                            0,
                            &request.model,
                        ));
                    }
                }
                ItemRef::Memory(id) => {
                    if let Some(item) = retrieved.memory.iter().find(|m| m.id == id).cloned() {
                        candidates.push(Candidate::from_memory(
                            item,
                            result.score_breakdown.fused,
                            result.producer_count,
                            0,
                            &request.model,
                        ));
                    }
                }
            }
        }
        Ok(candidates)
    }

    async fn expand(
        &self,
        request: &AssembleRequest,
        policy: &pampax_core::Policy,
        expansion_budget: i32,
        candidates: &mut Vec<Candidate>,
        stops: &mut StopConditionLog,
    ) -> PampaxResult<()> {
        let max_depth = request
            .graph_depth
            .unwrap_or(policy.max_depth as u32)
            .min(policy.max_depth as u32);

        let seeds: Vec<(SpanId, f32)> = candidates
            .iter()
            .filter_map(|c| match c.item_ref {
                ItemRef::Span(id) => Some((id, c.score)),
                ItemRef::Memory(_) => None,
            })
            .collect();
        if seeds.is_empty() {
            return Ok(());
        }

        let edge_index = StoreEdgeIndex { store: self.store.clone() };
        let allowed_kinds = [
            pampax_core::EdgeKind::Call,
            pampax_core::EdgeKind::Import,
            pampax_core::EdgeKind::TestOf,
            pampax_core::EdgeKind::Routes,
            pampax_core::EdgeKind::ConfigKey,
        ];

        let visited_ids: Vec<SpanId> = seeds.iter().map(|(id, _)| *id).collect();
        let result = pampax_graph::traverse(
            &seeds,
            &edge_index,
            &allowed_kinds,
            request.direction,
            max_depth,
            expansion_budget,
            // Traversal only has `SpanId`s, not content, so it bounds breadth
            // with a flat per-node estimate; Pack re-measures every kept span
            // against the real budget once content is fetched below.
            |_id| AVG_SPAN_TOKENS,
        )
        .await;

        match result.halt_reason {
            pampax_graph::HaltReason::EdgeIndexUnavailable => {
                stops.record(build_condition(
                    StopKind::SearchFailure,
                    StopConditionFacts {
                        phase: AssemblyPhase::Expand,
                        severity: Severity::Med,
                        tokens_used: 0,
                        tokens_budget: expansion_budget,
                        items_considered: seeds.len() as u32,
                        items_kept: seeds.len() as u32,
                        producer: Some("graph".to_string()),
                    },
                ));
                return Ok(());
            }
            pampax_graph::HaltReason::TokenBudgetExceeded => {
                stops.record(build_condition(
                    StopKind::GraphTokenLimit,
                    StopConditionFacts {
                        phase: AssemblyPhase::Expand,
                        severity: Severity::Med,
                        tokens_used: result.tokens_used,
                        tokens_budget: expansion_budget,
                        items_considered: result.visited.len() as u32,
                        items_kept: result.visited.len() as u32,
                        producer: None,
                    },
                ));
            }
            pampax_graph::HaltReason::DepthLimitReached => {
                stops.record(build_condition(
                    StopKind::GraphDepthLimit,
                    StopConditionFacts {
                        phase: AssemblyPhase::Expand,
                        severity: Severity::Low,
                        tokens_used: result.tokens_used,
                        tokens_budget: expansion_budget,
                        items_considered: result.visited.len() as u32,
                        items_kept: result.visited.len() as u32,
                        producer: None,
                    },
                ));
            }
            pampax_graph::HaltReason::FrontierExhausted => {}
        }

        let new_ids: Vec<SpanId> = result
            .visited
            .iter()
            .map(|n| n.span_id)
            .filter(|id| !visited_ids.contains(id))
            .collect();
        if new_ids.is_empty() {
            return Ok(());
        }
        let spans = self.store.get_symbols(&new_ids).await?;
        for node in result.visited.iter().filter(|n| new_ids.contains(&n.span_id)) {
            if let Some(span) = spans.iter().find(|s| s.id == node.span_id).cloned() {
                candidates.push(
                    Candidate::from_span(
                        span,
                        node.score_breakdown,
                        1,
                        ProducerSource::Graph,
                        node.depth,
                        &request.model,
                    )
                    .with_edge_kind(node.via_edge_kind),
                );
            }
        }
        Ok(())
    }
}

struct RetrievedHits {
    hits: Vec<pampax_core::SearchResult>,
    memory: Vec<pampax_core::MemoryItem>,
    cache_stats: CacheStats,
}

fn tag(hits: Vec<RawHit>, source: ProducerSource) -> Vec<pampax_core::SearchResult> {
    hits.into_iter()
        .map(|h| pampax_core::SearchResult {
            item_id: h.item_id,
            score: h.score,
            rank_in_source: h.rank,
            source,
        })
        .collect()
}

fn record_search_failure(stops: &mut StopConditionLog, producer: &str) {
    stops.record(build_condition(
        StopKind::SearchFailure,
        StopConditionFacts {
            phase: AssemblyPhase::Retrieve,
            severity: Severity::Med,
            tokens_used: 0,
            tokens_budget: 0,
            items_considered: 0,
            items_kept: 0,
            producer: Some(producer.to_string()),
        },
    ));
}

fn classification_entities_query(request: &AssembleRequest) -> String {
    let classification = pampax_intent::classify(&request.query);
    classification.entities.join(" ")
}

fn reason_for(candidate: &Candidate) -> String {
    match candidate.source {
        ProducerSource::Graph => "graph-expansion".to_string(),
        other => format!("ranked-by-{}", other.as_str()),
    }
}

struct StoreEdgeIndex<S: Store> {
    store: Arc<S>,
}

#[async_trait::async_trait]
impl<S: Store> pampax_graph::EdgeIndex for StoreEdgeIndex<S> {
    async fn edges_from(
        &self,
        span: SpanId,
        direction: pampax_core::Direction,
        allowed_kinds: &[pampax_core::EdgeKind],
    ) -> Option<Vec<pampax_core::Edge>> {
        self.store.get_edges(span, allowed_kinds, direction).await.ok()
    }
}
