//! In-memory reference `Store` implementation, used by tests only. It
//! is never meant to back a real deployment — the real Store lives
//! behind whatever index the embedding adapter pipeline writes to.

use crate::store::{RawHit, SearchFilters, Store};
use async_trait::async_trait;
use pampax_core::{
    Direction, Edge, EdgeKind, EntityIdType, ItemRef, MemoryItem, PampaxResult, SessionId, Span,
    SpanId,
};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    spans: RwLock<HashMap<SpanId, Span>>,
    edges: RwLock<Vec<Edge>>,
    memory: RwLock<HashMap<SessionId, Vec<MemoryItem>>>,
    index_version: RwLock<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            index_version: RwLock::new("v1".to_string()),
            ..Default::default()
        }
    }

    pub fn insert_span(&self, span: Span) {
        self.spans.write().unwrap().insert(span.id, span);
    }

    pub fn insert_edge(&self, edge: Edge) {
        let mut edges = self.edges.write().unwrap();
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }

    pub fn insert_memory(&self, item: MemoryItem) {
        self.memory
            .write()
            .unwrap()
            .entry(item.session_id)
            .or_default()
            .push(item);
    }

    pub fn bump_index_version(&self, version: &str) {
        *self.index_version.write().unwrap() = version.to_string();
    }

    fn matches_filters(span: &Span, filters: &SearchFilters) -> bool {
        if let Some(glob) = &filters.path_glob {
            if !glob.is_empty() && !span.path.contains(glob.trim_matches('*')) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn search_lexical(
        &self,
        query: &str,
        filters: &SearchFilters,
        k: usize,
    ) -> PampaxResult<Vec<RawHit>> {
        let lower = query.to_lowercase();
        let spans = self.spans.read().unwrap();
        let mut hits: Vec<(SpanId, f32)> = spans
            .values()
            .filter(|s| Self::matches_filters(s, filters))
            .filter_map(|s| {
                let haystack = format!(
                    "{} {} {}",
                    s.name.as_deref().unwrap_or(""),
                    s.signature.as_deref().unwrap_or(""),
                    s.content
                )
                .to_lowercase();
                let score = lower
                    .split_whitespace()
                    .filter(|term| haystack.contains(term))
                    .count() as f32;
                if score > 0.0 {
                    Some((s.id, score))
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.as_uuid().cmp(&b.0.as_uuid())));
        hits.truncate(k);
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(rank, (id, score))| RawHit {
                item_id: ItemRef::Span(id),
                score,
                rank: rank as u32,
            })
            .collect())
    }

    async fn search_vector(
        &self,
        _query_embedding: &[f32],
        filters: &SearchFilters,
        k: usize,
    ) -> PampaxResult<Vec<RawHit>> {
        let spans = self.spans.read().unwrap();
        let mut hits: Vec<SpanId> = spans
            .values()
            .filter(|s| Self::matches_filters(s, filters))
            .map(|s| s.id)
            .collect();
        hits.sort_by_key(|id| id.as_uuid());
        hits.truncate(k);
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(rank, id)| RawHit {
                item_id: ItemRef::Span(id),
                score: 1.0 / (rank as f32 + 1.0),
                rank: rank as u32,
            })
            .collect())
    }

    async fn get_symbols(&self, ids: &[SpanId]) -> PampaxResult<Vec<Span>> {
        let spans = self.spans.read().unwrap();
        Ok(ids.iter().filter_map(|id| spans.get(id).cloned()).collect())
    }

    async fn get_edges(
        &self,
        from: SpanId,
        kinds: &[EdgeKind],
        direction: Direction,
    ) -> PampaxResult<Vec<Edge>> {
        let edges = self.edges.read().unwrap();
        Ok(edges
            .iter()
            .filter(|e| kinds.is_empty() || kinds.contains(&e.kind))
            .filter(|e| match direction {
                Direction::Callers => e.to == from,
                Direction::Callees => e.from == from,
                Direction::Both => e.from == from || e.to == from,
            })
            .cloned()
            .collect())
    }

    async fn get_memory(
        &self,
        session_id: SessionId,
        _filters: &SearchFilters,
    ) -> PampaxResult<Vec<MemoryItem>> {
        Ok(self
            .memory
            .read()
            .unwrap()
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn index_version(&self) -> PampaxResult<String> {
        Ok(self.index_version.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pampax_core::SpanKind;

    fn span(name: &str) -> Span {
        Span {
            id: SpanId::now_v7(),
            repo: "repo".into(),
            path: "src/lib.rs".into(),
            byte_start: 0,
            byte_end: 10,
            kind: SpanKind::Function,
            name: Some(name.to_string()),
            signature: Some(format!("fn {name}()")),
            doc: None,
            parents: vec![],
            references: vec![],
            content: format!("fn {name}() {{}}"),
        }
    }

    #[tokio::test]
    async fn lexical_search_finds_matching_span() {
        let store = MemoryStore::new();
        store.insert_span(span("getUserById"));
        let hits = store
            .search_lexical("getUserById", &SearchFilters::default(), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn index_version_reflects_bump() {
        let store = MemoryStore::new();
        assert_eq!(store.index_version().await.unwrap(), "v1");
        store.bump_index_version("v2");
        assert_eq!(store.index_version().await.unwrap(), "v2");
    }
}
