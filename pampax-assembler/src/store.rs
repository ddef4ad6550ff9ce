//! External collaborator contracts: `Store` (read surface consumed by
//! the core) and `Adapter` (parsers that produce spans).

use async_trait::async_trait;
use pampax_core::{Direction, Edge, EdgeKind, ItemRef, MemoryItem, PampaxResult, Span};

/// Filters applied to a producer call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub path_glob: Option<String>,
    pub lang: Option<String>,
    pub tags: Vec<String>,
}

/// One ranked hit as returned directly by a producer, before fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub item_id: ItemRef,
    pub score: f32,
    pub rank: u32,
}

/// Read surface the assembler consumes from the backing index.
/// The Store is read-only during assembly; writes go through a separate
/// operator path the core never calls.
#[async_trait]
pub trait Store: Send + Sync {
    async fn search_lexical(
        &self,
        query: &str,
        filters: &SearchFilters,
        k: usize,
    ) -> PampaxResult<Vec<RawHit>>;

    async fn search_vector(
        &self,
        query_embedding: &[f32],
        filters: &SearchFilters,
        k: usize,
    ) -> PampaxResult<Vec<RawHit>>;

    async fn get_symbols(&self, ids: &[pampax_core::SpanId]) -> PampaxResult<Vec<Span>>;

    async fn get_edges(
        &self,
        from: pampax_core::SpanId,
        kinds: &[EdgeKind],
        direction: Direction,
    ) -> PampaxResult<Vec<Edge>>;

    async fn get_memory(
        &self,
        session_id: pampax_core::SessionId,
        filters: &SearchFilters,
    ) -> PampaxResult<Vec<MemoryItem>>;

    /// Monotonic token identifying the current snapshot; part of every
    /// cache key.
    async fn index_version(&self) -> PampaxResult<String>;
}

/// Progress events an `Adapter` emits while parsing files into spans.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Start,
    FileParsed { path: String },
    SpansEmitted { count: usize },
    ChunksStored { count: usize },
    EmbeddingsQueued { count: usize },
    Error { message: String },
    Done,
}

/// Contract implemented by parsers that turn source files into spans.
/// Not exercised by the assemble() request path; indexing is out of
/// scope for this crate beyond the shape of the contract itself.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn id(&self) -> &str;
    fn supports(&self, path: &str) -> bool;
    async fn parse(
        &self,
        files: &[String],
        on_progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    ) -> PampaxResult<Vec<Span>>;
}
