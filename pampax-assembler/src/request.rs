//! The request surface consumed by callers.

use crate::store::SearchFilters;
use pampax_core::{Direction, SessionId};

/// One `assemble()` call's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembleRequest {
    pub query: String,
    pub budget: i32,
    pub limit: u32,
    pub model: String,
    pub filters: SearchFilters,
    pub session_id: Option<SessionId>,
    /// Empty skips the vector producer entirely.
    pub query_embedding: Vec<f32>,
    pub include_graph: bool,
    pub direction: Direction,
    pub graph_depth: Option<u32>,
}

impl Default for AssembleRequest {
    fn default() -> Self {
        AssembleRequest {
            query: String::new(),
            budget: 8_000,
            limit: 50,
            model: "default".to_string(),
            filters: SearchFilters::default(),
            session_id: None,
            query_embedding: Vec::new(),
            include_graph: true,
            direction: Direction::Both,
            graph_depth: None,
        }
    }
}

/// A stable signature of the request's query-shaping fields, used for
/// the at-most-one latch and for cache keys. Deliberately excludes
/// `session_id` and `limit`: two requests that differ only in how many
/// results they asked for still mean the same thing for caching/latching.
pub fn query_signature(request: &AssembleRequest) -> String {
    format!("{}|{}|{}", request.query, request.budget, request.model)
}
