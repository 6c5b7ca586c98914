//! Core data models used throughout passage-qa.
//!
//! These types represent the search hits and answer payloads that flow
//! through the retrieval and synthesis pipeline. Chunk and source rows are
//! owned by SQLite (see [`crate::store`]); everything here is transient,
//! built per request and never shared across requests.

use serde::Serialize;

/// A retrieval hit, carrying its fused score plus the per-signal scores
/// that produced it. `vector_score`/`keyword_score` are `None` for hits
/// found by only the other retrieval path. After fusion, `score` is in
/// `[0, 1]`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_id: String,
    pub source_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f64,
    pub vector_score: Option<f64>,
    pub keyword_score: Option<f64>,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
    pub source_title: String,
    pub source_url: String,
}

/// Serialized view of a [`SearchResult`] returned to callers.
///
/// Scores are rounded to 4 decimal places. The full context list is
/// returned even when the service abstains, so callers can inspect what
/// the retriever found.
#[derive(Debug, Clone, Serialize)]
pub struct ContextView {
    pub chunk_id: String,
    pub chunk_index: i64,
    pub score: f64,
    pub vector_score: Option<f64>,
    pub keyword_score: Option<f64>,
    pub text: String,
    pub source_title: String,
    pub source_url: String,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
}

/// The response object for one question. `answer = None` signals
/// abstention.
#[derive(Debug, Serialize)]
pub struct AnswerPayload {
    pub question: String,
    pub answer: Option<String>,
    pub contexts: Vec<ContextView>,
    pub reranker_used: bool,
    pub mode: String,
}
