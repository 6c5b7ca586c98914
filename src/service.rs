//! High-level question answering service.
//!
//! [`QaService`] owns the search engine and retrieval settings and turns a
//! question into an [`AnswerPayload`]. It is constructed explicitly and
//! shared by the hosting process (CLI or HTTP server); there is no global
//! handle. Each `ask` call is independent and reads only shared immutable
//! state, so requests may be served concurrently.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::answer::build_answer;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::AnswerPayload;
use crate::search::SearchEngine;

pub struct QaService {
    engine: SearchEngine,
    abstain_threshold: f64,
}

impl QaService {
    /// Connect to the configured database and build the service with the
    /// configured embedding provider.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let provider: Arc<dyn EmbeddingProvider> =
            Arc::from(embedding::create_provider(&config.embedding)?);
        Ok(Self::new(pool, provider, config))
    }

    /// Build the service from parts. Used directly by tests that inject a
    /// stub embedding provider.
    pub fn new(pool: SqlitePool, provider: Arc<dyn EmbeddingProvider>, config: &Config) -> Self {
        Self {
            engine: SearchEngine::new(pool, provider, config.retrieval.clone()),
            abstain_threshold: config.retrieval.abstain_threshold,
        }
    }

    /// Answer a question.
    ///
    /// `k` is clamped into `[1, 20]`. `mode` is lowercased and defaults to
    /// `"hybrid"` when empty; anything other than `"baseline"` or
    /// `"hybrid"` is a validation error. The returned payload always
    /// carries the ranked contexts, even when the answer is `None`.
    pub async fn ask(&self, question: &str, k: i64, mode: &str) -> Result<AnswerPayload> {
        let k = k.clamp(1, 20);
        let mode = if mode.is_empty() {
            "hybrid".to_string()
        } else {
            mode.to_lowercase()
        };

        let results = self.engine.search(question, k, &mode).await?;
        let (answer, contexts) = build_answer(question, &results, self.abstain_threshold);

        Ok(AnswerPayload {
            question: question.to_string(),
            answer,
            contexts,
            reranker_used: mode == "hybrid",
            mode,
        })
    }
}
