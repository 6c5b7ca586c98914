//! Keyword, semantic, and hybrid retrieval over the chunk corpus.
//!
//! Three search paths share one engine:
//! - **lexical**: FTS5 `MATCH` over tokenized query terms. FTS5's rank is
//!   a lower-is-better cost, so it is negated before use as a score.
//! - **vector**: cosine similarity between the embedded query and every
//!   stored chunk vector.
//! - **hybrid**: both paths run concurrently, each score set is min-max
//!   normalized into `[0, 1]`, and the union of candidates is reranked by
//!   `alpha * vector + (1 - alpha) * keyword`.
//!
//! A failure in either sub-search fails the whole hybrid query; silently
//! dropping one signal would skew the fusion weighting.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::SearchResult;
use crate::store;

/// Common English function words dropped from lexical queries.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "from", "this", "into", "about", "what", "when", "where",
    "how", "does", "should", "are", "was", "were", "have", "has", "will", "would", "can", "could",
    "may", "might", "which", "using", "according", "please", "provide", "explain", "describe",
    "do", "at", "of", "in", "to", "on", "by", "or", "an", "any", "be", "as", "is", "it", "their",
    "there", "who", "whom",
];

/// Extract lexical query tokens: ASCII word characters, length >= 2,
/// lowercased, stop words removed.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_ascii_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Min-max normalize a score map into `[0, 1]`.
///
/// All-equal values normalize to `1.0`: a uniformly present signal still
/// counts, and the division by zero is avoided. An empty map stays empty.
pub fn normalize_scores(scores: &HashMap<String, f64>) -> HashMap<String, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }

    let min = scores.values().copied().fold(f64::INFINITY, f64::min);
    let max = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    if span.abs() < f64::EPSILON {
        return scores.keys().map(|k| (k.clone(), 1.0)).collect();
    }

    scores
        .iter()
        .map(|(k, v)| (k.clone(), (v - min) / span))
        .collect()
}

/// Retrieval engine over one SQLite corpus and one embedding provider.
///
/// Holds no mutable state; every query reads the shared store, so requests
/// may run concurrently.
pub struct SearchEngine {
    pool: SqlitePool,
    provider: Arc<dyn EmbeddingProvider>,
    retrieval: RetrievalConfig,
}

impl SearchEngine {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn EmbeddingProvider>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            pool,
            provider,
            retrieval,
        }
    }

    /// Dispatch on search mode. `baseline` returns raw vector results for
    /// A/B comparison against the fused ranking.
    pub async fn search(&self, query: &str, k: i64, mode: &str) -> Result<Vec<SearchResult>> {
        match mode {
            "baseline" => self.vector_search(query, k).await,
            "hybrid" => {
                self.hybrid_search(query, k, self.retrieval.hybrid_alpha)
                    .await
            }
            other => bail!("mode must be 'baseline' or 'hybrid', got '{}'", other),
        }
    }

    /// Semantic nearest-neighbor search: embed the query, score every
    /// stored chunk vector by cosine similarity, keep the best `top_k`.
    pub async fn vector_search(&self, query: &str, top_k: i64) -> Result<Vec<SearchResult>> {
        let query_vec = embedding::embed_query(self.provider.as_ref(), query).await?;

        let rows = sqlx::query("SELECT chunk_id, embedding FROM chunk_vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<(String, f64)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = embedding::blob_to_vec(&blob);
                let similarity = embedding::cosine_similarity(&query_vec, &vec) as f64;
                (row.get("chunk_id"), similarity)
            })
            .collect();

        // Stable: ties keep retrieval order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k.max(0) as usize);

        let ordered_ids: Vec<String> = scored.iter().map(|(id, _)| id.clone()).collect();
        let score_map: HashMap<String, f64> = scored.into_iter().collect();

        self.hydrate(&ordered_ids, &score_map, Some(&score_map), None)
            .await
    }

    /// Token-based search over the FTS5 index. Returns empty when no
    /// tokens survive stop-word filtering (no lexical signal).
    pub async fn lexical_search(&self, query: &str, top_k: i64) -> Result<Vec<SearchResult>> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = tokens.join(" OR ");

        let rows = sqlx::query(
            r#"
            SELECT chunk_id, rank
            FROM chunks_fts
            WHERE chunks_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(top_k)
        .fetch_all(&self.pool)
        .await?;

        let mut ordered_ids: Vec<String> = Vec::new();
        let mut score_map: HashMap<String, f64> = HashMap::new();
        for row in &rows {
            let rank: Option<f64> = row.get("rank");
            let Some(rank) = rank else { continue };
            if !rank.is_finite() {
                continue;
            }
            let id: String = row.get("chunk_id");
            // FTS5 rank is lower-is-better; negate so higher = better.
            score_map.insert(id.clone(), -rank);
            ordered_ids.push(id);
        }

        self.hydrate(&ordered_ids, &score_map, None, Some(&score_map))
            .await
    }

    /// Fused retrieval: run both signals concurrently over wide candidate
    /// pools, normalize each score set, and rank the candidate union by
    /// the weighted combination.
    ///
    /// `alpha` weights the semantic signal; a chunk found by only one
    /// signal scores on that signal alone (the missing term is 0).
    pub async fn hybrid_search(
        &self,
        query: &str,
        top_k: i64,
        alpha: f64,
    ) -> Result<Vec<SearchResult>> {
        let (vector_candidates, lexical_candidates) = tokio::try_join!(
            self.vector_search(query, self.retrieval.candidate_k_vector),
            self.lexical_search(query, self.retrieval.candidate_k_keyword),
        )?;

        let vector_scores: HashMap<String, f64> = vector_candidates
            .iter()
            .map(|r| (r.chunk_id.clone(), r.vector_score.unwrap_or(0.0)))
            .collect();
        let keyword_scores: HashMap<String, f64> = lexical_candidates
            .iter()
            .map(|r| (r.chunk_id.clone(), r.keyword_score.unwrap_or(0.0)))
            .collect();

        let norm_vector = normalize_scores(&vector_scores);
        let norm_keyword = normalize_scores(&keyword_scores);

        // Union in first-seen retrieval order so score ties break
        // deterministically.
        let mut ordered_ids: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for r in vector_candidates.iter().chain(lexical_candidates.iter()) {
            if seen.insert(r.chunk_id.as_str()) {
                ordered_ids.push(r.chunk_id.clone());
            }
        }
        if ordered_ids.is_empty() {
            return Ok(Vec::new());
        }

        let combined: HashMap<String, f64> = ordered_ids
            .iter()
            .map(|id| {
                let v = norm_vector.get(id).copied().unwrap_or(0.0);
                let k = norm_keyword.get(id).copied().unwrap_or(0.0);
                (id.clone(), alpha * v + (1.0 - alpha) * k)
            })
            .collect();

        let mut results = self
            .hydrate(
                &ordered_ids,
                &combined,
                Some(&vector_scores),
                Some(&keyword_scores),
            )
            .await?;

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k.max(0) as usize);
        Ok(results)
    }

    /// Attach chunk text and source metadata to scored IDs, preserving the
    /// given order. IDs missing from the metadata store are dropped;
    /// indexes and metadata may be transiently out of sync.
    async fn hydrate(
        &self,
        ordered_ids: &[String],
        score_map: &HashMap<String, f64>,
        vector_map: Option<&HashMap<String, f64>>,
        keyword_map: Option<&HashMap<String, f64>>,
    ) -> Result<Vec<SearchResult>> {
        if ordered_ids.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_map = store::lookup_chunks(&self.pool, ordered_ids).await?;
        let source_map = store::lookup_sources(&self.pool).await?;

        let mut results = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            let Some(chunk) = chunk_map.get(id) else {
                continue;
            };
            let Some(source) = source_map.get(&chunk.source_id) else {
                continue;
            };
            results.push(SearchResult {
                chunk_id: chunk.id.clone(),
                source_id: chunk.source_id.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                score: score_map.get(id).copied().unwrap_or(0.0),
                vector_score: vector_map.and_then(|m| m.get(id).copied()),
                keyword_score: keyword_map.and_then(|m| m.get(id).copied()),
                page_start: chunk.page_start,
                page_end: chunk.page_end,
                source_title: source.title.clone(),
                source_url: source.url.clone(),
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_map(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_normalize_empty() {
        let result = normalize_scores(&HashMap::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_normalize_single_value_is_one() {
        let result = normalize_scores(&score_map(&[("c1", 5.0)]));
        assert_eq!(result.len(), 1);
        assert!((result["c1"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_range() {
        let result = normalize_scores(&score_map(&[("c1", 10.0), ("c2", 5.0), ("c3", 0.0)]));
        assert!((result["c1"] - 1.0).abs() < 1e-9);
        assert!((result["c2"] - 0.5).abs() < 1e-9);
        assert!((result["c3"] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_all_equal_maps_to_one() {
        let result = normalize_scores(&score_map(&[("c1", 3.0), ("c2", 3.0), ("c3", 3.0)]));
        for score in result.values() {
            assert!((*score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_normalized_scores_always_in_unit() {
        let result = normalize_scores(&score_map(&[("c1", -5.0), ("c2", 100.0), ("c3", 42.0)]));
        for score in result.values() {
            assert!(
                (0.0..=1.0).contains(score),
                "score out of range: {}",
                score
            );
        }
    }

    #[test]
    fn test_fusion_monotonic_in_alpha() {
        // Two candidates with equal keyword score; the one with higher
        // vector score must not fall behind as alpha grows.
        let nv = score_map(&[("hi", 0.9), ("lo", 0.2)]);
        let nk = score_map(&[("hi", 0.5), ("lo", 0.5)]);

        let fuse = |alpha: f64, id: &str| alpha * nv[id] + (1.0 - alpha) * nk[id];

        let mut prev_gap = f64::NEG_INFINITY;
        for step in 0..=10 {
            let alpha = step as f64 / 10.0;
            let gap = fuse(alpha, "hi") - fuse(alpha, "lo");
            assert!(gap >= prev_gap - 1e-12, "gap shrank at alpha={}", alpha);
            prev_gap = gap;
        }
        assert!(fuse(1.0, "hi") > fuse(1.0, "lo"));
    }

    #[test]
    fn test_single_signal_candidate_not_over_penalized() {
        // Present only in the vector signal: fused score is the weighted
        // vector term, nothing subtracted.
        let nv = score_map(&[("only_vec", 0.8)]);
        let nk: HashMap<String, f64> = HashMap::new();
        let alpha = 0.7;
        let fused = alpha * nv["only_vec"] + (1.0 - alpha) * nk.get("only_vec").unwrap_or(&0.0);
        assert!((fused - 0.56).abs() < 1e-9);
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize_query("What is the hearing protection required in zone 4?");
        assert_eq!(
            tokens,
            vec![
                "hearing".to_string(),
                "protection".to_string(),
                "required".to_string(),
                "zone".to_string(),
            ]
        );
    }

    #[test]
    fn test_tokenize_all_stop_words_yields_empty() {
        assert!(tokenize_query("what is the of in to?").is_empty());
        assert!(tokenize_query("").is_empty());
        assert!(tokenize_query("a I 7 !").is_empty());
    }

    #[test]
    fn test_tokenize_lowercases() {
        assert_eq!(
            tokenize_query("LOCKOUT Tagout"),
            vec!["lockout".to_string(), "tagout".to_string()]
        );
    }
}
