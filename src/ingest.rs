//! PDF ingestion pipeline: extract → chunk → store → embed.
//!
//! Ingestion reads a `sources.json` manifest, extracts per-page text from
//! each PDF, chunks it with page tracking, and **fully replaces** the
//! corpus: all chunk, FTS, and vector rows are rebuilt in one run. There
//! are no partial updates; ingestion is expected to run exclusively,
//! never concurrently with queries against a half-rebuilt index.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::chunker::{PageChunker, PagedChunk};
use crate::config::{ChunkingConfig, Config};
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::migrate;

/// One manifest entry in `sources.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub title: String,
    pub url: String,
    pub file_name: String,
}

struct PendingSource {
    spec: SourceSpec,
    chunks: Vec<PagedChunk>,
}

pub async fn run_ingest(config: &Config, dry_run: bool) -> Result<()> {
    let specs = load_manifest(&config.ingest.sources_json)?;
    let resolved = resolve_files(&specs, &config.ingest.raw_dir);
    if resolved.is_empty() {
        bail!(
            "No source files found under {}",
            config.ingest.raw_dir.display()
        );
    }

    // Extract and chunk everything up front; failures here leave the
    // existing corpus untouched.
    let mut pending: Vec<PendingSource> = Vec::new();
    for (spec, path) in resolved {
        let chunks = chunk_pdf(&path, &config.chunking)
            .with_context(|| format!("Failed to extract {}", path.display()))?;
        println!("  {}: {} chunks", spec.file_name, chunks.len());
        pending.push(PendingSource { spec, chunks });
    }

    let total_chunks: usize = pending.iter().map(|p| p.chunks.len()).sum();

    if dry_run {
        println!("ingest (dry-run)");
        println!("  sources: {}", pending.len());
        println!("  chunks: {}", total_chunks);
        return Ok(());
    }

    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let chunk_rows = replace_corpus(&pool, &pending).await?;

    let mut vectors_written = 0u64;
    if config.embedding.is_enabled() {
        let provider = embedding::create_provider(&config.embedding)?;
        vectors_written = embed_corpus(
            &pool,
            provider.as_ref(),
            &chunk_rows,
            config.embedding.batch_size,
        )
        .await?;
    } else {
        eprintln!("Warning: embedding provider is disabled; semantic search will return nothing");
    }

    println!("ingest");
    println!("  sources: {}", pending.len());
    println!("  chunks written: {}", total_chunks);
    println!("  vectors written: {}", vectors_written);
    println!("ok");

    pool.close().await;
    Ok(())
}

fn load_manifest(path: &Path) -> Result<Vec<SourceSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let specs: Vec<SourceSpec> =
        serde_json::from_str(&content).with_context(|| "Failed to parse sources manifest")?;
    if specs.is_empty() {
        bail!("Sources manifest is empty");
    }
    Ok(specs)
}

/// Match manifest entries to files on disk. Missing files are reported
/// and skipped rather than failing the whole run.
fn resolve_files(specs: &[SourceSpec], raw_dir: &Path) -> Vec<(SourceSpec, PathBuf)> {
    let mut resolved = Vec::new();
    for spec in specs {
        let path = raw_dir.join(&spec.file_name);
        if path.exists() {
            resolved.push((spec.clone(), path));
        } else {
            eprintln!(
                "Warning: skipping {}: file not found in {}",
                spec.file_name,
                raw_dir.display()
            );
        }
    }
    resolved
}

/// Extract per-page text from one PDF and chunk it with page tracking.
fn chunk_pdf(path: &Path, chunking: &ChunkingConfig) -> Result<Vec<PagedChunk>> {
    let bytes = std::fs::read(path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?;

    let mut chunker = PageChunker::new(chunking);
    for (i, page_text) in pages.iter().enumerate() {
        chunker.push_page(i as i64 + 1, page_text);
    }
    Ok(chunker.finish())
}

struct ChunkToEmbed {
    chunk_id: String,
    source_id: String,
    text: String,
}

/// Upsert sources and rebuild all chunk, FTS, and vector rows in one
/// transaction. Returns the inserted chunks for the embedding pass.
async fn replace_corpus(pool: &SqlitePool, pending: &[PendingSource]) -> Result<Vec<ChunkToEmbed>> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    // Wipe the previous corpus wholesale
    sqlx::query("DELETE FROM chunk_vectors")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks_fts").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;

    let mut to_embed: Vec<ChunkToEmbed> = Vec::new();

    for source in pending {
        // Keep a stable source ID across re-ingestions, keyed by file name
        let existing_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM sources WHERE file_name = ?")
                .bind(&source.spec.file_name)
                .fetch_optional(&mut *tx)
                .await?;
        let source_id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        sqlx::query(
            r#"
            INSERT INTO sources (id, title, url, file_name, ingested_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(file_name) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&source_id)
        .bind(&source.spec.title)
        .bind(&source.spec.url)
        .bind(&source.spec.file_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (index, chunk) in source.chunks.iter().enumerate() {
            let chunk_id = Uuid::new_v4().to_string();

            sqlx::query(
                r#"
                INSERT INTO chunks (id, source_id, chunk_index, text, char_len, page_start, page_end)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk_id)
            .bind(&source_id)
            .bind(index as i64)
            .bind(&chunk.text)
            .bind(chunk.text.chars().count() as i64)
            .bind(chunk.page_start)
            .bind(chunk.page_end)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunks_fts (chunk_id, source_id, text) VALUES (?, ?, ?)")
                .bind(&chunk_id)
                .bind(&source_id)
                .bind(&chunk.text)
                .execute(&mut *tx)
                .await?;

            to_embed.push(ChunkToEmbed {
                chunk_id,
                source_id: source_id.clone(),
                text: chunk.text.clone(),
            });
        }
    }

    tx.commit().await?;
    Ok(to_embed)
}

/// Embed every chunk in batches and store the vectors. A batch failure
/// aborts ingestion; querying needs a complete vector index.
async fn embed_corpus(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    chunks: &[ChunkToEmbed],
    batch_size: usize,
) -> Result<u64> {
    let mut written = 0u64;

    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = provider.embed(&texts).await?;
        if vectors.len() != batch.len() {
            bail!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            );
        }

        for (chunk, vector) in batch.iter().zip(vectors.iter()) {
            let blob = embedding::vec_to_blob(vector);
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (chunk_id, source_id, model, dims, embedding)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    model = excluded.model,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.source_id)
            .bind(provider.model_name())
            .bind(provider.dims() as i64)
            .bind(&blob)
            .execute(pool)
            .await?;
            written += 1;
        }
    }

    Ok(written)
}
