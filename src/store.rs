//! Typed metadata lookups over the SQLite store.
//!
//! The search engine never assembles its own SQL for ID lists; it calls
//! [`lookup_chunks`] / [`lookup_sources`] and gets typed rows back. IDs
//! returned by an index but missing here are simply absent from the map;
//! indexes and metadata may be transiently out of sync, and callers drop
//! such hits during hydration.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

/// One persisted chunk row. `(source_id, chunk_index)` is unique.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub id: String,
    pub source_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
}

/// One persisted source row.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// Batch-fetch chunk rows by ID. Unknown IDs are omitted from the result.
pub async fn lookup_chunks(
    pool: &SqlitePool,
    ids: &[String],
) -> Result<HashMap<String, ChunkRow>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, source_id, chunk_index, text, page_start, page_end \
         FROM chunks WHERE id IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }

    let rows = query.fetch_all(pool).await?;
    let mut map = HashMap::with_capacity(rows.len());
    for row in rows {
        let chunk = ChunkRow {
            id: row.get("id"),
            source_id: row.get("source_id"),
            chunk_index: row.get("chunk_index"),
            text: row.get("text"),
            page_start: row.get("page_start"),
            page_end: row.get("page_end"),
        };
        map.insert(chunk.id.clone(), chunk);
    }
    Ok(map)
}

/// Fetch all source rows keyed by ID.
pub async fn lookup_sources(pool: &SqlitePool) -> Result<HashMap<String, SourceRow>> {
    let rows = sqlx::query("SELECT id, title, url FROM sources")
        .fetch_all(pool)
        .await?;

    let mut map = HashMap::with_capacity(rows.len());
    for row in rows {
        let source = SourceRow {
            id: row.get("id"),
            title: row.get("title"),
            url: row.get("url"),
        };
        map.insert(source.id.clone(), source);
    }
    Ok(map)
}
