//! Vector index client.
//!
//! [`SqliteIndex`] answers nearest-neighbour queries against the index
//! written by [`crate::ingest`]. The connection pool opens lazily on the
//! first query; a failed open is retried on the next one. Distances are
//! squared L2, so lower is closer.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::AssistError;
use crate::models::ScoredDocument;

/// Nearest-neighbour lookup over the document corpus.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` documents, ascending by distance.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, AssistError>;
}

pub struct SqliteIndex {
    path: PathBuf,
    provider: Box<dyn EmbeddingProvider>,
    pool: OnceCell<SqlitePool>,
}

impl SqliteIndex {
    pub fn new(path: PathBuf, provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            path,
            provider,
            pool: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = embedding::create_provider(&config.embedding)?;
        Ok(Self::new(config.index.path.clone(), provider))
    }

    async fn pool(&self) -> Result<&SqlitePool, AssistError> {
        self.pool
            .get_or_try_init(|| async {
                let started = Instant::now();
                let pool = db::connect(&self.path, false)
                    .await
                    .map_err(AssistError::index)?;
                tracing::info!(
                    path = %self.path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "opened vector index"
                );
                Ok::<_, AssistError>(pool)
            })
            .await
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, AssistError> {
        let pool = self.pool().await?;
        let started = Instant::now();

        let query_vec = embedding::embed_query(self.provider.as_ref(), query)
            .await
            .map_err(AssistError::index)?;

        let rows = sqlx::query(
            r#"
            SELECT c.text, cv.embedding, d.source, d.title
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            JOIN documents d ON d.id = cv.document_id
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AssistError::index)?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let distance = embedding::squared_l2_distance(&query_vec, &embedding::blob_to_vec(&blob));
                let mut metadata = HashMap::new();
                metadata.insert("source".to_string(), row.get::<String, _>("source"));
                metadata.insert("title".to_string(), row.get::<String, _>("title"));
                ScoredDocument {
                    text: row.get("text"),
                    metadata,
                    distance,
                }
            })
            .collect();

        let nearest = nearest(scored, k);
        tracing::debug!(
            candidates = rows.len(),
            returned = nearest.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector search"
        );
        Ok(nearest)
    }
}

/// Keep the `k` closest documents, ascending by distance. Documents whose
/// vectors could not be compared (infinite distance) are dropped.
pub fn nearest(mut docs: Vec<ScoredDocument>, k: usize) -> Vec<ScoredDocument> {
    docs.retain(|d| d.distance.is_finite());
    docs.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    docs.truncate(k);
    docs
}

/// `medassist search`: print the nearest documents with their distances.
pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let index = SqliteIndex::from_config(config)?;
    let results = index
        .search(query, k.unwrap_or(config.retrieval.k))
        .await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let accept = config
        .retrieval
        .max_distances
        .last()
        .copied()
        .unwrap_or(f32::INFINITY);
    for (i, doc) in results.iter().enumerate() {
        let marker = if doc.distance <= accept { "" } else { " (above threshold)" };
        println!(
            "{}. [{:.3}] {}{}",
            i + 1,
            doc.distance,
            doc.source().unwrap_or("unknown document"),
            marker
        );
        let excerpt: String = doc.text.replace('\n', " ").chars().take(240).collect();
        println!("    excerpt: \"{}\"", excerpt.trim());
        println!();
    }

    Ok(())
}
