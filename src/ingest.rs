//! Index builder.
//!
//! Rebuilds the vector index from scratch: scan the document root, chunk
//! every document, embed the chunks in batches and store text, metadata
//! and vectors in SQLite. A rebuild replaces the previous contents inside
//! one transaction, so a failed run leaves the old index intact.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::connector_fs;
use crate::db;
use crate::embedding::{self, vec_to_blob, EmbeddingProvider};
use crate::migrate;
use crate::models::{Chunk, SourceItem};

/// Counts reported after a rebuild.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: u64,
    pub chunks: u64,
    pub vectors: u64,
}

pub async fn run_index(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embeddings are disabled; set [embedding].provider to build the index");
    }
    let provider = embedding::create_provider(&config.embedding)?;
    let stats = build_index(config, provider.as_ref()).await?;

    println!("index {}", config.index.root.display());
    println!("  documents: {}", stats.documents);
    println!("  chunks: {}", stats.chunks);
    println!("  vectors: {} ({})", stats.vectors, provider.model_name());
    println!("  path: {}", config.index.path.display());
    println!("ok");
    Ok(())
}

pub async fn build_index(config: &Config, provider: &dyn EmbeddingProvider) -> Result<IndexStats> {
    let items = connector_fs::scan_documents(&config.index)?;
    tracing::info!(documents = items.len(), "scanned document root");

    let pool = db::connect(&config.index.path, true).await?;
    migrate::run_migrations(&pool).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM chunk_vectors").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;

    let mut stats = IndexStats::default();
    for item in &items {
        let doc_id = insert_document(&mut tx, item).await?;
        let chunks = chunk_text(&doc_id, &item.body, config.chunking.max_tokens);
        insert_chunks(&mut tx, &chunks).await?;

        for batch in chunks.chunks(config.embedding.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = provider
                .embed(&texts)
                .await
                .with_context(|| format!("Failed to embed chunks of {}", item.source))?;
            if vectors.len() != batch.len() {
                bail!(
                    "Embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                insert_vector(&mut tx, chunk, provider.model_name(), vector).await?;
                stats.vectors += 1;
            }
        }

        tracing::debug!(source = %item.source, chunks = chunks.len(), "indexed document");
        stats.documents += 1;
        stats.chunks += chunks.len() as u64;
    }

    tx.commit().await?;
    pool.close().await;
    Ok(stats)
}

async fn insert_document(tx: &mut Transaction<'_, Sqlite>, item: &SourceItem) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(item.source.as_bytes());
    hasher.update(item.updated_at.timestamp().to_le_bytes());
    hasher.update(item.body.as_bytes());
    let dedup_hash = format!("{:x}", hasher.finalize());

    let doc_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO documents (id, source, title, content_type, updated_at, dedup_hash) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&doc_id)
    .bind(&item.source)
    .bind(&item.title)
    .bind(&item.content_type)
    .bind(item.updated_at.timestamp())
    .bind(&dedup_hash)
    .execute(&mut **tx)
    .await?;

    Ok(doc_id)
}

async fn insert_chunks(tx: &mut Transaction<'_, Sqlite>, chunks: &[Chunk]) -> Result<()> {
    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_vector(
    tx: &mut Transaction<'_, Sqlite>,
    chunk: &Chunk,
    model: &str,
    vector: &[f32],
) -> Result<()> {
    sqlx::query(
        "INSERT INTO chunk_vectors (chunk_id, document_id, model, dims, embedding) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&chunk.id)
    .bind(&chunk.document_id)
    .bind(model)
    .bind(vector.len() as i64)
    .bind(vec_to_blob(vector))
    .execute(&mut **tx)
    .await?;
    Ok(())
}
