//! Index pipeline: products → chunk → embed (batched, bounded retry) → vector index + metadata sidecar.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::metadata::{ChunkRecord, MetadataError, MetadataStore};
use crate::models::{Embedder, ModelError};
use crate::products::{chunk_products, Product, ProductError};
use crate::store::{IndexError, VectorIndex};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// How a failed embedding batch is retried. The whole batch is re-embedded from the same offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): base · 2^(attempt−1), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl IndexOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            batch_size: config.batch_size.max(1),
            retry: RetryPolicy {
                max_attempts: config.retry_attempts.max(1),
                base_delay: config.retry_delay(),
                max_delay: MAX_RETRY_DELAY,
            },
        }
    }
}

/// The in-memory result of indexing: vectors plus the records they join to.
#[derive(Debug)]
pub struct BuiltIndex {
    pub index: VectorIndex,
    pub records: Vec<ChunkRecord>,
}

impl BuiltIndex {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn metadata(&self) -> MetadataStore {
        self.records.iter().cloned().collect()
    }
}

/// Runs the full pipeline: chunk products, embed every chunk, build the index.
/// No chunks → an empty index of dimension 0.
pub async fn build_index(
    products: &[Product],
    embedder: &dyn Embedder,
    options: &IndexOptions,
) -> Result<BuiltIndex, IndexerError> {
    let records = chunk_products(products, options.chunk_size, options.chunk_overlap)?;
    info!(products = products.len(), chunks = records.len(), "chunked products");
    if records.is_empty() {
        return Ok(BuiltIndex {
            index: VectorIndex::new(0),
            records,
        });
    }

    let total = records.len();
    let batch_size = options.batch_size.max(1);
    let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(total);
    let mut offset = 0;
    while offset < total {
        let end = (offset + batch_size).min(total);
        let texts: Vec<String> = records[offset..end].iter().map(|r| r.text.clone()).collect();
        let batch = embed_with_retry(embedder, &texts, offset, &options.retry).await?;
        if batch.len() != texts.len() {
            return Err(IndexerError::CountMismatch {
                expected: texts.len(),
                got: batch.len(),
            });
        }
        embeddings.extend(batch);
        offset = end;
        info!(embedded = offset, total, "embedded batch");
    }

    let dim = embeddings[0].len();
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    let mut index = VectorIndex::new(dim);
    index.add(&ids, embeddings)?;
    info!(vectors = index.len(), dim, "built vector index");
    Ok(BuiltIndex { index, records })
}

async fn embed_with_retry(
    embedder: &dyn Embedder,
    texts: &[String],
    offset: usize,
    policy: &RetryPolicy,
) -> Result<Vec<Vec<f32>>, IndexerError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match embedder.embed_batch(texts).await {
            Ok(vectors) => {
                debug!(offset, attempt, "batch embedded");
                return Ok(vectors);
            }
            Err(err) if attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(offset, attempt, error = %err, delay_ms = delay.as_millis() as u64, "embedding batch failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return Err(IndexerError::RetriesExhausted {
                    offset,
                    attempts: attempt,
                    source: err,
                })
            }
        }
    }
}

/// Writes the index artifact and its metadata sidecar.
pub fn write_artifacts(
    built: &BuiltIndex,
    index_out: &Path,
    meta_out: &Path,
) -> Result<(), IndexerError> {
    info!(path = %index_out.display(), "saving vector index");
    built.index.save(index_out)?;
    info!(path = %meta_out.display(), "writing metadata");
    MetadataStore::write(meta_out, &built.records)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error("embedding batch at offset {offset} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        offset: usize,
        attempts: u32,
        source: ModelError,
    },
    #[error("embedder returned {got} vectors for {expected} texts")]
    CountMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}
