//! Query-time retrieval: embed the query, search the index, join hits with their metadata.

use serde::Serialize;
use tracing::{debug, warn};

use crate::metadata::{ChunkMeta, MetadataStore};
use crate::models::{Embedder, ModelError};
use crate::store::{IndexError, VectorIndex, NO_MATCH};

/// A search result joined with its chunk record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: i64,
    /// Cosine similarity; higher is closer.
    pub score: f32,
    pub product_id: String,
    pub product_name: String,
    pub text: String,
    pub source: String,
    pub meta: ChunkMeta,
}

/// Hits in descending score order, plus how many index ids had no metadata row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Retrieval {
    pub hits: Vec<Hit>,
    pub dropped: usize,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Retrieves up to `k` hits for `query`. Ids missing from `metadata` are skipped and counted.
pub async fn retrieve(
    embedder: &dyn Embedder,
    index: &VectorIndex,
    metadata: &MetadataStore,
    query: &str,
    k: usize,
) -> Result<Retrieval, RetrieveError> {
    if index.is_empty() {
        debug!("index is empty, nothing to retrieve");
        return Ok(Retrieval::default());
    }
    let query_vec = embedder.embed(query).await?;
    // Slots past the index size are always NO_MATCH.
    let results = index.search(&query_vec, k.min(index.len()))?;
    let retrieval = join_results(&results, metadata);
    if retrieval.dropped > 0 {
        warn!(dropped = retrieval.dropped, "index ids missing from metadata");
    }
    Ok(retrieval)
}

/// Joins raw `(id, score)` search slots with metadata, keeping their order.
pub fn join_results(results: &[(i64, f32)], metadata: &MetadataStore) -> Retrieval {
    let mut retrieval = Retrieval::default();
    for &(id, score) in results {
        if id == NO_MATCH {
            continue;
        }
        let Some(record) = metadata.lookup(id) else {
            retrieval.dropped += 1;
            continue;
        };
        retrieval.hits.push(Hit {
            id,
            score,
            product_id: record.product_id.clone(),
            product_name: record.product_name.clone(),
            text: record.text.clone(),
            source: record.source.clone(),
            meta: record.meta.clone(),
        });
    }
    retrieval
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("failed to embed query: {0}")]
    Embed(#[from] ModelError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ChunkRecord;
    use crate::testing::{letter_vector, LetterEmbedder};

    fn record(id: i64, text: &str) -> ChunkRecord {
        ChunkRecord {
            id,
            product_id: format!("p{id}"),
            product_name: format!("Product {id}"),
            text: text.to_string(),
            source: format!("https://example.com/{id}"),
            meta: ChunkMeta::default(),
        }
    }

    #[test]
    fn join_drops_no_match_and_unknown_ids() {
        let metadata: MetadataStore = vec![record(1, "one"), record(2, "two")].into_iter().collect();
        let r = join_results(&[(1, 0.9), (3, 0.5), (NO_MATCH, f32::NEG_INFINITY)], &metadata);
        assert_eq!(r.hits.len(), 1);
        assert_eq!(r.hits[0].id, 1);
        assert_eq!(r.hits[0].product_name, "Product 1");
        assert_eq!(r.dropped, 1);
    }

    #[tokio::test]
    async fn unknown_index_ids_are_dropped_and_counted() {
        let metadata: MetadataStore = vec![record(1, "urea cream"), record(2, "sun fluid")]
            .into_iter()
            .collect();
        let mut index = VectorIndex::new(letter_vector("").len());
        index
            .add(&[1, 3], vec![letter_vector("urea cream"), letter_vector("acne gel")])
            .unwrap();

        let embedder = LetterEmbedder::default();
        let r = retrieve(&embedder, &index, &metadata, "urea cream", 3).await.unwrap();
        assert_eq!(r.hits.len(), 1);
        assert_eq!(r.hits[0].id, 1);
        assert!((r.hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(r.dropped, 1);
    }

    #[tokio::test]
    async fn hits_keep_descending_order() {
        let metadata: MetadataStore = vec![record(1, "a"), record(2, "b"), record(3, "c")]
            .into_iter()
            .collect();
        let mut index = VectorIndex::new(letter_vector("").len());
        index
            .add(
                &[1, 2, 3],
                vec![letter_vector("zzzz"), letter_vector("dry skin"), letter_vector("dry")],
            )
            .unwrap();
        let r = retrieve(&LetterEmbedder::default(), &index, &metadata, "dry skin", 3)
            .await
            .unwrap();
        let ids: Vec<i64> = r.hits.iter().map(|h| h.id).collect();
        assert_eq!(ids[0], 2);
        assert!(r.hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn huge_k_is_bounded_by_index_size() {
        let metadata: MetadataStore = vec![record(1, "serum"), record(2, "toner")]
            .into_iter()
            .collect();
        let mut index = VectorIndex::new(letter_vector("").len());
        index
            .add(&[1, 2], vec![letter_vector("serum"), letter_vector("toner")])
            .unwrap();
        let r = retrieve(&LetterEmbedder::default(), &index, &metadata, "serum", usize::MAX)
            .await
            .unwrap();
        assert_eq!(r.hits.len(), 2);
        assert_eq!(r.hits[0].id, 1);
        assert_eq!(r.dropped, 0);
    }

    #[tokio::test]
    async fn empty_index_is_empty_not_error() {
        let r = retrieve(
            &LetterEmbedder::default(),
            &VectorIndex::new(4),
            &MetadataStore::new(),
            "anything",
            5,
        )
        .await
        .unwrap();
        assert!(r.is_empty());
        assert_eq!(r.dropped, 0);
    }

    #[tokio::test]
    async fn embedding_failure_is_an_error() {
        let mut index = VectorIndex::new(letter_vector("").len());
        index.add(&[1], vec![letter_vector("x")]).unwrap();
        let embedder = LetterEmbedder::failing_first(1);
        let err = retrieve(&embedder, &index, &MetadataStore::new(), "x", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrieveError::Embed(_)));
    }
}
