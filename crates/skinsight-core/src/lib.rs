//! All pipeline logic independent of how it is run.
//!
//! Product pages are chunked, embedded and stored in a flat vector index with a
//! JSON-lines metadata sidecar ([indexer]). Queries are answered by retrieval
//! plus a chat model ([rag]). Social posts feed a knowledge graph ([graph]),
//! n-gram rankings ([ngrams]) and keyword trend forecasts ([trend]); [analysis]
//! combines graph and RAG into one report.

pub mod analysis;
pub mod answer;
pub mod app_data;
pub mod chunks;
pub mod config;
pub mod graph;
pub mod indexer;
pub mod metadata;
pub mod models;
pub mod ngrams;
pub mod ollama;
pub mod posts;
pub mod products;
pub mod prompt;
pub mod rag;
pub mod retriever;
pub mod store;
pub mod telemetry;
pub mod trend;

#[cfg(test)]
mod testing;

pub use analysis::{
    analyse_concern, run_report, spawn_report, wait_report, ConcernAnalysis, InsightReport,
    ReportPayload, ReportRequest, Services,
};
pub use answer::{parse_answer, AnswerSections, ParseStrategy};
pub use app_data::app_data_dir;
pub use chunks::{chunk_text, ChunkError, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use config::{
    config_path, init_config, load_config, load_config_from, save_config_to, Config, ConfigError,
};
pub use graph::{
    build_graph_from_posts, extract_triples, GraphDelta, GraphError, GraphRelation,
    KnowledgeGraph, Triple, DEFAULT_RELATED_LIMIT,
};
pub use indexer::{build_index, write_artifacts, BuiltIndex, IndexOptions, IndexerError, RetryPolicy};
pub use metadata::{ChunkMeta, ChunkRecord, MetadataError, MetadataStore};
pub use models::{ChatModel, Embedder, ModelError};
pub use ngrams::{top_ngrams, NgramCount, NgramKind, NgramReport, DEFAULT_NGRAM_TOP_K};
pub use ollama::{OllamaClient, OllamaError};
pub use posts::{read_posts, Post, PostError};
pub use products::{chunk_products, read_products, Product, ProductError};
pub use prompt::{build_basic_prompt, build_prompt};
pub use rag::{answer_query, PromptStyle, RagAnswer, RagArtifacts, RagError, RagRequest};
pub use retriever::{retrieve, Hit, RetrieveError, Retrieval};
pub use store::{IndexError, VectorIndex, NO_MATCH};
pub use trend::{daily_mentions, forecast, DailySeries, Direction, Forecast, TrendError};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "skinsight-core ready"
}
