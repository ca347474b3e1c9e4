//! Retrieval-augmented answering: retrieve → prompt → chat → parse.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::answer::{parse_answer, AnswerSections};
use crate::metadata::{MetadataError, MetadataStore};
use crate::models::{ChatModel, Embedder, ModelError};
use crate::prompt::{build_basic_prompt, build_prompt};
use crate::retriever::{retrieve, RetrieveError, Retrieval};
use crate::store::{IndexError, VectorIndex};

/// A loaded vector index and its metadata sidecar. Read-only once loaded.
#[derive(Debug)]
pub struct RagArtifacts {
    pub index: VectorIndex,
    pub metadata: MetadataStore,
}

impl RagArtifacts {
    pub fn load(index_path: &Path, meta_path: &Path) -> Result<Self, RagError> {
        let index = VectorIndex::load(index_path)?;
        let metadata = MetadataStore::load(meta_path)?;
        info!(vectors = index.len(), records = metadata.len(), "loaded RAG artifacts");
        Ok(Self { index, metadata })
    }
}

/// Which prompt template to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptStyle {
    /// Concise answer with a `Sources:` list; output is not sectioned.
    Basic,
    /// Answer, improvement and marketing sections, optionally informed by external insights.
    Improvised { insights: Option<String> },
}

#[derive(Debug, Clone)]
pub struct RagRequest {
    pub question: String,
    pub top_k: usize,
    pub style: PromptStyle,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub retrieval: Retrieval,
    pub prompt: String,
    pub raw: String,
    /// Parsed sections; only for [`PromptStyle::Improvised`].
    pub sections: Option<AnswerSections>,
}

/// Answers `request` from the artifacts. `Ok(None)` when retrieval finds nothing; the model is not called then.
pub async fn answer_query(
    embedder: &dyn Embedder,
    chat: &dyn ChatModel,
    artifacts: &RagArtifacts,
    request: &RagRequest,
) -> Result<Option<RagAnswer>, RagError> {
    let retrieval = retrieve(
        embedder,
        &artifacts.index,
        &artifacts.metadata,
        &request.question,
        request.top_k,
    )
    .await?;
    if retrieval.is_empty() {
        info!(dropped = retrieval.dropped, "no relevant documents found");
        return Ok(None);
    }

    let prompt = match &request.style {
        PromptStyle::Basic => build_basic_prompt(&request.question, &retrieval.hits),
        PromptStyle::Improvised { insights } => {
            build_prompt(&request.question, &retrieval.hits, insights.as_deref())
        }
    };
    info!(hits = retrieval.hits.len(), prompt_chars = prompt.len(), "calling chat model");
    let raw = chat.generate(&prompt).await.map_err(RagError::Chat)?;
    let sections = match request.style {
        PromptStyle::Basic => None,
        PromptStyle::Improvised { .. } => Some(parse_answer(&raw)),
    };
    Ok(Some(RagAnswer {
        retrieval,
        prompt,
        raw,
        sections,
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),
    #[error("chat model failed: {0}")]
    Chat(ModelError),
    #[error("missing RAG artifact: {0}")]
    Missing(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ChunkMeta, ChunkRecord};
    use crate::testing::{letter_vector, LetterEmbedder, ScriptedChat};

    fn artifacts() -> RagArtifacts {
        let texts = ["urea lotion for rough dry skin", "oil control gel for acne"];
        let mut index = VectorIndex::new(letter_vector("").len());
        index
            .add(&[1, 2], texts.iter().map(|t| letter_vector(t)).collect())
            .unwrap();
        let metadata = texts
            .iter()
            .enumerate()
            .map(|(i, t)| ChunkRecord {
                id: i as i64 + 1,
                product_id: format!("p{i}"),
                product_name: format!("Product {}", i + 1),
                text: t.to_string(),
                source: format!("https://example.com/{}", i + 1),
                meta: ChunkMeta::default(),
            })
            .collect();
        RagArtifacts { index, metadata }
    }

    #[tokio::test]
    async fn improvised_answer_is_parsed() {
        let chat = ScriptedChat::always(
            "### Answer\nProduct 1\n### Product Improvement Suggestions\nAdd ceramides\n### Sources\nhttps://example.com/1",
        );
        let request = RagRequest {
            question: "urea for dry skin".into(),
            top_k: 1,
            style: PromptStyle::Improvised {
                insights: Some("low ceramides".into()),
            },
        };
        let answer = answer_query(&LetterEmbedder::default(), &chat, &artifacts(), &request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer.retrieval.hits.len(), 1);
        assert_eq!(answer.retrieval.hits[0].id, 1);
        let sections = answer.sections.unwrap();
        assert_eq!(sections.answer, "Product 1");
        assert_eq!(sections.suggestions, "Add ceramides");
        let prompts = chat.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("low ceramides"));
    }

    #[tokio::test]
    async fn basic_answer_is_not_sectioned() {
        let chat = ScriptedChat::always("Product 2. Sources: https://example.com/2");
        let request = RagRequest {
            question: "acne gel".into(),
            top_k: 2,
            style: PromptStyle::Basic,
        };
        let answer = answer_query(&LetterEmbedder::default(), &chat, &artifacts(), &request)
            .await
            .unwrap()
            .unwrap();
        assert!(answer.sections.is_none());
        assert_eq!(answer.retrieval.hits.len(), 2);
        assert!(answer.prompt.contains("Question: acne gel"));
    }

    #[tokio::test]
    async fn no_hits_skips_the_model() {
        let chat = ScriptedChat::always("unused");
        let empty = RagArtifacts {
            index: VectorIndex::new(0),
            metadata: MetadataStore::new(),
        };
        let request = RagRequest {
            question: "anything".into(),
            top_k: 5,
            style: PromptStyle::Basic,
        };
        let answer = answer_query(&LetterEmbedder::default(), &chat, &empty, &request)
            .await
            .unwrap();
        assert!(answer.is_none());
        assert!(chat.prompts().is_empty());
    }

    #[tokio::test]
    async fn chat_failure_propagates() {
        let chat = ScriptedChat::new(vec![Err("model not found".into())], "");
        let request = RagRequest {
            question: "urea".into(),
            top_k: 1,
            style: PromptStyle::Basic,
        };
        let err = answer_query(&LetterEmbedder::default(), &chat, &artifacts(), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Chat(_)));
    }
}
