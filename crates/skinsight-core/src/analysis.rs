//! Concern analysis: graph lookup + chat summary, then an improvised RAG pass seeded with that summary.
//!
//! [`run_report`] never fails: backend errors come back as [`ReportPayload::Error`],
//! and unavailable artifacts become placeholder text inside the report.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::answer::AnswerSections;
use crate::graph::{GraphRelation, KnowledgeGraph, DEFAULT_RELATED_LIMIT};
use crate::models::{ChatModel, Embedder, ModelError};
use crate::rag::{answer_query, PromptStyle, RagArtifacts, RagError, RagRequest};

pub const NO_GRAPH_DATA: &str = "No related graph data found.";
pub const NO_DOCUMENTS: &str = "No relevant documents found.";

/// Long-lived model handles, built once at startup and shared with workers.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcernAnalysis {
    pub concern: String,
    /// Graph relations rendered as `A -[REL]-> B`.
    pub graph_data: Vec<String>,
    pub analysis: String,
}

fn analysis_prompt(concern: &str, graph_text: &str) -> String {
    format!(
        "
You are an expert skincare analyst.

You will receive:
- A skincare concern
- Knowledge graph relationships extracted from user discussions

Task:
1. Summarise the main insights about the concern.
2. Identify the *most asked question* based on the relationships.
3. Create *one skincare-product-related question* commonly asked for this concern.

Skincare Concern: {concern}

Graph Data:
{graph_text}

Output format:

Summary:
<summary>

Most Asked Question:
<question>

Product-Related Question:
<question>
"
    )
}

/// Looks up relations for `concern` and asks the chat model to summarise them.
pub async fn analyse_concern(
    graph: &KnowledgeGraph,
    chat: &dyn ChatModel,
    concern: &str,
    limit: usize,
) -> Result<ConcernAnalysis, ModelError> {
    let graph_data: Vec<String> = graph
        .related(concern, limit)
        .iter()
        .map(GraphRelation::to_string)
        .collect();
    let graph_text = if graph_data.is_empty() {
        " ".to_string()
    } else {
        graph_data.join("\n")
    };
    let analysis = chat.generate(&analysis_prompt(concern, &graph_text)).await?;
    Ok(ConcernAnalysis {
        concern: concern.to_string(),
        graph_data,
        analysis,
    })
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub concern: String,
    pub graph_path: PathBuf,
    pub index_path: PathBuf,
    pub meta_path: PathBuf,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    pub concern: String,
    pub graph_text: String,
    pub analysis_text: String,
    pub rag_sections: AnswerSections,
}

/// Outcome of one report run: a report or an error message, never both.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPayload {
    Report(InsightReport),
    Error(String),
}

/// Runs graph analysis, then improvised RAG using the analysis as insights.
pub async fn run_report(services: &Services, request: &ReportRequest) -> ReportPayload {
    let graph = match KnowledgeGraph::load(&request.graph_path) {
        Ok(graph) => Some(graph),
        Err(e) => {
            warn!(error = %e, "graph store unavailable");
            None
        }
    };

    let empty = KnowledgeGraph::new();
    let analysis = match analyse_concern(
        graph.as_ref().unwrap_or(&empty),
        services.chat.as_ref(),
        &request.concern,
        DEFAULT_RELATED_LIMIT,
    )
    .await
    {
        Ok(analysis) => analysis,
        Err(e) => return ReportPayload::Error(format!("Error in concern analysis: {e}")),
    };

    let graph_text = match (&graph, analysis.graph_data.is_empty()) {
        (None, _) => format!("Graph store unavailable: {}", request.graph_path.display()),
        (Some(_), true) => NO_GRAPH_DATA.to_string(),
        (Some(_), false) => analysis.graph_data.join("\n"),
    };

    let rag_sections = improvised_sections(services, request, &analysis.analysis).await;
    info!(concern = %request.concern, "report finished");
    ReportPayload::Report(InsightReport {
        concern: analysis.concern,
        graph_text,
        analysis_text: analysis.analysis,
        rag_sections,
    })
}

async fn improvised_sections(services: &Services, request: &ReportRequest, insights: &str) -> AnswerSections {
    for path in [&request.index_path, &request.meta_path] {
        if !path.is_file() {
            return AnswerSections::message(format!(
                "RAG index unavailable: {}",
                RagError::Missing(path.clone())
            ));
        }
    }
    let artifacts = match RagArtifacts::load(&request.index_path, &request.meta_path) {
        Ok(artifacts) => artifacts,
        Err(e) => return AnswerSections::message(format!("RAG index unavailable: {e}")),
    };
    let rag_request = RagRequest {
        question: request.concern.clone(),
        top_k: request.top_k,
        style: PromptStyle::Improvised {
            insights: Some(insights.to_string()),
        },
    };
    match answer_query(services.embedder.as_ref(), services.chat.as_ref(), &artifacts, &rag_request).await {
        Ok(Some(answer)) => answer
            .sections
            .unwrap_or_else(|| AnswerSections::message(answer.raw)),
        Ok(None) => AnswerSections::message(NO_DOCUMENTS),
        Err(e) => AnswerSections::message(format!("Error running RAG: {e}")),
    }
}

/// Starts a report on a background task. The handle is the only completion signal; there is no cancellation.
pub fn spawn_report(services: Services, request: ReportRequest) -> JoinHandle<ReportPayload> {
    tokio::spawn(async move { run_report(&services, &request).await })
}

/// Waits for a spawned report; a panicked task becomes an error payload.
pub async fn wait_report(handle: JoinHandle<ReportPayload>) -> ReportPayload {
    handle
        .await
        .unwrap_or_else(|e| ReportPayload::Error(format!("Unhandled worker error: {e}")))
}
