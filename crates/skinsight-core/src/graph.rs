//! Knowledge graph of `(subject, relation, object)` triples extracted from social posts.
//!
//! Triples come from the chat model and are untrusted: unparseable output
//! yields no triples, and incomplete triples are skipped.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chunks::{chunk_text, ChunkError};
use crate::models::ChatModel;
use crate::posts::Post;

/// Default number of relations returned by [`KnowledgeGraph::related`].
pub const DEFAULT_RELATED_LIMIT: usize = 15;
/// Posts shorter than this (after trimming) are not sent for extraction.
const MIN_POST_CHARS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub object: String,
}

impl Triple {
    pub fn new(subject: &str, relation: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            relation: relation.to_string(),
            object: object.to_string(),
        }
    }
}

/// One edge as returned by a graph query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphRelation {
    pub source: String,
    pub relation: String,
    pub target: String,
}

impl fmt::Display for GraphRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.relation, self.target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entity {
    name: String,
    /// Where the entity was first seen (e.g. `posts`).
    origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Relation {
    relation: String,
    origin: String,
}

/// What a merge added to the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphDelta {
    pub nodes_added: usize,
    pub edges_added: usize,
}

impl std::ops::AddAssign for GraphDelta {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes_added += rhs.nodes_added;
        self.edges_added += rhs.edges_added;
    }
}

/// Directed entity graph. Nodes are unique by name; edges unique by `(source, relation, target)`.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<Entity, Relation>,
    by_name: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn ensure_node(&mut self, name: &str, origin: &str, delta: &mut GraphDelta) -> NodeIndex {
        if let Some(&idx) = self.by_name.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(Entity {
            name: name.to_string(),
            origin: origin.to_string(),
        });
        self.by_name.insert(name.to_string(), idx);
        delta.nodes_added += 1;
        idx
    }

    /// Merges `triples` into the graph. Triples with an empty (trimmed) part are skipped.
    pub fn add_triples(&mut self, triples: &[Triple], origin: &str) -> GraphDelta {
        let mut delta = GraphDelta::default();
        for t in triples {
            let (subj, rel, obj) = (t.subject.trim(), t.relation.trim(), t.object.trim());
            if subj.is_empty() || rel.is_empty() || obj.is_empty() {
                continue;
            }
            let a = self.ensure_node(subj, origin, &mut delta);
            let b = self.ensure_node(obj, origin, &mut delta);
            let exists = self
                .graph
                .edges_connecting(a, b)
                .any(|e| e.weight().relation == rel);
            if !exists {
                self.graph.add_edge(
                    a,
                    b,
                    Relation {
                        relation: rel.to_string(),
                        origin: origin.to_string(),
                    },
                );
                delta.edges_added += 1;
            }
        }
        delta
    }

    /// Relations whose source or target name contains `keyword` (case-insensitive), at most `limit`.
    pub fn related(&self, keyword: &str, limit: usize) -> Vec<GraphRelation> {
        let kw = keyword.to_lowercase();
        self.graph
            .edge_references()
            .filter_map(|e| {
                let source = &self.graph[e.source()].name;
                let target = &self.graph[e.target()].name;
                let hit = source.to_lowercase().contains(&kw) || target.to_lowercase().contains(&kw);
                hit.then(|| GraphRelation {
                    source: source.clone(),
                    relation: e.weight().relation.clone(),
                    target: target.clone(),
                })
            })
            .take(limit)
            .collect()
    }

    /// Writes the graph as a JSON document of nodes and edges.
    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        let doc = GraphDocument {
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| EdgeRecord {
                    source: self.graph[e.source()].name.clone(),
                    target: self.graph[e.target()].name.clone(),
                    relation: e.weight().clone(),
                })
                .collect(),
        };
        let s = serde_json::to_string_pretty(&doc).map_err(GraphError::Serialize)?;
        std::fs::write(path, s).map_err(|e| GraphError::Io(path.to_path_buf(), e))
    }

    /// Reads a graph written by [`KnowledgeGraph::save`].
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let s = std::fs::read_to_string(path).map_err(|e| GraphError::Io(path.to_path_buf(), e))?;
        let doc: GraphDocument = serde_json::from_str(&s).map_err(|e| GraphError::Parse(path.to_path_buf(), e))?;
        let mut graph = Self::new();
        let mut delta = GraphDelta::default();
        for node in &doc.nodes {
            graph.ensure_node(&node.name, &node.origin, &mut delta);
        }
        for edge in doc.edges {
            let triple = Triple::new(&edge.source, &edge.relation.relation, &edge.target);
            graph.add_triples(&[triple], &edge.relation.origin);
        }
        Ok(graph)
    }
}

#[derive(Serialize, Deserialize)]
struct GraphDocument {
    nodes: Vec<Entity>,
    edges: Vec<EdgeRecord>,
}

#[derive(Serialize, Deserialize)]
struct EdgeRecord {
    source: String,
    target: String,
    #[serde(flatten)]
    relation: Relation,
}

fn triple_prompt(text: &str) -> String {
    format!(
        r#"Extract knowledge graph triples from the text.
Return ONLY valid JSON in this structure:

[
  {{"subject": "...", "relation": "...", "object": "..."}}
]

Text:
{text}
"#
    )
}

/// Parses a JSON triple array out of model output, tolerating prose around it.
pub fn parse_triples(raw: &str) -> Option<Vec<Triple>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

/// Asks the chat model for triples in `text`. Model errors and malformed output give an empty list.
pub async fn extract_triples(chat: &dyn ChatModel, text: &str) -> Vec<Triple> {
    let raw = match chat.generate(&triple_prompt(text)).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "triple extraction failed");
            return Vec::new();
        }
    };
    match parse_triples(&raw) {
        Some(triples) => triples,
        None => {
            warn!(response_chars = raw.len(), "could not parse triples");
            Vec::new()
        }
    }
}

/// Extracts triples from every post, `segment_len` characters at a time, and merges them into `graph`.
pub async fn build_graph_from_posts(
    chat: &dyn ChatModel,
    posts: &[Post],
    segment_len: usize,
    graph: &mut KnowledgeGraph,
) -> Result<GraphDelta, GraphError> {
    let mut total = GraphDelta::default();
    for (i, post) in posts.iter().enumerate() {
        if post.clean_text.trim().chars().count() < MIN_POST_CHARS {
            continue;
        }
        for segment in chunk_text(&post.clean_text, segment_len, 0)? {
            let triples = extract_triples(chat, &segment).await;
            let delta = graph.add_triples(&triples, "posts");
            debug!(post = i, triples = triples.len(), ?delta, "merged segment");
            total += delta;
        }
    }
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        added_nodes = total.nodes_added,
        added_edges = total.edges_added,
        "graph built"
    );
    Ok(total)
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("invalid graph file {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
    #[error("failed to serialize graph: {0}")]
    Serialize(serde_json::Error),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChat;

    fn sample() -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        g.add_triples(
            &[
                Triple::new("Acne", "causes", "Redness"),
                Triple::new("Dry skin", "treated_by", "Urea"),
                Triple::new("Salicylic acid", "treats", "acne"),
            ],
            "test",
        );
        g
    }

    #[test]
    fn nodes_and_edges_are_deduplicated() {
        let mut g = KnowledgeGraph::new();
        let d1 = g.add_triples(&[Triple::new("acne", "causes", "redness")], "t");
        assert_eq!(d1, GraphDelta { nodes_added: 2, edges_added: 1 });
        let d2 = g.add_triples(
            &[
                Triple::new(" acne ", "causes", "redness"),
                Triple::new("acne", "worsened_by", "redness"),
            ],
            "t",
        );
        assert_eq!(d2, GraphDelta { nodes_added: 0, edges_added: 1 });
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn incomplete_triples_are_skipped() {
        let mut g = KnowledgeGraph::new();
        let d = g.add_triples(&[Triple::new("acne", "", "redness"), Triple::new("", "x", "y")], "t");
        assert_eq!(d, GraphDelta::default());
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn related_matches_either_end_case_insensitively() {
        let g = sample();
        let rels: Vec<String> = g.related("ACNE", DEFAULT_RELATED_LIMIT).iter().map(|r| r.to_string()).collect();
        assert_eq!(rels, vec!["Acne -[causes]-> Redness", "Salicylic acid -[treats]-> acne"]);
        assert_eq!(g.related("acne", 1).len(), 1);
        assert!(g.related("retinol", 15).is_empty());
    }

    #[test]
    fn save_and_load() {
        let g = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        g.save(&path).unwrap();
        let loaded = KnowledgeGraph::load(&path).unwrap();
        assert_eq!(loaded.node_count(), g.node_count());
        assert_eq!(loaded.edge_count(), g.edge_count());
        assert_eq!(loaded.related("urea", 15), g.related("urea", 15));
    }

    #[test]
    fn parse_triples_tolerates_prose() {
        let raw = "Sure! Here you go:\n[{\"subject\": \"acne\", \"relation\": \"causes\", \"object\": \"redness\"}]\nHope that helps.";
        assert_eq!(parse_triples(raw), Some(vec![Triple::new("acne", "causes", "redness")]));
        assert_eq!(parse_triples("no json here"), None);
        assert_eq!(parse_triples("] backwards ["), None);
    }

    #[tokio::test]
    async fn malformed_output_adds_nothing_and_continues() {
        let chat = ScriptedChat::new(
            vec![
                Ok("acne is dry, I think?".into()),
                Ok(r#"[{"subject": "urea", "relation": "soothes", "object": "dry skin"}]"#.into()),
            ],
            "[]",
        );
        let posts = vec![
            Post::new("2024-01-01", "acnex2: acne is dry. acne causes redness."),
            Post::new("2024-01-02", "urea cream soothes my dry skin"),
        ];
        let mut g = KnowledgeGraph::new();
        let delta = build_graph_from_posts(&chat, &posts, 400, &mut g).await.unwrap();
        assert_eq!(delta, GraphDelta { nodes_added: 2, edges_added: 1 });
        assert_eq!(chat.prompts().len(), 2);
        assert!(g.related("acne", 15).is_empty());
    }

    #[tokio::test]
    async fn model_error_yields_no_triples() {
        let chat = ScriptedChat::new(vec![Err("timeout".into())], "[]");
        assert!(extract_triples(&chat, "acne causes redness").await.is_empty());
    }

    #[tokio::test]
    async fn short_posts_and_long_segments() {
        let chat = ScriptedChat::always("[]");
        let posts = vec![Post::new("", "hi"), Post::new("", &"a".repeat(900))];
        let mut g = KnowledgeGraph::new();
        build_graph_from_posts(&chat, &posts, 400, &mut g).await.unwrap();
        // 900 chars in 400-char segments: 3 calls; the short post is skipped.
        assert_eq!(chat.prompts().len(), 3);
    }
}
