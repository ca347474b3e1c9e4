//! CLI entry point for the Skinsight pipeline.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use skinsight_core::telemetry::{get_subscriber, init_subscriber};
use skinsight_core::{
    answer_query, app_data_dir, build_graph_from_posts, build_index, config_path, daily_mentions,
    forecast, init_config, load_config, load_config_from, read_posts, read_products, spawn_report,
    status, top_ngrams, wait_report, AnswerSections, Config, Direction, IndexOptions,
    KnowledgeGraph, NgramKind, OllamaClient, PromptStyle, RagArtifacts, RagRequest, ReportPayload,
    ReportRequest, Services, DEFAULT_NGRAM_TOP_K, DEFAULT_RELATED_LIMIT,
};
use tracing::warn;

const PROMPT_PREVIEW_CHARS: usize = 2000;

#[derive(Parser)]
#[command(name = "skinsight")]
#[command(about = "Skinsight: skincare market intelligence (RAG, knowledge graph, trends)")]
struct Cli {
    /// Config file to use instead of the one in the app data directory.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status and the active model settings.
    Status,
    /// Show where Skinsight stores its config.
    DataDir,
    /// Write a default config file (to --config, or the app data directory).
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Chunk and embed a product JSON-lines file into a vector index plus metadata sidecar.
    Index {
        /// Product JSON-lines file.
        #[arg(long, short = 'i')]
        input: PathBuf,
        /// Where to write the vector index.
        #[arg(long = "index_out", default_value = "skincare.index")]
        index_out: PathBuf,
        /// Where to write the chunk metadata (JSON lines).
        #[arg(long = "meta_out", default_value = "skincare_metadata.jsonl")]
        meta_out: PathBuf,
    },
    /// Answer a question from the indexed products.
    Query {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        meta: PathBuf,
        #[arg(long)]
        query: String,
        /// Number of chunks to retrieve (default from config: 5).
        #[arg(long = "top_k")]
        top_k: Option<usize>,
        /// Free-text insights appended to the prompt; implies --improvise.
        #[arg(long)]
        insights: Option<String>,
        /// Use the sectioned answer / improvement / marketing template.
        #[arg(long, default_value_t = false)]
        improvise: bool,
    },
    /// Extract triples from social posts (JSON lines) into a knowledge graph file.
    Graph {
        #[arg(long)]
        posts: PathBuf,
        #[arg(long = "graph_out", default_value = "skincare_graph.json")]
        graph_out: PathBuf,
    },
    /// List graph relations whose entities mention a keyword.
    Related {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        keyword: String,
        #[arg(long, default_value_t = DEFAULT_RELATED_LIMIT)]
        limit: usize,
    },
    /// Analyse a skin concern: graph insights plus an improvised RAG answer.
    Analyse {
        #[arg(long)]
        concern: String,
        #[arg(long, default_value = "skincare_graph.json")]
        graph: PathBuf,
        #[arg(long, default_value = "skincare.index")]
        index: PathBuf,
        #[arg(long, default_value = "skincare_metadata.jsonl")]
        meta: PathBuf,
        #[arg(long = "top_k")]
        top_k: Option<usize>,
        /// Print the report payload as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Rank the most frequent unigrams and bigrams in skin-related posts.
    Ngrams {
        #[arg(long)]
        posts: PathBuf,
        #[arg(long = "top_k", default_value_t = DEFAULT_NGRAM_TOP_K)]
        top_k: usize,
        /// Print the ranking as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Forecast daily mentions of a keyword in social posts.
    Forecast {
        #[arg(long)]
        posts: PathBuf,
        #[arg(long)]
        keyword: String,
        #[arg(long, default_value_t = skinsight_core::trend::DEFAULT_FORECAST_DAYS)]
        days: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_subscriber(get_subscriber("info")) {
        eprintln!("{e}");
    }
    let config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };

    match run(cli.command.unwrap_or(Commands::Status), &config, cli.config.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &Config, config_file: Option<&Path>) -> Result<()> {
    match command {
        Commands::Status => {
            println!("Skinsight backend");
            println!("  core: {}", status());
            println!("  ollama: {}", config.ollama_url);
            println!("  embed model: {}", config.embed_model);
            println!("  chat model: {}", config.chat_model);
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => {
                println!("{}", p.display());
                if let Some(c) = config_path() {
                    println!("  config: {}", c.display());
                }
            }
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::InitConfig { force } => {
            let (path, written) = init_config(config_file, force)?;
            if written {
                println!("Wrote default config to {}", path.display());
            } else {
                println!("Config already exists at {} (use --force to overwrite)", path.display());
            }
        }
        Commands::Index {
            input,
            index_out,
            meta_out,
        } => {
            let products = read_products(&input)?;
            let client = OllamaClient::from_config(config)?;
            let built = build_index(&products, &client, &IndexOptions::from_config(config)).await?;
            if built.is_empty() {
                println!("No documents/chunks to index. Exiting.");
                return Ok(());
            }
            skinsight_core::write_artifacts(&built, &index_out, &meta_out)?;
            println!(
                "Indexed {} chunks from {} products ({} dims)",
                built.records.len(),
                products.len(),
                built.index.dim()
            );
            println!("  index: {}", index_out.display());
            println!("  metadata: {}", meta_out.display());
        }
        Commands::Query {
            index,
            meta,
            query,
            top_k,
            insights,
            improvise,
        } => {
            let artifacts = RagArtifacts::load(&index, &meta)?;
            let client = OllamaClient::from_config(config)?;
            let style = if improvise || insights.is_some() {
                PromptStyle::Improvised { insights }
            } else {
                PromptStyle::Basic
            };
            let request = RagRequest {
                question: query,
                top_k: top_k.unwrap_or(config.top_k),
                style,
            };
            let Some(answer) = answer_query(&client, &client, &artifacts, &request).await? else {
                println!("No relevant documents found.");
                return Ok(());
            };
            println!("=== Prompt sent to model ===");
            println!("{}", preview(&answer.prompt, PROMPT_PREVIEW_CHARS));
            match &answer.sections {
                Some(sections) => print_sections(sections),
                None => {
                    println!("\n=== Answer ===\n");
                    println!("{}", answer.raw);
                }
            }
            println!("\n=== Retrieved chunks (top_k) ===");
            for h in &answer.retrieval.hits {
                println!(
                    "- id:{} score:{:.4} product:{} source:{}",
                    h.id, h.score, h.product_name, h.source
                );
            }
            if answer.retrieval.dropped > 0 {
                warn!(
                    dropped = answer.retrieval.dropped,
                    "some index ids had no metadata; index and sidecar may be out of sync"
                );
            }
        }
        Commands::Graph { posts, graph_out } => {
            let posts = read_posts(&posts)?;
            let client = OllamaClient::from_config(config)?;
            let mut graph = KnowledgeGraph::new();
            build_graph_from_posts(&client, &posts, config.graph_segment_len, &mut graph).await?;
            graph.save(&graph_out)?;
            println!("Graph stats:");
            println!("  Nodes: {}", graph.node_count());
            println!("  Edges: {}", graph.edge_count());
            println!("  Saved: {}", graph_out.display());
        }
        Commands::Related {
            graph,
            keyword,
            limit,
        } => {
            let graph = KnowledgeGraph::load(&graph)?;
            let relations = graph.related(&keyword, limit);
            if relations.is_empty() {
                println!("No related graph data found.");
            }
            for r in relations {
                println!("{r}");
            }
        }
        Commands::Analyse {
            concern,
            graph,
            index,
            meta,
            top_k,
            json,
        } => {
            let client = Arc::new(OllamaClient::from_config(config)?);
            let services = Services {
                embedder: client.clone(),
                chat: client,
            };
            let request = ReportRequest {
                concern,
                graph_path: graph,
                index_path: index,
                meta_path: meta,
                top_k: top_k.unwrap_or(config.top_k),
            };
            let payload = wait_report(spawn_report(services, request)).await;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload).context("failed to encode report")?
                );
                return Ok(());
            }
            match payload {
                ReportPayload::Error(msg) => println!("Error: {msg}"),
                ReportPayload::Report(report) => {
                    println!("=== Concern: {} ===", report.concern);
                    println!("\n=== Graph relations ===\n{}", report.graph_text);
                    println!("\n=== Analysis ===\n{}", report.analysis_text);
                    print_sections(&report.rag_sections);
                }
            }
        }
        Commands::Ngrams { posts, top_k, json } => {
            let posts = read_posts(&posts)?;
            let report = top_ngrams(&posts, top_k);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("failed to encode n-grams")?
                );
                return Ok(());
            }
            println!("Filtered to {} skin-related posts", report.skin_posts);
            if report.ngrams.is_empty() {
                println!("No n-grams found.");
                return Ok(());
            }
            println!("\n--- Top N-grams ---");
            for n in &report.ngrams {
                let kind = match n.kind {
                    NgramKind::Unigram => "unigram",
                    NgramKind::Bigram => "bigram",
                };
                println!("  {:<30} {:>6} {:>7.2}%  {kind}", n.ngram, n.count, n.percent);
            }
        }
        Commands::Forecast {
            posts,
            keyword,
            days,
        } => {
            let posts = read_posts(&posts)?;
            let series = daily_mentions(&posts, &keyword)
                .with_context(|| format!("no posts with a readable timestamp mention '{keyword}'"))?;
            let tail = series.len().saturating_sub(5);
            println!("Daily mentions of '{keyword}' (last days):");
            for i in tail..series.len() {
                println!("  {}  {}", series.day(i), series.counts[i]);
            }
            let fc = forecast(&series, days)?;
            println!("\nForecast ({:?}):", fc.method);
            for (i, v) in fc.values.iter().enumerate() {
                println!("  {}  {:.2}", fc.day(i), v);
            }
            let direction = match fc.direction {
                Direction::Increasing => "increasing",
                Direction::Decreasing => "decreasing",
                Direction::Stable => "stable",
            };
            println!(
                "\nThe interest in '{keyword}' is predicted to be {direction} over the next {days} days."
            );
        }
    }
    Ok(())
}

fn print_sections(sections: &AnswerSections) {
    println!("\n=== Answer ===\n{}", sections.answer);
    if !sections.suggestions.is_empty() {
        println!("\n=== Product Improvement Suggestions ===\n{}", sections.suggestions);
    }
    if !sections.marketing.is_empty() {
        println!("\n=== Marketing Suggestions ===\n{}", sections.marketing);
    }
    if !sections.sources.is_empty() {
        println!("\n=== Sources ===\n{}", sections.sources);
    }
}

/// First `max` characters of `s`, marked when truncated.
fn preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n\n...TRUNCATED...\n", &s[..cut]),
        None => s.to_string(),
    }
}
