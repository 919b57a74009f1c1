//! provkg command-line tool.
//!
//! `fetch` snapshots the source graph, `merge` writes the provenance graph,
//! `search` and `ask` query the facts of a merged graph.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use provkg::graph::{read_ntriples, write_ntriples};
use provkg::{Config, ContextMode, EmbedderKind, Graph, Pipeline, SparqlSource};

/// Administrative-region provenance knowledge graph
#[derive(Parser)]
#[command(name = "provkg", version)]
#[command(about = "Merge region mappings into a provenance graph and query it")]
struct Cli {
    /// Namespace for minted entity identifiers
    #[arg(long, global = true)]
    entity_namespace: Option<String>,

    /// Timeout for outbound requests, in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Embedding provider: lexical or fastembed
    #[arg(long, global = true)]
    embedder: Option<EmbedderKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query the SPARQL endpoint and write the source snapshot
    Fetch {
        /// SPARQL endpoint URL
        #[arg(long)]
        endpoint: Option<String>,

        /// Output N-Triples file
        #[arg(short, long, default_value = "data/provinces.nt")]
        output: PathBuf,
    },

    /// Merge a mapping table against a source snapshot
    Merge {
        /// Source snapshot (N-Triples)
        #[arg(short, long, default_value = "data/provinces.nt")]
        source: PathBuf,

        /// Mapping table (CSV with new_province, old_province columns)
        #[arg(short, long, default_value = "data/mapping.csv")]
        mapping: PathBuf,

        /// Output N-Triples file
        #[arg(short, long, default_value = "data/merged.nt")]
        output: PathBuf,
    },

    /// Print the facts most similar to a query
    Search {
        /// Query text
        query: String,

        /// Merged graph (N-Triples)
        #[arg(long, default_value = "data/merged.nt")]
        merged: PathBuf,

        /// Number of facts
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Answer a question from the merged graph
    Ask {
        /// Question text
        question: String,

        /// Merged graph (N-Triples)
        #[arg(long, default_value = "data/merged.nt")]
        merged: PathBuf,

        /// Number of retrieved facts
        #[arg(short, long)]
        k: Option<usize>,

        /// Use every fact as context instead of retrieval
        #[arg(long, conflicts_with = "k")]
        all_facts: bool,

        /// Language model name
        #[arg(long)]
        model: Option<String>,
    },
}

fn read_graph(pipeline: &Pipeline, path: &Path) -> Result<Graph> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_ntriples(BufReader::new(file), pipeline.vocabulary())
        .with_context(|| format!("reading {}", path.display()))
}

fn write_graph(pipeline: &Pipeline, graph: &Graph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    write_ntriples(graph, pipeline.vocabulary(), &mut out)?;
    out.flush()?;
    Ok(())
}

fn load_pipeline(config: &Config, merged: &Path) -> Result<Pipeline> {
    let pipeline = Pipeline::from_config(config)?;
    let graph = read_graph(&pipeline, merged)?;
    pipeline.load_facts(&graph)?;
    Ok(pipeline)
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(ns) = cli.entity_namespace {
        config.entity_namespace = ns;
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(kind) = cli.embedder {
        config.embedder = kind;
    }

    match cli.command {
        Command::Fetch { endpoint, output } => {
            if let Some(endpoint) = endpoint {
                config.sparql_endpoint = endpoint;
            }
            let pipeline = Pipeline::from_config(&config)?;
            let source = SparqlSource::new(config.sparql_endpoint.as_str(), config.request_timeout)?;
            let graph = pipeline.snapshot(&source)?;
            write_graph(&pipeline, &graph, &output)?;
            println!("Wrote {} triples to {}", graph.len(), output.display());
        }
        Command::Merge {
            source,
            mapping,
            output,
        } => {
            let pipeline = Pipeline::from_config(&config)?;
            let source_graph = read_graph(&pipeline, &source)?;
            let table = File::open(&mapping).with_context(|| format!("opening {}", mapping.display()))?;
            let (graph, report) = pipeline.run(&source_graph, table)?;
            write_graph(&pipeline, &graph, &output)?;

            println!("Wrote merged graph with {} triples to {}", graph.len(), output.display());
            println!(
                "rows: {} accepted, {} skipped",
                report.parse.rows_accepted,
                report.parse.rows_skipped()
            );
            println!(
                "pairs: {} linked, {} skipped ({} unresolved labels)",
                report.merge.pairs_linked,
                report.merge.pairs_skipped,
                report.merge.unresolved_old_labels.len()
            );
            println!(
                "entities: {} ({} minted), formedBy: {}, mergedInto: {}, facts: {}",
                report.merge.entities,
                report.merge.minted_entities,
                report.merge.formed_by_edges,
                report.merge.merged_into_edges,
                report.facts
            );
        }
        Command::Search { query, merged, k } => {
            let pipeline = load_pipeline(&config, &merged)?;
            for hit in pipeline.search(&query, k.unwrap_or(config.top_k))? {
                println!("{:>2}. [{:.4}] {}", hit.rank + 1, hit.score, hit.fact);
            }
        }
        Command::Ask {
            question,
            merged,
            k,
            all_facts,
            model,
        } => {
            if let Some(model) = model {
                config.llm_model = model;
            }
            let pipeline = load_pipeline(&config, &merged)?;
            let mode = if all_facts {
                ContextMode::AllFacts
            } else {
                ContextMode::Retrieval {
                    k: k.unwrap_or(config.top_k),
                }
            };
            let response = pipeline.ask(&question, mode)?;
            if response.answer.degraded {
                eprintln!("warning: language model unavailable; showing retrieved facts");
            }
            println!("{}", response.answer.text);
        }
    }

    Ok(())
}
