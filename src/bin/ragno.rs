//! Ragno CLI — offline graph analytics over a triples file.
//!
//! Usage:
//!   ragno stats --triples graph.tsv
//!   ragno analyze --triples graph.tsv [--undirected]
//!   ragno communities --triples graph.tsv [--seed 42] [--min-size 3]
//!   ragno ppr --triples graph.tsv --entry <uri> [--entry <uri>] [--deep]
//!
//! The triples file holds one triple per line: subject and predicate are
//! whitespace-separated, the remainder of the line is the object.

use clap::{Parser, Subcommand};
use ragno::analytics::{analyze_structure, graph_stats, leiden_communities, LeidenConfig};
use ragno::ppr::{personalized_pagerank, PprOptions};
use ragno::rdf::Triple;
use ragno::{CancelToken, Graph, Uri};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragno", version, about = "Knowledge-graph retrieval engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print aggregate graph statistics
    Stats {
        /// Path to a whitespace-separated triples file
        #[arg(long)]
        triples: PathBuf,
        /// Mirror each edge in the adjacency structure
        #[arg(long)]
        undirected: bool,
    },
    /// Run the full structural suite (stats, k-core, components, betweenness)
    Analyze {
        #[arg(long)]
        triples: PathBuf,
        #[arg(long)]
        undirected: bool,
    },
    /// Detect communities with Leiden
    Communities {
        #[arg(long)]
        triples: PathBuf,
        /// PRNG seed for reproducible assignments
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Drop communities smaller than this
        #[arg(long, default_value_t = 3)]
        min_size: usize,
    },
    /// Rank nodes by personalized PageRank from entry points
    Ppr {
        #[arg(long)]
        triples: PathBuf,
        /// Entry-point URI (repeatable)
        #[arg(long = "entry", required = true)]
        entries: Vec<String>,
        /// Use the deep preset (10 iterations) instead of shallow
        #[arg(long)]
        deep: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli.command) {
        Ok(()) => 0,
        Err(message) => {
            eprintln!("error: {}", message);
            1
        }
    };
    std::process::exit(code);
}

fn run(command: Commands) -> Result<(), String> {
    let cancel = CancelToken::new();
    match command {
        Commands::Stats { triples, undirected } => {
            let graph = load_graph(&triples, undirected)?;
            print_json(&graph_stats(&graph))
        }
        Commands::Analyze { triples, undirected } => {
            let graph = load_graph(&triples, undirected)?;
            let analysis = analyze_structure(&graph, &cancel).map_err(|e| e.to_string())?;
            print_json(&analysis)
        }
        Commands::Communities {
            triples,
            seed,
            min_size,
        } => {
            let graph = load_graph(&triples, false)?;
            let config = LeidenConfig {
                seed,
                min_community_size: min_size,
                ..Default::default()
            };
            let result =
                leiden_communities(&graph, &config, &cancel).map_err(|e| e.to_string())?;
            print_json(&result)
        }
        Commands::Ppr {
            triples,
            entries,
            deep,
        } => {
            let graph = load_graph(&triples, true)?;
            let entry_points: Vec<Uri> = entries.into_iter().map(Uri::from).collect();
            let options = if deep {
                PprOptions::deep()
            } else {
                PprOptions::shallow()
            };
            let result = personalized_pagerank(&graph, &entry_points, &options, &cancel)
                .map_err(|e| e.to_string())?;
            print_json(&result)
        }
    }
}

fn load_graph(path: &PathBuf, undirected: bool) -> Result<Graph, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let triples = parse_triples(&text);
    if triples.is_empty() {
        return Err(format!("no triples found in {}", path.display()));
    }
    Ok(Graph::build(&triples, undirected))
}

/// One triple per line: `<subject> <predicate> <object...>`; the object may
/// contain spaces. Blank lines and `#` comments are skipped.
fn parse_triples(text: &str) -> Vec<Triple> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.splitn(3, char::is_whitespace);
            let subject = parts.next()?;
            let predicate = parts.next()?;
            let object = parts.next()?.trim();
            (!object.is_empty()).then(|| Triple::new(subject, predicate, object))
        })
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}
