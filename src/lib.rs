pub mod config;
pub mod extract;
pub mod indexer;
pub mod model;
pub mod pipeline;
pub mod search;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::Config;
use pipeline::CodeSearchPipeline;
use search::HashEmbedder;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "cims",
    version,
    about = "CIM-10 coding-manual extraction and hybrid code retrieval"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the lexical and semantic indexes from an extracted document
    Index {
        /// Extracted document JSON (pages of text and layout blocks)
        input: PathBuf,

        /// Override data dir (indexes + vector store). Defaults to platform data dir.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Rank code suggestions for a free-text clinical query
    Query {
        /// Free-text query (French clinical phrasing)
        text: String,

        /// Number of suggestions to return
        #[arg(long)]
        top_k: Option<usize>,

        /// Override data dir. Defaults to platform data dir.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Emit the full result as JSON instead of a human summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the stored record for one classification code
    Lookup {
        /// Code to resolve (e.g. A41 or J18.9)
        code: String,

        /// Override data dir. Defaults to platform data dir.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Index { input, data_dir } => {
            let data_dir = data_dir.unwrap_or_else(default_data_dir);
            let summary =
                indexer::run_index(&input, &data_dir, &config, &HashEmbedder::default())?;
            println!(
                "indexed {} records ({} semantic, {} skipped) in {} ms -> {}",
                summary.records,
                summary.indexed_semantic,
                summary.skipped_zero_vectors,
                summary.elapsed_ms,
                summary.index_path.display()
            );
            Ok(())
        }
        Commands::Query {
            text,
            top_k,
            data_dir,
            json,
        } => {
            let data_dir = data_dir.unwrap_or_else(default_data_dir);
            let mut config = config;
            if let Some(k) = top_k {
                config.top_k_rerank = k;
            }
            // No external reranking backend is wired into the binary yet;
            // library consumers pass their own through the pipeline.
            let pipeline = CodeSearchPipeline::open(
                &data_dir,
                config,
                Arc::new(HashEmbedder::default()),
                None,
            )?;
            let result = pipeline.suggest(&text)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_suggestions(&result);
            }
            Ok(())
        }
        Commands::Lookup { code, data_dir } => {
            let data_dir = data_dir.unwrap_or_else(default_data_dir);
            let pipeline = CodeSearchPipeline::open(
                &data_dir,
                config,
                Arc::new(HashEmbedder::default()),
                None,
            )?;
            match pipeline.lookup(&code)? {
                Some(hit) => {
                    // Prefer the structured summary over the raw source block.
                    match hit.metadata.get("summary").and_then(|v| v.as_str()) {
                        Some(summary) => println!("{summary}"),
                        None => println!("{}", hit.text),
                    }
                    Ok(())
                }
                None => anyhow::bail!("no record for code {code}"),
            }
        }
    }
}

fn print_suggestions(result: &model::QueryResult) {
    if result.suggestions.is_empty() {
        println!("no suggestions for \"{}\"", result.query);
        return;
    }
    for (rank, s) in result.suggestions.iter().enumerate() {
        println!("{}. {} — {} [{:.3}]", rank + 1, s.code, s.label, s.relevance_score);
        if let Some(chapter) = &s.chapter {
            println!("   {chapter}");
        }
        for exclusion in &s.exclusions {
            println!("   À l'exclusion de : {exclusion}");
        }
    }
    println!(
        "({} suggestions in {:.1} ms)",
        result.suggestions.len(),
        result.processing_time_ms
    );
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "cim-code-search", "cims")
        .expect("project dirs available")
        .data_dir()
        .to_path_buf()
}
