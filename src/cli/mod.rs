//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ctxsearch",
    version,
    about = "Lexical and semantic document search with cross-encoder reranking",
    long_about = "ctxsearch chunks a directory of documents into a BM25 index or an embedding \
                  index, retrieves candidates for a query from one of them, and reorders the \
                  candidates with a cross-encoder before returning the top results."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/ctxsearch/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the chunks a document is split into
    Chunk {
        /// Document to split
        file: PathBuf,

        /// Chunking mode: sentence, paragraph or word
        #[arg(short, long, default_value = "sentence")]
        mode: String,

        /// Sentences or words per chunk (ignored for paragraphs)
        #[arg(short, long, default_value = "1")]
        size: usize,
    },

    /// Ingest a corpus and search it
    Search {
        /// Search query text
        query: String,

        /// Corpus directory (defaults to corpus.directory)
        #[arg(long, value_name = "DIR")]
        corpus: Option<PathBuf>,

        /// Retrieval mode: lexical (bm25) or semantic (embedding)
        #[arg(short, long)]
        mode: Option<String>,

        /// Maximum number of results to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Return candidates in index order without reranking
        #[arg(long)]
        no_rerank: bool,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Ask a question and print the agent's reply
    Ask {
        /// Question to ask
        question: String,

        /// Corpus directory (defaults to corpus.directory)
        #[arg(long, value_name = "DIR")]
        corpus: Option<PathBuf>,

        /// Retrieval mode: lexical (bm25) or semantic (embedding)
        #[arg(short, long)]
        mode: Option<String>,

        /// Number of context chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_flags() {
        let cli = Cli::try_parse_from([
            "ctxsearch",
            "search",
            "boils water",
            "--mode",
            "bm25",
            "-k",
            "3",
            "--no-rerank",
            "--profile",
            "fast",
        ])
        .unwrap();

        assert_eq!(cli.profile.as_deref(), Some("fast"));
        match cli.command {
            Commands::Search {
                query,
                mode,
                top_k,
                no_rerank,
                json,
                ..
            } => {
                assert_eq!(query, "boils water");
                assert_eq!(mode.as_deref(), Some("bm25"));
                assert_eq!(top_k, Some(3));
                assert!(no_rerank);
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
