use ctxsearch::agent::ContextSearchAgent;
use ctxsearch::chunking::{Chunker, Document};
use ctxsearch::cli::{Cli, Commands, ConfigAction};
use ctxsearch::config::{Config, ConfigValidator};
use ctxsearch::error::{CtxSearchError, Result};
use ctxsearch::retrieval::{ContextSearcher, RetrievalMode, SearchRequest};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Chunk { file, mode, size } => {
            cmd_chunk(&file, &mode, size)?;
        }
        Commands::Search {
            query,
            corpus,
            mode,
            top_k,
            no_rerank,
            json,
        } => {
            let config = Config::resolve(cli.config.as_deref(), cli.profile.as_deref())?;
            cmd_search(&config, &query, corpus, mode, top_k, no_rerank, json)?;
        }
        Commands::Ask {
            question,
            corpus,
            mode,
            top_k,
        } => {
            let config = Config::resolve(cli.config.as_deref(), cli.profile.as_deref())?;
            cmd_ask(&config, &question, corpus, mode, top_k)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "ctxsearch=debug"
    } else {
        "ctxsearch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_chunk(file: &Path, mode: &str, size: usize) -> Result<()> {
    let chunker = Chunker::from_config(mode, size)?;
    let document = Document::from_path(file).map_err(|e| CtxSearchError::Io {
        source: e,
        context: format!("Failed to read document: {:?}", file),
    })?;

    let chunks = chunker.chunk(&document);
    for chunk in &chunks {
        println!("[{}] {}", chunk.index(), chunk.text());
    }

    tracing::info!(
        "{} chunks from '{}' ({} / {})",
        chunks.len(),
        document.name(),
        chunker.mode(),
        chunker.size()
    );
    Ok(())
}

fn parse_mode(mode: Option<String>, config: &Config) -> Result<RetrievalMode> {
    match mode {
        Some(mode) => mode
            .parse()
            .map_err(|message| CtxSearchError::InvalidConfigValue {
                path: "--mode".to_string(),
                message,
            }),
        None => config.retrieval_mode(),
    }
}

/// Build a searcher for `mode` and ingest the corpus into that index
fn prepare_searcher(
    config: &Config,
    corpus: Option<PathBuf>,
    mode: RetrievalMode,
    rerank: bool,
) -> Result<ContextSearcher> {
    let searcher = ContextSearcher::from_config(config, &[mode], rerank)?;
    let corpus = corpus.unwrap_or_else(|| config.corpus.directory.clone());

    let report = searcher.ingest_dir(&corpus, &config.corpus.extensions, &[mode])?;
    if report.documents == 0 {
        tracing::warn!("No documents ingested from {}", corpus.display());
    }

    Ok(searcher)
}

fn cmd_search(
    config: &Config,
    query: &str,
    corpus: Option<PathBuf>,
    mode: Option<String>,
    top_k: Option<usize>,
    no_rerank: bool,
    json: bool,
) -> Result<()> {
    let mode = parse_mode(mode, config)?;
    let rerank = config.retrieval.rerank && !no_rerank;
    let searcher = prepare_searcher(config, corpus, mode, rerank)?;

    let request = SearchRequest {
        query: query.to_string(),
        top_k: top_k.unwrap_or(config.retrieval.top_k),
        mode,
        rerank,
    };
    let results = searcher.search(&request)?;

    if json {
        let output = serde_json::to_string_pretty(&results).map_err(|e| CtxSearchError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {}",
            i + 1,
            result.score,
            result.source.as_deref().unwrap_or("-")
        );
        println!("   {}", result.chunk);
    }

    Ok(())
}

fn cmd_ask(
    config: &Config,
    question: &str,
    corpus: Option<PathBuf>,
    mode: Option<String>,
    top_k: Option<usize>,
) -> Result<()> {
    let mode = parse_mode(mode, config)?;
    let searcher = prepare_searcher(config, corpus, mode, config.retrieval.rerank)?;
    let agent = ContextSearchAgent::new(Arc::new(searcher));

    let message = serde_json::json!({
        "query": question,
        "method": mode.to_string(),
        "top_k": top_k.unwrap_or(config.retrieval.top_k),
    });

    println!("{}", agent.handle_message(&message.to_string()));
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::resolve(config_path.as_deref(), profile.as_deref())?;
            let output = toml::to_string_pretty(&config)?;
            println!("{}", output);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            ConfigValidator::validate(&config)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let mut config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}
