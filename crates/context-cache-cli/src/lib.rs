//! Command-line entry point for Context Cache.
//!
//! Mirrors the teacher crate's `Cli`/`Commands` clap shape: a top-level
//! struct carrying an optional subcommand, with `run()` returning a process
//! exit code rather than panicking.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use context_cache_core::models::SourceTag;
use context_cache_core::Config;
use context_cache_db::Store;
use context_cache_ingest::{note_indexer, ForeignDbSource, JsonlSource};
use context_cache_search::{Embedder, StaticEmbedder};

#[derive(Parser, Debug)]
#[command(name = "ctxcache", version, about = "Context Cache: a personal memory engine for AI coding agents")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all but error-level logging.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the store file. Defaults to the platform data directory.
    #[arg(long, global = true)]
    pub store_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the store against a tree of Markdown notes.
    Index {
        /// Root of the note tree. Defaults to the configured notes root.
        root: Option<PathBuf>,
        #[arg(long)]
        chunk_len: Option<usize>,
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Reconcile the store against a captured-conversation source.
    IndexConversations {
        /// `claude_code`, `zed`, `opencode`, or a custom tag.
        #[arg(long, default_value = "claude_code")]
        source_tag: String,
        /// Root directory of `.jsonl` archives (line-delimited adapter).
        #[arg(long, conflicts_with = "foreign_db")]
        archive_root: Option<PathBuf>,
        /// Path to a foreign `session`/`message`/`part` SQLite database.
        #[arg(long, conflicts_with = "archive_root")]
        foreign_db: Option<PathBuf>,
        /// Skip embedding exchanges (lexical-only conversation search).
        #[arg(long)]
        no_embed: bool,
    },
    /// Hybrid lexical + vector search over indexed Markdown fragments.
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Substring search over captured conversation exchanges.
    Conversations {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long)]
        after: Option<String>,
        #[arg(long)]
        before: Option<String>,
    },
    /// Render a captured conversation archive as Markdown.
    Show {
        path: PathBuf,
        #[arg(long)]
        start_exchange: Option<usize>,
        #[arg(long)]
        end_exchange: Option<usize>,
    },
    /// Print counts of indexed files, fragments, conversations, exchanges.
    Stats,
    /// Wipe the store back to empty.
    Reset,
    /// Run the newline-delimited JSON protocol server over stdio.
    Serve,
}

/// Runs the CLI and returns a process exit code, the way the teacher
/// crate's `run()` does.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mut config = Config::from_env();
    if let Some(store_path) = &cli.store_path {
        config.store_path = store_path.clone();
    }

    match execute(cli.command, &config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("store error: {0}")]
    Store(#[from] context_cache_db::DbError),
    #[error("search error: {0}")]
    Search(#[from] context_cache_search::SearchError),
    #[error("ingest error: {0}")]
    Ingest(#[from] context_cache_ingest::IngestError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn execute(command: Commands, config: &Config) -> Result<(), CliError> {
    match command {
        Commands::Index {
            root,
            chunk_len,
            chunk_overlap,
        } => cmd_index(config, root, chunk_len, chunk_overlap),
        Commands::IndexConversations {
            source_tag,
            archive_root,
            foreign_db,
            no_embed,
        } => cmd_index_conversations(config, &source_tag, archive_root, foreign_db, no_embed),
        Commands::Search { query, limit } => cmd_search(config, &query, limit),
        Commands::Conversations {
            query,
            limit,
            after,
            before,
        } => cmd_conversations(config, &query, limit, after, before),
        Commands::Show {
            path,
            start_exchange,
            end_exchange,
        } => cmd_show(&path, start_exchange, end_exchange),
        Commands::Stats => cmd_stats(config),
        Commands::Reset => cmd_reset(config),
        Commands::Serve => cmd_serve(config),
    }
}

fn open_store(config: &Config) -> Result<Store, CliError> {
    Store::open(&config.store_path).map_err(CliError::from)
}

fn build_embedder(config: &Config) -> Box<dyn Embedder> {
    #[cfg(feature = "fastembed-backend")]
    {
        if config.embedding_model.contains("MiniLM") || config.embedding_model.contains("minilm") {
            if let Ok(embedder) = context_cache_search::FastEmbedEmbedder::load_minilm() {
                return Box::new(embedder);
            }
            tracing::warn!("failed to load fastembed model, falling back to static embedder");
        }
    }
    Box::new(StaticEmbedder::new(config.embedding_dim))
}

fn cmd_index(
    config: &Config,
    root: Option<PathBuf>,
    chunk_len: Option<usize>,
    chunk_overlap: Option<usize>,
) -> Result<(), CliError> {
    let root = root.unwrap_or_else(|| config.notes_root.clone());
    let mut store = open_store(config)?;
    let embedder = build_embedder(config);
    let summary = note_indexer::run(
        &mut store,
        &root,
        embedder.as_ref(),
        chunk_len.unwrap_or(config.chunk_len),
        chunk_overlap.unwrap_or(config.chunk_overlap),
    )?;
    println!(
        "processed {} files: {} added, {} updated, {} skipped, {} deleted, {} fragments written",
        summary.processed, summary.added, summary.updated, summary.skipped, summary.deleted, summary.new_units
    );
    for err in &summary.errors {
        eprintln!("warning: {err}");
    }
    Ok(())
}

fn cmd_index_conversations(
    config: &Config,
    source_tag: &str,
    archive_root: Option<PathBuf>,
    foreign_db: Option<PathBuf>,
    no_embed: bool,
) -> Result<(), CliError> {
    let tag = SourceTag::from(source_tag);
    let mut store = open_store(config)?;
    let embedder = build_embedder(config);
    let embedder_ref: Option<&dyn Embedder> = if no_embed { None } else { Some(embedder.as_ref()) };

    let summary = if let Some(db_path) = foreign_db {
        let source = ForeignDbSource::new(db_path, tag);
        context_cache_ingest::conversation_indexer::run(&mut store, &source, embedder_ref)?
    } else if let Some(root) = archive_root {
        let source = JsonlSource::new(root, tag);
        context_cache_ingest::conversation_indexer::run(&mut store, &source, embedder_ref)?
    } else {
        return Err(CliError::InvalidArgument(
            "one of --archive-root or --foreign-db is required".to_string(),
        ));
    };

    println!(
        "processed {} conversations: {} added, {} updated, {} skipped, {} deleted, {} exchanges written",
        summary.processed, summary.added, summary.updated, summary.skipped, summary.deleted, summary.new_units
    );
    for err in &summary.errors {
        eprintln!("warning: {err}");
    }
    Ok(())
}

fn cmd_search(config: &Config, query: &str, limit: Option<usize>) -> Result<(), CliError> {
    let store = open_store(config)?;
    let embedder = build_embedder(config);
    let vector = embedder.embed(query)?;
    let hits = context_cache_search::search_kb(
        store.connection(),
        query,
        &vector,
        limit.unwrap_or(config.default_limit),
        config.rrf_k,
    )?;
    if hits.is_empty() {
        println!("no results");
        return Ok(());
    }
    for hit in hits {
        println!("{:.4}  {}#{}", hit.score, hit.source_path, hit.position);
        println!("    {}", truncate(&hit.text, 160));
    }
    Ok(())
}

fn cmd_conversations(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    after: Option<String>,
    before: Option<String>,
) -> Result<(), CliError> {
    let store = open_store(config)?;
    let after = parse_date_bound(after)?;
    let before = parse_date_bound(before)?;
    let hits = context_cache_search::search_conversations(
        store.connection(),
        query,
        after,
        before,
        limit.unwrap_or(config.default_limit),
    )?;
    if hits.is_empty() {
        println!("no results");
        return Ok(());
    }
    for hit in hits {
        println!(
            "{} [{}] {} #{}",
            hit.timestamp, hit.source_tag, hit.conversation_id, hit.position
        );
        println!("    user: {}", truncate(&hit.user_text, 120));
        println!("    assistant: {}", truncate(&hit.assistant_text, 120));
    }
    Ok(())
}

fn cmd_show(
    path: &std::path::Path,
    start_exchange: Option<usize>,
    end_exchange: Option<usize>,
) -> Result<(), CliError> {
    println!("{}", context_cache_search::display::render(path, start_exchange, end_exchange));
    Ok(())
}

fn cmd_stats(config: &Config) -> Result<(), CliError> {
    let store = open_store(config)?;
    let conn = store.connection();
    let counts = [
        ("files", "SELECT COUNT(*) FROM files"),
        ("fragments", "SELECT COUNT(*) FROM fragments"),
        ("conversations", "SELECT COUNT(*) FROM conversations"),
        ("exchanges", "SELECT COUNT(*) FROM exchanges"),
    ];
    for (label, sql) in counts {
        let count: i64 = conn.query_row(sql, [], |r| r.get(0))?;
        println!("{label}: {count}");
    }
    Ok(())
}

fn cmd_reset(config: &Config) -> Result<(), CliError> {
    let mut store = open_store(config)?;
    store.reset()?;
    println!("store reset");
    Ok(())
}

fn cmd_serve(config: &Config) -> Result<(), CliError> {
    let store = open_store(config)?;
    let embedder = build_embedder(config);
    let mut server = context_cache_server::Server::new(store, embedder, config.clone());
    server.run_stdio()?;
    Ok(())
}

fn parse_date_bound(value: Option<String>) -> Result<Option<chrono::NaiveDateTime>, CliError> {
    match value {
        None => Ok(None),
        Some(s) => chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| {
                chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
            })
            .map(Some)
            .map_err(|e| CliError::InvalidArgument(format!("invalid date {s}: {e}"))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let truncated: String = collapsed.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_search_subcommand() {
        let cli = Cli::parse_from(["ctxcache", "search", "hello world", "--limit", "3"]);
        match cli.command {
            Commands::Search { query, limit } => {
                assert_eq!(query, "hello world");
                assert_eq!(limit, Some(3));
            }
            other => panic!("expected Search, got {other:?}"),
        }
    }

    #[test]
    fn cli_requires_archive_source_for_conversation_indexing() {
        let config = Config {
            store_path: std::env::temp_dir().join("context-cache-cli-test.db"),
            ..Config::default()
        };
        let result = cmd_index_conversations(&config, "claude_code", None, None, true);
        assert!(result.is_err());
    }

    #[test]
    fn truncate_collapses_whitespace_and_clips() {
        assert_eq!(truncate("a   b\nc", 10), "a b c");
        assert_eq!(truncate(&"x".repeat(200), 5), "xxxxx…");
    }
}
