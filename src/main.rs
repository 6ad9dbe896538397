mod cache;
mod config;
mod db;
mod errlog;
mod error;
mod fetcher;
mod graph;
mod ingest;
mod parser;
mod reparse;
mod resume;
mod retrieval;
mod sanitize;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cache::CrawlCache;
use crate::config::Settings;
use crate::errlog::ErrorLog;
use crate::fetcher::HttpFetcher;
use crate::graph::LinkGraph;
use crate::ingest::{IngestOptions, Ingestor};

#[derive(Parser)]
#[command(name = "pib", about = "Incremental PIB press release ingestion")]
struct Cli {
    /// SQLite entry store (default: $PIB_DB_PATH or data/pib.sqlite)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and store releases with PRID in [begin, end)
    Crawl {
        /// Prefix for the crawl cache, adjacency snapshot and error log
        #[arg(long)]
        path: String,
        #[arg(long)]
        begin: i64,
        #[arg(long)]
        end: i64,
        /// Ignore if already exists anywhere
        #[arg(long)]
        force_redo: bool,
        /// IDs between commits (default: $PIB_COMMIT_INTERVAL or 1000)
        #[arg(long)]
        commit_interval: Option<usize>,
    },
    /// Re-parse cached documents in [begin, end) and overwrite stored entries
    Reparse {
        #[arg(long)]
        path: String,
        #[arg(long)]
        begin: i64,
        #[arg(long)]
        end: i64,
    },
    /// Store the top neighbour of every translated entry as its retrieval
    StoreNeighbours {
        /// Translation model the neighbours were computed with
        #[arg(long)]
        model: String,
        /// JSON lines of {"query_id": .., "candidates": [[id, score], ..]}
        #[arg(long)]
        neighbours: PathBuf,
        /// Restrict to entries in these languages (comma separated)
        #[arg(long, value_delimiter = ',')]
        langs: Vec<String>,
        /// Only translations into this language
        #[arg(long)]
        pivot_lang: Option<String>,
        #[arg(long)]
        force_redo: bool,
        #[arg(long, default_value = "0")]
        resume_from: usize,
        #[arg(long, default_value = "retrieval_error.txt")]
        error_log: PathBuf,
    },
    /// Strip repetition junk from a model's translations
    Sanitize {
        #[arg(long)]
        model: String,
    },
    /// Copy the adjacency snapshot into the link table
    ProjectLinks {
        #[arg(long)]
        path: String,
    },
    /// Show store, cache and snapshot counts
    Stats {
        #[arg(long)]
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let db_path = cli.db.clone().unwrap_or_else(|| settings.db_path.clone());

    let result = match cli.command {
        Commands::Crawl {
            path,
            begin,
            end,
            force_redo,
            commit_interval,
        } => {
            let store = db::SqliteStore::new(db::connect(&db_path)?)?;
            let fetcher = HttpFetcher::new(
                &settings.base_url,
                Duration::from_secs(settings.timeout_secs),
            )?;
            let opts = IngestOptions {
                force_redo,
                commit_interval: commit_interval.unwrap_or(settings.commit_interval),
                progress: true,
            };
            let mut ingestor = Ingestor::new(
                store,
                fetcher,
                CrawlCache::open(&path)?,
                LinkGraph::load(LinkGraph::snapshot_path(&path))?,
                ErrorLog::open(ErrorLog::path_for(&path))?,
                opts,
            );
            let s = ingestor.run(begin, end)?;
            println!(
                "Crawled [{}, {}) from {}: {} created, {} empty, {} skipped, {} errors \
                 ({} fetched, {} from cache, {} checkpoints).",
                begin, end, s.start, s.created, s.empty, s.skipped, s.errors,
                s.fetched, s.from_cache, s.checkpoints,
            );
            if s.errors > 0 {
                println!("Failed IDs appended to {:?}", ErrorLog::path_for(&path));
            }
            Ok(())
        }
        Commands::Reparse { path, begin, end } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let cache = CrawlCache::open(&path)?;
            let s = reparse::reparse_range(&conn, &cache, begin, end)?;
            println!(
                "Updated {} entries ({} empty, {} failed, {} not cached).",
                s.updated, s.empty, s.failed, s.not_cached
            );
            Ok(())
        }
        Commands::StoreNeighbours {
            model,
            neighbours,
            langs,
            pivot_lang,
            force_redo,
            resume_from,
            error_log,
        } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let retriever = retrieval::NeighbourFile::load(&neighbours)?;
            let mut errors = ErrorLog::open(&error_log)?;
            let opts = retrieval::RetrievalOptions {
                model,
                langs,
                pivot_lang,
                force_redo,
                resume_from,
            };
            let s = retrieval::store_retrieved(&conn, &retriever, &opts, &mut errors)?;
            println!(
                "{} queries: {} stored, {} skipped, {} errors.",
                s.queries, s.stored, s.skipped, s.errors
            );
            Ok(())
        }
        Commands::Sanitize { model } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let n = sanitize::sanitize_translations(&conn, &model)?;
            println!("Sanitized {} translations for model {}.", n, model);
            Ok(())
        }
        Commands::ProjectLinks { path } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let graph = LinkGraph::load(LinkGraph::snapshot_path(&path))?;
            let n = graph::project_links(&conn, &graph)?;
            println!("Inserted {} new links from {} snapshot nodes.", n, graph.len());
            Ok(())
        }
        Commands::Stats { path } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            let cache = CrawlCache::open(&path)?;
            let graph = LinkGraph::load(LinkGraph::snapshot_path(&path))?;
            println!("Entries:      {}", s.entries);
            println!("Links:        {}", s.links);
            println!("Translations: {}", s.translations);
            println!("Retrievals:   {}", s.retrievals);
            println!("Snapshot IDs: {}", graph.len());
            for (outcome, n) in cache.counts()? {
                println!("Cache {:<7} {}", format!("{:?}:", outcome), n);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
