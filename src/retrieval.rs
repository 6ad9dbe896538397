use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db;
use crate::errlog::ErrorLog;
use crate::error::PersistenceError;

/// Nearest-neighbour lookup for a translated entry: candidates ranked best first.
pub trait Retriever {
    fn retrieve(&self, query_id: i64) -> Result<Vec<(i64, f64)>>;
}

#[derive(Deserialize)]
struct NeighbourLine {
    query_id: i64,
    candidates: Vec<(i64, f64)>,
}

/// Precomputed neighbours, one JSON object per line:
/// `{"query_id": 1, "candidates": [[2, 0.93], [5, 0.71]]}`.
pub struct NeighbourFile {
    neighbours: HashMap<i64, Vec<(i64, f64)>>,
}

impl NeighbourFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let mut neighbours = HashMap::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: NeighbourLine = serde_json::from_str(&line)
                .with_context(|| format!("{:?}:{}: bad neighbour line", path, n + 1))?;
            neighbours.insert(parsed.query_id, parsed.candidates);
        }
        Ok(NeighbourFile { neighbours })
    }
}

impl Retriever for NeighbourFile {
    fn retrieve(&self, query_id: i64) -> Result<Vec<(i64, f64)>> {
        self.neighbours
            .get(&query_id)
            .cloned()
            .ok_or_else(|| anyhow!("no neighbours for {}", query_id))
    }
}

pub struct RetrievalOptions {
    pub model: String,
    /// Only queries whose entry language is listed; empty means all.
    pub langs: Vec<String>,
    /// Only translations into this language; `None` means any.
    pub pivot_lang: Option<String>,
    pub force_redo: bool,
    /// Skip this many queries from the start of the list.
    pub resume_from: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RetrievalStats {
    pub queries: usize,
    pub stored: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// For every translated entry, store the top-ranked candidate as its retrieval.
/// Per-query failures go to the error log; storage going away aborts.
pub fn store_retrieved(
    conn: &Connection,
    retriever: &dyn Retriever,
    opts: &RetrievalOptions,
    errors: &mut ErrorLog,
) -> Result<RetrievalStats> {
    let pivot = opts.pivot_lang.as_deref();
    let queries: Vec<i64> = db::translated_queries(conn, &opts.model, pivot)?
        .into_iter()
        .filter(|(_, lang)| opts.langs.is_empty() || opts.langs.iter().any(|l| l == lang))
        .map(|(id, _)| id)
        .collect();
    info!(model = %opts.model, queries = queries.len(), "Storing retrievals");

    let mut stats = RetrievalStats {
        queries: queries.len(),
        ..Default::default()
    };

    for &query_id in queries.iter().skip(opts.resume_from) {
        if !opts.force_redo && db::retrieval_exists(conn, query_id, &opts.model)? {
            stats.skipped += 1;
            continue;
        }

        let ranked = match retriever.retrieve(query_id) {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!(query_id, "retrieval failed: {:#}", e);
                errors.append(query_id)?;
                stats.errors += 1;
                continue;
            }
        };
        let Some(&(retrieved_id, score)) = ranked.first() else {
            debug!(query_id, "no candidates");
            stats.skipped += 1;
            continue;
        };

        match db::upsert_retrieval(conn, query_id, &opts.model, retrieved_id, score) {
            Ok(()) => stats.stored += 1,
            Err(PersistenceError::Constraint(msg)) => {
                warn!(query_id, retrieved_id, "retrieval write rejected: {}", msg);
                errors.append(query_id)?;
                stats.errors += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(stats)
}
