use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::cache::CrawlCache;
use crate::db;
use crate::parser::{self, Parsed};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReparseStats {
    pub updated: usize,
    pub empty: usize,
    pub failed: usize,
    pub not_cached: usize,
}

/// Corrective pass: re-parse every cached document in `[begin, end)` and
/// overwrite the stored entry with the result. Never touches the network.
pub fn reparse_range(
    conn: &Connection,
    cache: &CrawlCache,
    begin: i64,
    end: i64,
) -> Result<ReparseStats> {
    let mut stats = ReparseStats::default();
    for id in begin..end {
        let Some(html) = cache.payload(id)? else {
            stats.not_cached += 1;
            continue;
        };
        match parser::parse_article(id, &html) {
            Ok(Parsed::Article(article)) => {
                db::upsert_entry(conn, &article.entry())?;
                debug!(id, "{} exists in db; updating", id);
                stats.updated += 1;
            }
            Ok(Parsed::Empty) => stats.empty += 1,
            Err(e) => {
                warn!(id, "reparse failed: {}", e);
                stats.failed += 1;
            }
        }
    }
    Ok(stats)
}
