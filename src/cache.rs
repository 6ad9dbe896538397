//! Local record of every PRID the crawler has attempted.
//!
//! Three key spaces, one per outcome. Writing one outcome does not clear the
//! others; each write is stamped with a sequence number and lookups return
//! the most recently written record across all three.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
    Empty,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Success, Outcome::Error, Outcome::Empty];

    fn table(self) -> &'static str {
        match self {
            Outcome::Success => "cache_success",
            Outcome::Error => "cache_error",
            Outcome::Empty => "cache_empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRecord {
    /// Raw fetched document.
    Success(String),
    Error,
    Empty,
}

impl CacheRecord {
    pub fn outcome(&self) -> Outcome {
        match self {
            CacheRecord::Success(_) => Outcome::Success,
            CacheRecord::Error => Outcome::Error,
            CacheRecord::Empty => Outcome::Empty,
        }
    }
}

pub struct CrawlCache {
    conn: Connection,
    seq: i64,
}

impl CrawlCache {
    /// Opens `<prefix>.cache.sqlite`.
    pub fn open(prefix: &str) -> Result<Self, CacheError> {
        let conn = Connection::open(format!("{}.cache.sqlite", prefix))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache_success (
                id       INTEGER PRIMARY KEY,
                content  TEXT NOT NULL,
                seq      INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cache_error (
                id   INTEGER PRIMARY KEY,
                seq  INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cache_empty (
                id   INTEGER PRIMARY KEY,
                seq  INTEGER NOT NULL
            );
            ",
        )?;
        let seq = conn.query_row(
            "SELECT MAX(
                 (SELECT COALESCE(MAX(seq), 0) FROM cache_success),
                 (SELECT COALESCE(MAX(seq), 0) FROM cache_error),
                 (SELECT COALESCE(MAX(seq), 0) FROM cache_empty))",
            [],
            |r| r.get(0),
        )?;
        Ok(CrawlCache { conn, seq })
    }

    /// Whether any outcome has ever been recorded for `id`.
    pub fn is_attempted(&self, id: i64) -> Result<bool, CacheError> {
        Ok(self.latest(id)?.is_some())
    }

    pub fn outcome(&self, id: i64) -> Result<Option<Outcome>, CacheError> {
        Ok(self.latest(id)?.map(|(outcome, _)| outcome))
    }

    /// The most recently written record for `id`, payload included.
    pub fn lookup(&self, id: i64) -> Result<Option<CacheRecord>, CacheError> {
        match self.latest(id)? {
            None => Ok(None),
            Some((Outcome::Error, _)) => Ok(Some(CacheRecord::Error)),
            Some((Outcome::Empty, _)) => Ok(Some(CacheRecord::Empty)),
            Some((Outcome::Success, _)) => {
                let content: String = self.conn.query_row(
                    "SELECT content FROM cache_success WHERE id = ?1",
                    [id],
                    |r| r.get(0),
                )?;
                Ok(Some(CacheRecord::Success(content)))
            }
        }
    }

    /// The fetched document for `id`, if one was ever stored, regardless of
    /// any error or empty outcome recorded after it.
    pub fn payload(&self, id: i64) -> Result<Option<String>, CacheError> {
        Ok(self
            .conn
            .query_row(
                "SELECT content FROM cache_success WHERE id = ?1",
                [id],
                |r| r.get(0),
            )
            .optional()?)
    }

    /// Written and committed immediately: the cache must be ahead of any checkpoint.
    pub fn record(&mut self, id: i64, record: &CacheRecord) -> Result<(), CacheError> {
        self.seq += 1;
        match record {
            CacheRecord::Success(content) => self.conn.execute(
                "INSERT OR REPLACE INTO cache_success (id, content, seq) VALUES (?1, ?2, ?3)",
                params![id, content, self.seq],
            )?,
            other => self.conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, seq) VALUES (?1, ?2)",
                    other.outcome().table()
                ),
                params![id, self.seq],
            )?,
        };
        Ok(())
    }

    /// Number of IDs per partition (an ID may be counted in more than one).
    pub fn counts(&self) -> Result<[(Outcome, usize); 3], CacheError> {
        let mut counts = Outcome::ALL.map(|o| (o, 0usize));
        for (outcome, n) in counts.iter_mut() {
            *n = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", outcome.table()),
                [],
                |r| r.get(0),
            )?;
        }
        Ok(counts)
    }

    fn latest(&self, id: i64) -> Result<Option<(Outcome, i64)>, CacheError> {
        let mut best: Option<(Outcome, i64)> = None;
        for outcome in Outcome::ALL {
            let seq: Option<i64> = self
                .conn
                .query_row(
                    &format!("SELECT seq FROM {} WHERE id = ?1", outcome.table()),
                    [id],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(seq) = seq {
                if best.map_or(true, |(_, b)| seq > b) {
                    best = Some((outcome, seq));
                }
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id() {
        let cache = CrawlCache::open_in_memory().unwrap();
        assert!(!cache.is_attempted(1).unwrap());
        assert_eq!(cache.outcome(1).unwrap(), None);
        assert_eq!(cache.lookup(1).unwrap(), None);
    }

    #[test]
    fn success_after_error_wins() {
        let mut cache = CrawlCache::open_in_memory().unwrap();
        cache.record(42, &CacheRecord::Error).unwrap();
        cache.record(42, &CacheRecord::Success("<html/>".into())).unwrap();
        assert_eq!(cache.outcome(42).unwrap(), Some(Outcome::Success));
        assert_eq!(
            cache.lookup(42).unwrap(),
            Some(CacheRecord::Success("<html/>".into()))
        );
    }

    #[test]
    fn error_after_success_wins_but_keeps_payload_partition() {
        let mut cache = CrawlCache::open_in_memory().unwrap();
        cache.record(7, &CacheRecord::Success("doc".into())).unwrap();
        cache.record(7, &CacheRecord::Error).unwrap();
        assert_eq!(cache.outcome(7).unwrap(), Some(Outcome::Error));
        let counts = cache.counts().unwrap();
        assert_eq!(counts[0], (Outcome::Success, 1));
        assert_eq!(counts[1], (Outcome::Error, 1));
        assert_eq!(cache.lookup(7).unwrap(), Some(CacheRecord::Error));
        assert_eq!(cache.payload(7).unwrap().as_deref(), Some("doc"));
        assert_eq!(cache.payload(8).unwrap(), None);
    }

    #[test]
    fn sequence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("crawl");
        let prefix = prefix.to_str().unwrap();
        {
            let mut cache = CrawlCache::open(prefix).unwrap();
            cache.record(1, &CacheRecord::Empty).unwrap();
        }
        let mut cache = CrawlCache::open(prefix).unwrap();
        assert_eq!(cache.outcome(1).unwrap(), Some(Outcome::Empty));
        cache.record(1, &CacheRecord::Success("later".into())).unwrap();
        assert_eq!(cache.outcome(1).unwrap(), Some(Outcome::Success));
    }
}
