use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::error::PersistenceError;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entry (
            id       INTEGER PRIMARY KEY,
            lang     TEXT,
            date     TEXT,
            content  TEXT,
            place    TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_entry_date ON entry(date);

        -- Projection of the adjacency snapshot, filled by `project-links` only
        CREATE TABLE IF NOT EXISTS link (
            id         INTEGER PRIMARY KEY,
            first_id   INTEGER NOT NULL REFERENCES entry(id),
            second_id  INTEGER NOT NULL REFERENCES entry(id),
            UNIQUE(first_id, second_id)
        );

        CREATE TABLE IF NOT EXISTS translation (
            id          INTEGER PRIMARY KEY,
            parent_id   INTEGER NOT NULL REFERENCES entry(id),
            model       TEXT,
            lang        TEXT,
            translated  TEXT,
            UNIQUE(parent_id, model)
        );

        CREATE TABLE IF NOT EXISTS retrieval (
            id            INTEGER PRIMARY KEY,
            query_id      INTEGER NOT NULL REFERENCES entry(id),
            model         TEXT,
            retrieved_id  INTEGER NOT NULL REFERENCES entry(id),
            score         REAL,
            UNIQUE(query_id, model)
        );
        ",
    )?;
    Ok(())
}

// ── Entries ──

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: i64,
    pub lang: String,
    pub date: Option<NaiveDateTime>,
    pub content: String,
    pub place: Option<String>,
}

/// Durable entry store as seen by the ingestion loop. Writes are staged until
/// [`EntryStore::flush`]; a store dropped without flushing loses them.
pub trait EntryStore {
    fn contains(&self, id: i64) -> Result<bool, PersistenceError>;
    /// Insert-only: an existing entry is never overwritten. Returns whether a
    /// row was created.
    fn insert_if_absent(&mut self, entry: &Entry) -> Result<bool, PersistenceError>;
    fn flush(&mut self) -> Result<(), PersistenceError>;
}

pub struct SqliteStore {
    conn: Connection,
    in_tx: bool,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;
        Ok(SqliteStore { conn, in_tx: false })
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn begin(&mut self) -> Result<(), PersistenceError> {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN TRANSACTION")?;
            self.in_tx = true;
        }
        Ok(())
    }
}

impl EntryStore for SqliteStore {
    fn contains(&self, id: i64) -> Result<bool, PersistenceError> {
        Ok(entry_exists(&self.conn, id)?)
    }

    fn insert_if_absent(&mut self, entry: &Entry) -> Result<bool, PersistenceError> {
        self.begin()?;
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO entry (id, lang, date, content, place)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entry.id, entry.lang, entry.date, entry.content, entry.place],
        )?;
        Ok(n > 0)
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }
}

pub fn entry_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM entry WHERE id = ?1)", [id], |r| r.get(0))
}

#[cfg(test)]
pub fn get_entry(conn: &Connection, id: i64) -> Result<Option<Entry>> {
    use rusqlite::OptionalExtension;

    let entry = conn
        .query_row(
            "SELECT id, lang, date, content, place FROM entry WHERE id = ?1",
            [id],
            |row| {
                Ok(Entry {
                    id: row.get(0)?,
                    lang: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    date: row.get(2)?,
                    content: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    place: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

/// Corrective write: creates the entry or overwrites every field of it.
pub fn upsert_entry(conn: &Connection, entry: &Entry) -> Result<()> {
    conn.execute(
        "INSERT INTO entry (id, lang, date, content, place) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             lang = excluded.lang, date = excluded.date,
             content = excluded.content, place = excluded.place",
        params![entry.id, entry.lang, entry.date, entry.content, entry.place],
    )?;
    Ok(())
}

#[cfg(test)]
pub fn entry_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM entry ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Links ──

/// Insert (first, second) pairs, skipping ones already present. Returns the
/// number of new rows.
pub fn insert_links(conn: &Connection, pairs: &[(i64, i64)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO link (first_id, second_id) VALUES (?1, ?2)")?;
        for (first, second) in pairs {
            count += stmt.execute(params![first, second])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Translations ──

pub struct TranslationRow {
    pub id: i64,
    pub parent_id: i64,
    pub translated: Option<String>,
}

pub fn fetch_translations(conn: &Connection, model: &str) -> Result<Vec<TranslationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, translated FROM translation WHERE model = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([model], |row| {
            Ok(TranslationRow {
                id: row.get(0)?,
                parent_id: row.get(1)?,
                translated: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_translation(conn: &Connection, id: i64, translated: &str) -> Result<()> {
    conn.execute(
        "UPDATE translation SET translated = ?1 WHERE id = ?2",
        params![translated, id],
    )?;
    Ok(())
}

// ── Retrievals ──

/// Entries with a non-empty translation under `model`, with the entry's language.
/// `pivot_lang` restricts to translations into that language.
pub fn translated_queries(
    conn: &Connection,
    model: &str,
    pivot_lang: Option<&str>,
) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT t.parent_id, COALESCE(e.lang, '')
         FROM translation t
         JOIN entry e ON e.id = t.parent_id
         WHERE t.model = ?1 AND t.translated IS NOT NULL AND t.translated != ''
           AND (?2 IS NULL OR t.lang = ?2)
         ORDER BY t.id",
    )?;
    let rows = stmt
        .query_map(params![model, pivot_lang], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
pub fn insert_translation(
    conn: &Connection,
    parent_id: i64,
    model: &str,
    lang: &str,
    translated: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO translation (parent_id, model, lang, translated)
         VALUES (?1, ?2, ?3, ?4)",
        params![parent_id, model, lang, translated],
    )?;
    Ok(())
}

pub fn retrieval_exists(conn: &Connection, query_id: i64, model: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM retrieval WHERE query_id = ?1 AND model = ?2)",
        params![query_id, model],
        |r| r.get(0),
    )?)
}

/// One retrieval per (query, model); a later write replaces the earlier pick.
pub fn upsert_retrieval(
    conn: &Connection,
    query_id: i64,
    model: &str,
    retrieved_id: i64,
    score: f64,
) -> Result<(), PersistenceError> {
    conn.execute(
        "INSERT INTO retrieval (query_id, model, retrieved_id, score) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(query_id, model) DO UPDATE SET
             retrieved_id = excluded.retrieved_id, score = excluded.score",
        params![query_id, model, retrieved_id, score],
    )?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub entries: usize,
    pub links: usize,
    pub translations: usize,
    pub retrievals: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |table: &str| -> Result<usize> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
    };
    Ok(Stats {
        entries: count("entry")?,
        links: count("link")?,
        translations: count("translation")?,
        retrievals: count("retrieval")?,
    })
}
