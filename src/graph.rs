use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::db;

/// Language label → linked PRID.
pub type LangLinks = BTreeMap<String, String>;

/// Cross-language adjacency of every attempted PRID, persisted wholesale as
/// one JSON object `{"<id>": {"<label>": "<linked id>"}}`. An ID present with
/// an empty map was attempted but yielded no release.
pub struct LinkGraph {
    path: PathBuf,
    adj: BTreeMap<i64, LangLinks>,
}

impl LinkGraph {
    pub fn snapshot_path(prefix: &str) -> PathBuf {
        PathBuf::from(format!("{}.save.adj.json", prefix))
    }

    /// Reads the snapshot at `path`, or starts empty if there is none.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let adj = if path.exists() {
            let file = File::open(&path).with_context(|| format!("Failed to open {:?}", path))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Corrupt adjacency snapshot {:?}", path))?
        } else {
            BTreeMap::new()
        };
        Ok(LinkGraph { path, adj })
    }

    pub fn has(&self, id: i64) -> bool {
        self.adj.contains_key(&id)
    }

    #[cfg(test)]
    pub fn get(&self, id: i64) -> Option<&LangLinks> {
        self.adj.get(&id)
    }

    pub fn set(&mut self, id: i64, links: LangLinks) {
        self.adj.insert(id, links);
    }

    pub fn len(&self) -> usize {
        self.adj.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &LangLinks)> {
        self.adj.iter()
    }

    /// Writes the whole map next to the snapshot and renames it into place,
    /// so a crash mid-save leaves the previous snapshot intact.
    pub fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp).with_context(|| format!("Failed to create {:?}", tmp))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &self.adj)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move snapshot into {:?}", self.path))?;
        Ok(())
    }
}

/// Copy the snapshot into the relational `link` table. Only pairs whose ends
/// are both stored entries are written; the two views are otherwise independent.
pub fn project_links(conn: &Connection, graph: &LinkGraph) -> Result<usize> {
    let mut pairs = Vec::new();
    for (&first, links) in graph.iter() {
        if links.is_empty() || !db::entry_exists(conn, first)? {
            continue;
        }
        for second in links.values().filter_map(|s| s.parse::<i64>().ok()) {
            if db::entry_exists(conn, second)? {
                pairs.push((first, second));
            }
        }
    }
    db::insert_links(conn, &pairs)
}
