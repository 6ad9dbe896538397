use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Append-only list of PRIDs whose processing failed, one per line, for
/// manual replay.
pub struct ErrorLog {
    path: PathBuf,
    file: File,
}

impl ErrorLog {
    pub fn path_for(prefix: &str) -> PathBuf {
        PathBuf::from(format!("{}.errors.txt", prefix))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open error log {:?}", path))?;
        Ok(ErrorLog { path, file })
    }

    pub fn append(&mut self, id: i64) -> Result<()> {
        writeln!(self.file, "{}", id)
            .with_context(|| format!("Failed to append to {:?}", self.path))
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
pub fn read_ids(path: impl AsRef<Path>) -> Result<Vec<i64>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.trim().parse::<i64>().map_err(Into::into))
        .collect()
}
