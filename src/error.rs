use thiserror::Error;

/// Network retrieval of a single release failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("body is not valid UTF-8")]
    Decode,
}

/// The fetched document does not have the shape of a press release.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("content container div#PdfDiv not found")]
    MissingContent,
}

/// The release dateline did not match `<day> <MON> <year> <HH:MM><AM|PM> by PIB <place>`.
/// Never fatal: the entry is stored with a null date and place.
#[derive(Debug, Error)]
pub enum DateParseError {
    #[error("no dateline found")]
    NoMatch,
    #[error("invalid date {0:?}: {1}")]
    Invalid(String, chrono::ParseError),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref code, ref msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                PersistenceError::Constraint(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            other => PersistenceError::Unavailable(other),
        }
    }
}

/// The crawl cache cannot be read or written. Always fatal for a run.
#[derive(Debug, Error)]
#[error("crawl cache unavailable: {0}")]
pub struct CacheError(#[from] pub rusqlite::Error);

/// A failure isolated to one PRID.
#[derive(Debug, Error)]
#[error("PRID {id}: {kind}")]
pub struct ItemError {
    pub id: i64,
    pub kind: ItemErrorKind,
}

#[derive(Debug, Error)]
pub enum ItemErrorKind {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("persist failed: {0}")]
    Persist(#[from] PersistenceError),
}

impl ItemError {
    pub fn new(id: i64, kind: impl Into<ItemErrorKind>) -> Self {
        ItemError { id, kind: kind.into() }
    }
}
