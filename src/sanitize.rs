use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::db;

/// Degenerate repetition some translation checkpoints emit instead of output,
/// in sentencepiece form.
pub const REPETITION_JUNK: &str = "▁An d ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁when ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁be ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁be ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁be ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁come ▁to ▁pass ▁ , ▁that ▁it ▁sha ll ▁be ▁ ,";

/// Remove [`REPETITION_JUNK`] from every `model` translation that contains it.
/// Returns the number of rows rewritten.
pub fn sanitize_translations(conn: &Connection, model: &str) -> Result<usize> {
    let rows = db::fetch_translations(conn, model)?;
    let mut cleaned = 0;
    for row in rows {
        let Some(text) = row.translated.as_deref() else {
            continue;
        };
        if text.contains(REPETITION_JUNK) {
            db::update_translation(conn, row.id, &text.replace(REPETITION_JUNK, ""))?;
            cleaned += 1;
            info!(id = row.id, parent_id = row.parent_id, "sanitized translation");
        }
    }
    Ok(cleaned)
}
