pub mod content;
pub mod dateline;
pub mod lang;
pub mod links;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::db::Entry;
use crate::error::ParseError;

static CONTENT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#PdfDiv").unwrap());
static DATELINE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.ReleaseDateSubHeaddateTime").unwrap());
static MINISTRY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.MinistryNameSubhead").unwrap());

/// A parsed press release, ready to become an [`Entry`] plus its outgoing links.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: i64,
    pub lang: String,
    pub content: String,
    pub date: Option<NaiveDateTime>,
    pub place: Option<String>,
    pub ministry: Option<String>,
    /// Language label → linked PRID.
    pub links: BTreeMap<String, String>,
}

impl Article {
    pub fn entry(&self) -> Entry {
        Entry {
            id: self.id,
            lang: self.lang.clone(),
            date: self.date,
            content: self.content.clone(),
            place: self.place.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Article(Article),
    /// The release page exists but carries nothing beyond its "Posted On:" stub.
    Empty,
}

/// Pipeline: html → content block → cleaned text + language → dateline → links.
pub fn parse_article(id: i64, html: &str) -> Result<Parsed, ParseError> {
    let document = Html::parse_document(html);

    let container = document
        .select(&CONTENT_SEL)
        .next()
        .ok_or(ParseError::MissingContent)?;
    let raw = content::block_text(container);
    let raw = raw.trim();

    let cleaned = content::clean(raw);
    if content::is_empty_release(raw, &cleaned) {
        return Ok(Parsed::Empty);
    }

    let subhead = document
        .select(&DATELINE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().replace("\r\n", ""));
    let dateline = match &subhead {
        Some(text) => dateline::parse(text),
        None => dateline::find_in_lines(raw),
    };
    let (date, place) = match dateline {
        Ok(d) => (Some(d.date), Some(d.place)),
        Err(e) => {
            warn!(id, error = %e, "Failed on date-parse");
            (None, None)
        }
    };

    let ministry = document
        .select(&MINISTRY_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|m| !m.is_empty());

    let article = Article {
        id,
        lang: lang::identify(&cleaned),
        links: links::extract(&document),
        content: cleaned,
        date,
        place,
        ministry,
    };
    debug!(
        id,
        lang = %article.lang,
        ministry = article.ministry.as_deref().unwrap_or("-"),
        links = article.links.len(),
        "parsed"
    );
    Ok(Parsed::Article(article))
}

// ── Tests ──
