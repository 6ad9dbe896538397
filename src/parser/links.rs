use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;

static OTHER_LANGS_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.ReleaseLang a[href]").unwrap());

/// Same-story releases in other languages: display label → PRID taken from
/// the anchor's `...?PRID=<id>` target. No "other languages" block means no links.
pub fn extract(document: &Html) -> BTreeMap<String, String> {
    let mut links = BTreeMap::new();
    for a in document.select(&OTHER_LANGS_SEL) {
        let label = a.text().collect::<String>().trim().to_string();
        let href = a.value().attr("href").unwrap_or_default();
        match href.rsplit_once('=').map(|(_, id)| id.trim()) {
            Some(id) if !label.is_empty() && !id.is_empty() => {
                links.insert(label, id.to_string());
            }
            _ => debug!(href, label = %label, "skipping language anchor"),
        }
    }
    links
}
