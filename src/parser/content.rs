use scraper::{ElementRef, Node};

/// Lines containing any of these are release boilerplate, not article text.
pub const JUNK_MARKERS: &[&str] = &["Posted On:", "by PIB", "ID:", "/"];

/// What an unpublished release's content block reduces to.
pub const EMPTY_SENTINEL: &str = "Posted On:";

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "table", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
    "blockquote", "section",
];

/// Text of an element with a line break at every block boundary.
pub fn block_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        // Text following a closed block starts a new line too.
        let after_block = node
            .prev_sibling()
            .and_then(|s| s.value().as_element().map(|e| e.name()))
            .is_some_and(|name| BLOCK_TAGS.contains(&name));
        if after_block {
            text.push('\n');
        }
        match node.value() {
            Node::Text(t) => {
                let in_script = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|e| e.name()))
                    .is_some_and(|name| matches!(name, "script" | "style"));
                if !in_script {
                    text.push_str(t);
                }
            }
            Node::Element(e) if BLOCK_TAGS.contains(&e.name()) => text.push('\n'),
            _ => {}
        }
    }
    text
}

pub fn is_junk(line: &str) -> bool {
    JUNK_MARKERS.iter().any(|m| line.contains(m))
}

/// Drop blank lines and lines carrying a junk marker; keep the rest trimmed.
pub fn clean(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_junk(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn is_empty_release(raw: &str, cleaned: &str) -> bool {
    raw.trim() == EMPTY_SENTINEL || cleaned.is_empty()
}
