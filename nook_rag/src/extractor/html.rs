//! HTML text extraction: parse the DOM, skip `<script>`/`<style>`, add
//! newlines after block-level elements (spec.md §4.1).

use std::path::Path;

use scraper::{Html, Selector};

use super::Extractor;
use crate::error::Result;

pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let raw = std::fs::read_to_string(path)?;
        Ok(extract_text(&raw))
    }

    fn mime_type(&self) -> &'static str {
        "text/html"
    }
}

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "section", "article",
    "header", "footer", "blockquote", "pre",
];

/// Shared by the HTML extractor and the EPUB extractor (which strips
/// per-chapter XHTML the same way).
pub fn extract_text(raw: &str) -> String {
    let document = Html::parse_document(raw);
    let skip = Selector::parse("script, style").unwrap();
    let skip_ids: std::collections::HashSet<_> = document
        .select(&skip)
        .flat_map(|el| el.descendants().map(|n| n.id()))
        .collect();

    let mut out = String::new();
    for node in document.root_element().descendants() {
        if skip_ids.contains(&node.id()) {
            continue;
        }
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        }
        if let Some(element) = node.value().as_element() {
            if BLOCK_ELEMENTS.contains(&element.name()) {
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_and_style_content_is_skipped() {
        let html = "<html><body><script>var x = 1;</script><p>Hello</p><style>.a{}</style></body></html>";
        let text = extract_text(html);
        assert!(text.contains("Hello"));
        assert!(!text.contains("var x"));
        assert!(!text.contains(".a{}"));
    }

    #[test]
    fn block_elements_add_newlines() {
        let html = "<html><body><p>One</p><p>Two</p></body></html>";
        let text = extract_text(html);
        assert!(text.contains("One\n"));
        assert!(text.contains("Two\n"));
    }
}
