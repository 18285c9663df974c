//! In-memory lowercased full-text cache (spec.md §4.8).

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct LexicalIndex {
    texts: RwLock<HashMap<String, String>>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, doc_id: &str, text: &str) {
        self.texts
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(doc_id.to_string(), text.to_lowercase());
    }

    pub fn remove(&self, doc_id: &str) {
        self.texts
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(doc_id);
    }

    /// Document ids whose cached text contains `query` (case-insensitive),
    /// in no particular order — callers apply their own ranking.
    pub fn search(&self, query: &str) -> Vec<String> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.texts
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(_, text)| text.contains(&needle))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// A ±`radius`-char snippet around the first match, ellipsis-bounded.
    pub fn snippet(&self, doc_id: &str, query: &str, radius: usize) -> Option<String> {
        let texts = self.texts.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let text = texts.get(doc_id)?;
        let needle = query.to_lowercase();
        let pos = text.find(&needle)?;

        let start = text[..pos].char_indices().rev().nth(radius).map(|(i, _)| i).unwrap_or(0);
        let end_base = pos + needle.len();
        let end = text[end_base..]
            .char_indices()
            .nth(radius)
            .map(|(i, _)| end_base + i)
            .unwrap_or(text.len());

        let mut snippet = String::new();
        if start > 0 {
            snippet.push_str("…");
        }
        snippet.push_str(&text[start..end]);
        if end < text.len() {
            snippet.push_str("…");
        }
        Some(snippet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_case_insensitive() {
        let index = LexicalIndex::new();
        index.update("d1", "The Raft Consensus Algorithm");
        assert_eq!(index.search("raft"), vec!["d1".to_string()]);
    }

    #[test]
    fn remove_drops_the_document() {
        let index = LexicalIndex::new();
        index.update("d1", "hello world");
        index.remove("d1");
        assert!(index.search("hello").is_empty());
    }

    #[test]
    fn snippet_includes_match_with_ellipses() {
        let index = LexicalIndex::new();
        index.update("d1", &("x".repeat(50) + "needle" + &"y".repeat(50)));
        let snippet = index.snippet("d1", "needle", 5).unwrap();
        assert!(snippet.contains("needle"));
        assert!(snippet.starts_with('…'));
        assert!(snippet.ends_with('…'));
    }
}
