//! Dispatches a filesystem path to a typed text extractor by extension
//! (spec.md §4.1).
//!
//! Grounded on the teacher's `ToolRegistry` (`lumosai_core/src/tool/registry.rs`):
//! a name-keyed `Arc<dyn _>` map built at construction, queried by a thin
//! public API rather than matched inline at every call site.

mod docx;
mod epub;
mod generic_text;
mod html;
mod pdf;
mod plain;
mod tool_probe;
mod xlsx;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{RagError, Result};

/// Shared with the Indexer's bookmark fetcher, which strips raw HTML the
/// same way the HTML extractor does.
pub use html::extract_text as html_extract_text;

/// A single content-type extractor. Implementors never panic on malformed
/// input; they return `Err` and let the Indexer downgrade to a per-block
/// skip.
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
    fn mime_type(&self) -> &'static str;
}

/// Static dispatch table keyed by lowercase extension.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Build the registry with the fixed extractor set spec.md §4.1
    /// enumerates. `register` is also public so tests (or an embedder) can
    /// extend the set.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            extractors: HashMap::new(),
        };
        registry.register("pdf", Arc::new(pdf::PdfExtractor::new()));
        registry.register("docx", Arc::new(docx::DocxExtractor::new()));
        registry.register("xlsx", Arc::new(xlsx::XlsxExtractor));
        registry.register("xls", Arc::new(xlsx::XlsxExtractor));
        registry.register("epub", Arc::new(epub::EpubExtractor));
        registry.register("html", Arc::new(html::HtmlExtractor));
        registry.register("htm", Arc::new(html::HtmlExtractor));
        registry.register("txt", Arc::new(plain::PlainTextExtractor));
        registry.register("md", Arc::new(plain::PlainTextExtractor));
        registry.register("markdown", Arc::new(plain::PlainTextExtractor));
        registry
    }

    pub fn register(&mut self, extension: &str, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(extension.to_lowercase(), extractor);
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.extractors.contains_key(&ext))
            .unwrap_or(false)
    }

    pub fn mime_for(&self, path: &Path) -> String {
        extension_of(path)
            .and_then(|ext| self.extractors.get(&ext))
            .map(|e| e.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }

    pub fn registered_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.extractors.keys().cloned().collect();
        exts.sort();
        exts
    }

    /// Extract text, falling back to the generic-text heuristic
    /// (spec.md §4.1's last row) when the extension isn't recognised.
    pub fn extract(&self, path: &Path) -> Result<String> {
        let text = match extension_of(path).and_then(|ext| self.extractors.get(&ext)) {
            Some(extractor) => extractor.extract(path)?,
            None => generic_text::GenericTextExtractor.extract(path)?,
        };
        if text.trim().is_empty() {
            return Err(RagError::NoText);
        }
        Ok(text)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_falls_back_to_generic() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(!registry.is_supported(Path::new("notes.xyz")));
    }

    #[test]
    fn registered_extensions_includes_core_set() {
        let registry = ExtractorRegistry::with_defaults();
        let exts = registry.registered_extensions();
        for expected in ["pdf", "docx", "xlsx", "epub", "html", "txt", "md"] {
            assert!(exts.contains(&expected.to_string()), "missing {expected}");
        }
    }
}
