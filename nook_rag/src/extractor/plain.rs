//! Plaintext/Markdown extraction: read the file as UTF-8 verbatim
//! (spec.md §4.1).

use std::path::Path;

use super::Extractor;
use crate::error::Result;

pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn mime_type(&self) -> &'static str {
        "text/plain"
    }
}
