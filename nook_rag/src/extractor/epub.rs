//! EPUB text extraction: open as ZIP, strip scripts/styles from each
//! (x)html entry, emit text with block-element newlines (spec.md §4.1).

use std::io::Read;
use std::path::Path;

use super::html;
use super::Extractor;
use crate::error::{RagError, Result};

pub struct EpubExtractor;

impl Extractor for EpubExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| RagError::Extraction(format!("not a valid epub/zip: {e}")))?;

        let mut out = String::new();
        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let name = entry.name().to_lowercase();
            if !(name.ends_with(".html") || name.ends_with(".xhtml") || name.ends_with(".htm")) {
                continue;
            }
            let mut raw = String::new();
            if entry.read_to_string(&mut raw).is_err() {
                continue;
            }
            out.push_str(&html::extract_text(&raw));
            out.push('\n');
        }
        Ok(out)
    }

    fn mime_type(&self) -> &'static str {
        "application/epub+zip"
    }
}
