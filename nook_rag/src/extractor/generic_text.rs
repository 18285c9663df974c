//! Last-resort heuristic for files of unrecognised extension (spec.md
//! §4.1, last table row): sample the first 8 KiB, require valid UTF-8,
//! reject if the non-printable-character ratio is ≥10%, else read the
//! whole file.

use std::io::Read;
use std::path::Path;

use super::Extractor;
use crate::error::{RagError, Result};

const SAMPLE_SIZE: usize = 8 * 1024;
const NON_PRINTABLE_REJECT_RATIO: f64 = 0.10;

pub struct GenericTextExtractor;

impl Extractor for GenericTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let mut file = std::fs::File::open(path)?;
        let mut sample = vec![0u8; SAMPLE_SIZE];
        let read = file.read(&mut sample)?;
        sample.truncate(read);

        let sample_text = std::str::from_utf8(&sample)
            .map_err(|_| RagError::Extraction("file is not valid UTF-8".to_string()))?;

        if non_printable_ratio(sample_text) >= NON_PRINTABLE_REJECT_RATIO {
            return Err(RagError::Extraction(
                "file looks binary (high non-printable character ratio)".to_string(),
            ));
        }

        if read < SAMPLE_SIZE {
            return Ok(sample_text.to_string());
        }
        Ok(std::fs::read_to_string(path)?)
    }

    fn mime_type(&self) -> &'static str {
        "text/plain"
    }
}

fn non_printable_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let total = text.chars().count();
    let non_printable = text
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r') && c.is_control())
        .count();
    non_printable as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mostly_printable_text_is_not_rejected() {
        assert!(non_printable_ratio("hello\tworld\n") < NON_PRINTABLE_REJECT_RATIO);
    }

    #[test]
    fn high_control_char_ratio_is_rejected() {
        let binary: String = std::iter::repeat('\u{0001}').take(20).collect();
        assert!(non_printable_ratio(&binary) >= NON_PRINTABLE_REJECT_RATIO);
    }
}
