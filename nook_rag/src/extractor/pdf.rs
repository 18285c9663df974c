//! PDF text extraction: `pdftotext` when present, else a pure-Rust parser
//! (spec.md §4.1).

use std::io::Read;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::tool_probe::ToolProbe;
use super::Extractor;
use crate::error::{RagError, Result};

static PDFTOTEXT: ToolProbe = ToolProbe::new(
    "pdftotext",
    "-v",
    "install poppler-utils (e.g. `apt install poppler-utils` / `brew install poppler`)",
);

const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(60);

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    fn via_pdftotext(&self, path: &Path) -> Result<String> {
        let mut child = Command::new("pdftotext")
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .stdout(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| RagError::Extraction(format!("failed to spawn pdftotext: {e}")))?;

        // Drain stdout on its own thread so a large PDF's output can't fill
        // the pipe buffer and block the child on write() while we poll
        // try_wait() below — that combination deadlocks until the timeout
        // kills the process.
        let mut stdout = child.stdout.take().expect("stdout is piped");
        let reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let start = std::time::Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if start.elapsed() > SUBPROCESS_TIMEOUT => {
                    let _ = child.kill();
                    let _ = reader.join();
                    return Err(RagError::Timeout(SUBPROCESS_TIMEOUT));
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => return Err(RagError::Extraction(e.to_string())),
            }
        }

        let stdout_bytes = reader
            .join()
            .map_err(|_| RagError::Extraction("pdftotext stdout reader thread panicked".to_string()))?
            .map_err(|e| RagError::Extraction(format!("failed to read pdftotext stdout: {e}")))?;
        let status = child
            .wait()
            .map_err(|e| RagError::Extraction(format!("pdftotext failed: {e}")))?;
        if !status.success() {
            return Err(RagError::Extraction("pdftotext exited with an error".to_string()));
        }
        String::from_utf8(stdout_bytes)
            .map_err(|e| RagError::Extraction(format!("pdftotext produced invalid UTF-8: {e}")))
    }

    fn via_fallback_parser(&self, path: &Path) -> Result<String> {
        // `pdf_extract::extract_text` walks the page tree itself and skips
        // pages it cannot decode rather than failing the whole document —
        // matching the "page-by-page, skipping unparseable pages" contract.
        pdf_extract::extract_text(path)
            .map_err(|e| RagError::Extraction(format!("pdf fallback parser failed: {e}")))
    }
}

impl Extractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let text = if PDFTOTEXT.is_available() {
            match self.via_pdftotext(path) {
                Ok(text) => text,
                Err(_) => self.via_fallback_parser(path)?,
            }
        } else {
            self.via_fallback_parser(path)?
        };
        if text.trim().is_empty() {
            return Err(RagError::NoText);
        }
        Ok(text)
    }

    fn mime_type(&self) -> &'static str {
        "application/pdf"
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}
