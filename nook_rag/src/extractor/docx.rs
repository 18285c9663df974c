//! DOCX text extraction: `pandoc` when present, else parse the DOCX ZIP
//! and concatenate `<w:t>` runs at `<w:p>` boundaries (spec.md §4.1).

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::tool_probe::ToolProbe;
use super::Extractor;
use crate::error::{RagError, Result};

static PANDOC: ToolProbe = ToolProbe::new(
    "pandoc",
    "--version",
    "install pandoc (e.g. `apt install pandoc` / `brew install pandoc`)",
);

const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(60);

pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }

    fn via_pandoc(&self, path: &Path) -> Result<String> {
        let mut child = Command::new("pandoc")
            .arg("-f")
            .arg("docx")
            .arg("-t")
            .arg("markdown")
            .arg("--wrap=none")
            .arg(path)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| RagError::Extraction(format!("failed to spawn pandoc: {e}")))?;

        // Drained on its own thread for the same reason as the pdftotext
        // extractor: without it a large document's output can fill the
        // pipe buffer and deadlock the child against our wait loop.
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
            .map_err(|_| RagError::Extraction("pandoc stdout reader thread panicked".to_string()))?
            .map_err(|e| RagError::Extraction(format!("failed to read pandoc stdout: {e}")))?;
        let status = child
            .wait()
            .map_err(|e| RagError::Extraction(format!("pandoc failed: {e}")))?;
        if !status.success() {
            return Err(RagError::Extraction("pandoc exited with an error".to_string()));
        }
        String::from_utf8(stdout_bytes)
            .map_err(|e| RagError::Extraction(format!("pandoc produced invalid UTF-8: {e}")))
    }

    fn via_zip_fallback(&self, path: &Path) -> Result<String> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| RagError::Extraction(format!("not a valid docx/zip: {e}")))?;
        let mut document_xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| RagError::Extraction(format!("missing word/document.xml: {e}")))?
            .read_to_string(&mut document_xml)?;
        Ok(extract_paragraphs(&document_xml))
    }
}

/// Concatenate `<w:t>` run text, emitting a newline at each `<w:p>`
/// boundary.
fn extract_paragraphs(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"w:t" => in_text_run = false,
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => out.push('\n'),
            Ok(Event::Text(e)) if in_text_run => {
                if let Ok(text) = e.unescape() {
                    out.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        buf.clear();
    }
    out
}

impl Extractor for DocxExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let text = if PANDOC.is_available() {
            match self.via_pandoc(path) {
                Ok(text) => text,
                Err(_) => self.via_zip_fallback(path)?,
            }
        } else {
            self.via_zip_fallback(path)?
        };
        if text.trim().is_empty() {
            return Err(RagError::NoText);
        }
        Ok(text)
    }

    fn mime_type(&self) -> &'static str {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_boundaries_become_newlines() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r></w:p>
            <w:p><w:r><w:t>World</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = extract_paragraphs(xml);
        assert_eq!(text.trim(), "Hello\nWorld");
    }
}
