//! Sliding-window chunking with heading-aware context and content-addressed
//! fingerprinting (spec.md §4.3).
//!
//! Grounded on the teacher's `EnhancedChunker::chunk_token` sliding-window
//! loop (`lumosai_rag/src/document/chunker.rs`), simplified to the one
//! strategy this system needs: fixed-size character windows with overlap,
//! since the spec defines chunk ids in terms of a single deterministic
//! scheme rather than pluggable strategies.

use sha2::{Digest, Sha256};

use nook_core::vector::{external_chunk_id, plain_chunk_id, ExternalKind};

use crate::types::Chunk;

pub struct Chunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(max_chunk_size: usize, overlap: usize) -> Self {
        Self {
            max_chunk_size,
            overlap,
        }
    }

    /// Chunk a plain (in-document) block's text.
    pub fn chunk_plain(
        &self,
        block_id: &str,
        block_type: &str,
        heading_context: &str,
        text: &str,
        model: &str,
    ) -> Vec<Chunk> {
        let windows = self.windows(text);
        let single = windows.len() == 1;
        windows
            .into_iter()
            .enumerate()
            .map(|(n, window)| {
                let id = plain_chunk_id(block_id, if single { None } else { Some(n) });
                self.finish(id, window, block_id, block_type, heading_context, model)
            })
            .collect()
    }

    /// Chunk an external-reference block's extracted text.
    pub fn chunk_external(
        &self,
        doc_id: &str,
        block_id: &str,
        kind: ExternalKind,
        heading_context: &str,
        text: &str,
        model: &str,
    ) -> Vec<Chunk> {
        let windows = self.windows(text);
        let single = windows.len() == 1;
        windows
            .into_iter()
            .enumerate()
            .map(|(n, window)| {
                let id = external_chunk_id(doc_id, block_id, kind, if single { None } else { Some(n) });
                self.finish(id, window, block_id, kind.as_str(), heading_context, model)
            })
            .collect()
    }

    fn finish(
        &self,
        id: String,
        content: String,
        source_block_id: &str,
        block_type: &str,
        heading_context: &str,
        model: &str,
    ) -> Chunk {
        let fingerprint = fingerprint(model, heading_context, &content);
        Chunk {
            id,
            content,
            source_block_id: source_block_id.to_string(),
            block_type: block_type.to_string(),
            heading_context: heading_context.to_string(),
            fingerprint,
        }
    }

    /// Split `text` into one window if it fits, else a sliding window of
    /// size `max_chunk_size` with stride `max_chunk_size - overlap`.
    fn windows(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.max_chunk_size {
            return vec![text.to_string()];
        }

        let stride = self.max_chunk_size.saturating_sub(self.overlap).max(1);
        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.max_chunk_size).min(chars.len());
            windows.push(chars[start..end].iter().collect());
            if end >= chars.len() {
                break;
            }
            start += stride;
        }
        windows
    }
}

/// `sha256(model || headingContext || content)`, spec.md §4.3.
pub fn fingerprint(model: &str, heading_context: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(heading_context.as_bytes());
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_window_has_no_chunk_suffix() {
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk_plain("B", "paragraph", "", "hello", "m1");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "B");
    }

    #[test]
    fn s1_chunking_2500_chars_1000_200() {
        let text: String = (0..2500).map(|i| char::from((b'a' + (i % 26) as u8) as char)).collect();
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk_plain("B", "paragraph", "ctx", &text, "m1");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].id, "B_chunk_0");
        assert_eq!(chunks[1].id, "B_chunk_1");
        assert_eq!(chunks[2].id, "B_chunk_2");
        assert_eq!(chunks[0].content, text[0..1000]);
        assert_eq!(chunks[1].content, text[800..1800]);
        assert_eq!(chunks[2].content, text[1600..2500]);
        for c in &chunks {
            assert_eq!(c.heading_context, "ctx");
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint("m1", "ctx", "hello");
        let b = fingerprint("m1", "ctx", "hello");
        assert_eq!(a, b);
        let c = fingerprint("m1", "ctx", "hello!");
        assert_ne!(a, c);
    }

    #[test]
    fn external_chunk_ids_use_external_form() {
        let chunker = Chunker::new(10, 2);
        let text: String = "0123456789abcdefghij".to_string();
        let chunks =
            chunker.chunk_external("D", "K", ExternalKind::Bookmark, "", &text, "m1");
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].id, "D_K_bookmark_chunk_0");
    }
}
