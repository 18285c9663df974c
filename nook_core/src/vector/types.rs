//! `ChunkVector` / `ExternalContent` data model and the deterministic id
//! scheme from spec.md §3.
//!
//! id forms:
//! - plain block, single chunk:  `{blockId}`
//! - plain block, multi-chunk:   `{blockId}_chunk_{n}`
//! - external block, single:     `{docId}_{blockId}_{kind}`
//! - external block, multi:      `{docId}_{blockId}_{kind}_chunk_{n}`
//! - aggregated folder summary:  `agg_{folderKey}` (not block-resolvable)

use serde::{Deserialize, Serialize};

/// Block type of an external-reference block, mirrored in the id scheme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExternalKind {
    Bookmark,
    File,
    Folder,
}

impl ExternalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExternalKind::Bookmark => "bookmark",
            ExternalKind::File => "file",
            ExternalKind::Folder => "folder",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "bookmark" => Some(ExternalKind::Bookmark),
            "file" => Some(ExternalKind::File),
            "folder" => Some(ExternalKind::Folder),
            _ => None,
        }
    }
}

/// A single embedded chunk and the metadata needed to answer a query
/// without re-reading the source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkVector {
    pub id: String,
    pub doc_id: String,
    pub source_block_id: String,
    pub block_type: String,
    pub heading_context: String,
    pub content: String,
    pub fingerprint: String,
    pub embedding: Vec<f32>,
}

/// Extracted text from an external-reference block, stored alongside its
/// vectors so re-chunking doesn't require re-fetching the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalContent {
    pub id: String,
    pub doc_id: String,
    pub block_id: String,
    pub block_type: ExternalKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub title: String,
    pub content: String,
    pub extracted_at: chrono::DateTime<chrono::Utc>,
}

/// Deterministic id builder for plain (in-document) chunks.
pub fn plain_chunk_id(block_id: &str, chunk_index: Option<usize>) -> String {
    match chunk_index {
        None => block_id.to_string(),
        Some(n) => format!("{block_id}_chunk_{n}"),
    }
}

/// Deterministic id builder for external-reference chunks.
pub fn external_chunk_id(
    doc_id: &str,
    block_id: &str,
    kind: ExternalKind,
    chunk_index: Option<usize>,
) -> String {
    match chunk_index {
        None => format!("{doc_id}_{block_id}_{}", kind.as_str()),
        Some(n) => format!("{doc_id}_{block_id}_{}_chunk_{n}", kind.as_str()),
    }
}

pub fn aggregated_chunk_id(folder_key: &str) -> String {
    format!("agg_{folder_key}")
}

/// The pure, non-resolvable-for-aggregates parse invariant (ii) of spec.md
/// §3 demands: every non-aggregated id must recover its `sourceBlockId`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedChunkId {
    Plain {
        block_id: String,
        chunk_index: Option<usize>,
    },
    External {
        doc_id: String,
        block_id: String,
        kind: ExternalKind,
        chunk_index: Option<usize>,
    },
    Aggregated {
        folder_key: String,
    },
}

impl ParsedChunkId {
    /// `sourceBlockId`, if this id resolves to one (all forms except
    /// `Aggregated`).
    pub fn source_block_id(&self) -> Option<&str> {
        match self {
            ParsedChunkId::Plain { block_id, .. } => Some(block_id),
            ParsedChunkId::External { block_id, .. } => Some(block_id),
            ParsedChunkId::Aggregated { .. } => None,
        }
    }
}

/// UUIDs as used throughout this system are fixed-length (36 chars,
/// `8-4-4-4-12` lowercase hex+hyphen groups), which is what lets this parser
/// tell a `{docId}_{blockId}_{kind}` external id apart from a plain
/// `{blockId}_chunk_{n}` one without any side-channel.
const UUID_LEN: usize = 36;

pub fn parse_chunk_id(id: &str) -> ParsedChunkId {
    if let Some(folder_key) = id.strip_prefix("agg_") {
        return ParsedChunkId::Aggregated {
            folder_key: folder_key.to_string(),
        };
    }

    let (base, chunk_index) = match id.rfind("_chunk_") {
        Some(pos) => {
            let idx_str = &id[pos + "_chunk_".len()..];
            match idx_str.parse::<usize>() {
                Ok(n) => (&id[..pos], Some(n)),
                Err(_) => (id, None),
            }
        }
        None => (id, None),
    };

    // external form: {36-char docId}_{36-char blockId}_{kind}
    if base.len() > UUID_LEN * 2 + 2 && base.as_bytes().get(UUID_LEN) == Some(&b'_') {
        let doc_id = &base[..UUID_LEN];
        let rest = &base[UUID_LEN + 1..];
        if rest.len() > UUID_LEN && rest.as_bytes().get(UUID_LEN) == Some(&b'_') {
            let block_id = &rest[..UUID_LEN];
            let kind_str = &rest[UUID_LEN + 1..];
            if let Some(kind) = ExternalKind::from_str(kind_str) {
                return ParsedChunkId::External {
                    doc_id: doc_id.to_string(),
                    block_id: block_id.to_string(),
                    kind,
                    chunk_index,
                };
            }
        }
    }

    ParsedChunkId::Plain {
        block_id: base.to_string(),
        chunk_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "11111111-1111-1111-1111-111111111111";
    const BLOCK: &str = "22222222-2222-2222-2222-222222222222";

    #[test]
    fn plain_single_chunk_roundtrips() {
        let id = plain_chunk_id(BLOCK, None);
        assert_eq!(id, BLOCK);
        assert_eq!(
            parse_chunk_id(&id),
            ParsedChunkId::Plain {
                block_id: BLOCK.to_string(),
                chunk_index: None
            }
        );
    }

    #[test]
    fn plain_multi_chunk_roundtrips() {
        let id = plain_chunk_id(BLOCK, Some(2));
        assert_eq!(id, format!("{BLOCK}_chunk_2"));
        assert_eq!(
            parse_chunk_id(&id),
            ParsedChunkId::Plain {
                block_id: BLOCK.to_string(),
                chunk_index: Some(2)
            }
        );
    }

    #[test]
    fn external_single_chunk_roundtrips() {
        let id = external_chunk_id(DOC, BLOCK, ExternalKind::Bookmark, None);
        assert_eq!(id, format!("{DOC}_{BLOCK}_bookmark"));
        assert_eq!(
            parse_chunk_id(&id),
            ParsedChunkId::External {
                doc_id: DOC.to_string(),
                block_id: BLOCK.to_string(),
                kind: ExternalKind::Bookmark,
                chunk_index: None,
            }
        );
    }

    #[test]
    fn external_multi_chunk_roundtrips() {
        let id = external_chunk_id(DOC, BLOCK, ExternalKind::File, Some(3));
        let parsed = parse_chunk_id(&id);
        assert_eq!(parsed.source_block_id(), Some(BLOCK));
        assert_eq!(
            parsed,
            ParsedChunkId::External {
                doc_id: DOC.to_string(),
                block_id: BLOCK.to_string(),
                kind: ExternalKind::File,
                chunk_index: Some(3),
            }
        );
    }

    #[test]
    fn aggregated_ids_do_not_resolve_to_a_block() {
        let id = aggregated_chunk_id("projects");
        assert_eq!(parse_chunk_id(&id).source_block_id(), None);
    }
}
