//! Document metadata and the opaque block-tree content model (spec.md §3).

mod repo;
mod store;

pub use repo::DocumentRepo;
pub use store::DocumentStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document metadata, owned by `DocumentRepo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            folder_id: None,
            tags: Vec::new(),
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The persisted `index.json` shape: `{documents:[...], activeId}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentIndex {
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_id: Option<String>,
}

/// A node in a document's ordered block tree. Unknown `block_type`s are
/// accepted (forward compat) and handled by `Other`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub id: String,
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(default)]
    pub children: Vec<Block>,
}

/// The recognised block type vocabulary from spec.md §3. `props` on the
/// richer variants mirrors the editor's own JSON shape closely enough that
/// `BlockTextExtractor` (in `nook_rag`) can read it without re-parsing.
///
/// `Serialize`/`Deserialize` are hand-written below rather than derived:
/// `#[serde(other)]` only allows a unit fallback variant, which can't carry
/// the raw JSON or any inline text recovered from it (spec.md §4.2's "if
/// they contain inline text content, treat as paragraph" rule needs both).
/// Deserialization instead buffers the block into a `serde_json::Value`,
/// tries it against the known-variant vocabulary first, and only falls
/// back to `Other` (keeping the raw value and any recovered inline text)
/// when the tag or shape doesn't match anything recognised.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph { text: String },
    Heading { level: u8, text: String },
    BulletListItem { text: String },
    NumberedListItem { text: String },
    CheckListItem { text: String, checked: bool },
    CodeBlock { text: String, language: Option<String> },
    Image { caption: Option<String> },
    Bookmark {
        url: String,
        title: Option<String>,
        description: Option<String>,
        image: Option<String>,
        favicon: Option<String>,
        site_name: Option<String>,
        indexed: bool,
        indexing: bool,
        index_error: Option<String>,
    },
    File {
        original_path: String,
        archived_path: Option<String>,
        file_name: String,
        file_type: String,
        file_size: u64,
        mime_type: Option<String>,
        indexed: bool,
        indexing: bool,
        index_error: Option<String>,
    },
    Folder {
        folder_path: String,
        folder_name: String,
        file_count: u64,
        indexed_count: u64,
        indexed: bool,
        index_error: Option<String>,
    },
    /// Forward-compat catch-all for block types this build doesn't
    /// recognise. `inline_text` carries any `text`-typed inline content
    /// recovered from `raw` so `BlockTextExtractor` can still treat the
    /// block as a paragraph; `raw` is the untouched JSON object so the
    /// block round-trips unchanged through a save that doesn't touch it.
    Other {
        type_name: String,
        inline_text: Option<String>,
        raw: serde_json::Value,
    },
}

/// Mirrors `BlockKind`'s known variants for a first-pass internally-tagged
/// deserialization attempt; kept private so the only way to build a
/// `BlockKind` is through the real enum's conversions below.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum KnownBlockKind {
    #[serde(rename_all = "camelCase")]
    Paragraph { text: String },
    #[serde(rename_all = "camelCase")]
    Heading { level: u8, text: String },
    #[serde(rename_all = "camelCase")]
    BulletListItem { text: String },
    #[serde(rename_all = "camelCase")]
    NumberedListItem { text: String },
    #[serde(rename_all = "camelCase")]
    CheckListItem { text: String, checked: bool },
    #[serde(rename_all = "camelCase")]
    CodeBlock { text: String, #[serde(skip_serializing_if = "Option::is_none")] language: Option<String> },
    #[serde(rename_all = "camelCase")]
    Image { #[serde(skip_serializing_if = "Option::is_none")] caption: Option<String> },
    #[serde(rename_all = "camelCase")]
    Bookmark {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        favicon: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        site_name: Option<String>,
        #[serde(default)]
        indexed: bool,
        #[serde(default)]
        indexing: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        index_error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    File {
        original_path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        archived_path: Option<String>,
        file_name: String,
        file_type: String,
        file_size: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default)]
        indexed: bool,
        #[serde(default)]
        indexing: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        index_error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Folder {
        folder_path: String,
        folder_name: String,
        file_count: u64,
        indexed_count: u64,
        #[serde(default)]
        indexed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        index_error: Option<String>,
    },
}

impl From<KnownBlockKind> for BlockKind {
    fn from(known: KnownBlockKind) -> Self {
        match known {
            KnownBlockKind::Paragraph { text } => BlockKind::Paragraph { text },
            KnownBlockKind::Heading { level, text } => BlockKind::Heading { level, text },
            KnownBlockKind::BulletListItem { text } => BlockKind::BulletListItem { text },
            KnownBlockKind::NumberedListItem { text } => BlockKind::NumberedListItem { text },
            KnownBlockKind::CheckListItem { text, checked } => BlockKind::CheckListItem { text, checked },
            KnownBlockKind::CodeBlock { text, language } => BlockKind::CodeBlock { text, language },
            KnownBlockKind::Image { caption } => BlockKind::Image { caption },
            KnownBlockKind::Bookmark {
                url,
                title,
                description,
                image,
                favicon,
                site_name,
                indexed,
                indexing,
                index_error,
            } => BlockKind::Bookmark {
                url,
                title,
                description,
                image,
                favicon,
                site_name,
                indexed,
                indexing,
                index_error,
            },
            KnownBlockKind::File {
                original_path,
                archived_path,
                file_name,
                file_type,
                file_size,
                mime_type,
                indexed,
                indexing,
                index_error,
            } => BlockKind::File {
                original_path,
                archived_path,
                file_name,
                file_type,
                file_size,
                mime_type,
                indexed,
                indexing,
                index_error,
            },
            KnownBlockKind::Folder {
                folder_path,
                folder_name,
                file_count,
                indexed_count,
                indexed,
                index_error,
            } => BlockKind::Folder {
                folder_path,
                folder_name,
                file_count,
                indexed_count,
                indexed,
                index_error,
            },
        }
    }
}

/// The inverse of `From<KnownBlockKind>`, used only by `Serialize`.
/// Returns `None` for `Other`, which is serialized from its stored `raw`
/// value instead.
fn to_known(kind: &BlockKind) -> Option<KnownBlockKind> {
    Some(match kind.clone() {
        BlockKind::Paragraph { text } => KnownBlockKind::Paragraph { text },
        BlockKind::Heading { level, text } => KnownBlockKind::Heading { level, text },
        BlockKind::BulletListItem { text } => KnownBlockKind::BulletListItem { text },
        BlockKind::NumberedListItem { text } => KnownBlockKind::NumberedListItem { text },
        BlockKind::CheckListItem { text, checked } => KnownBlockKind::CheckListItem { text, checked },
        BlockKind::CodeBlock { text, language } => KnownBlockKind::CodeBlock { text, language },
        BlockKind::Image { caption } => KnownBlockKind::Image { caption },
        BlockKind::Bookmark {
            url,
            title,
            description,
            image,
            favicon,
            site_name,
            indexed,
            indexing,
            index_error,
        } => KnownBlockKind::Bookmark {
            url,
            title,
            description,
            image,
            favicon,
            site_name,
            indexed,
            indexing,
            index_error,
        },
        BlockKind::File {
            original_path,
            archived_path,
            file_name,
            file_type,
            file_size,
            mime_type,
            indexed,
            indexing,
            index_error,
        } => KnownBlockKind::File {
            original_path,
            archived_path,
            file_name,
            file_type,
            file_size,
            mime_type,
            indexed,
            indexing,
            index_error,
        },
        BlockKind::Folder {
            folder_path,
            folder_name,
            file_count,
            indexed_count,
            indexed,
            index_error,
        } => KnownBlockKind::Folder {
            folder_path,
            folder_name,
            file_count,
            indexed_count,
            indexed,
            index_error,
        },
        BlockKind::Other { .. } => return None,
    })
}

/// Recovers inline text from a block this build doesn't recognise, per
/// spec.md §4.2: a top-level `text` string, or inline content items of
/// type `text` concatenated from a `content` array (the same two shapes
/// the editor uses for its known text-bearing blocks).
fn extract_inline_text(value: &serde_json::Value) -> Option<String> {
    if let Some(text) = value.get("text").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }
    if let Some(items) = value.get("content").and_then(|v| v.as_array()) {
        let joined: String = items
            .iter()
            .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect();
        if !joined.is_empty() {
            return Some(joined);
        }
    }
    None
}

impl Serialize for BlockKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            BlockKind::Other { raw, .. } => raw.serialize(serializer),
            known => to_known(known)
                .expect("every non-Other variant maps to a KnownBlockKind")
                .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for BlockKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match serde_json::from_value::<KnownBlockKind>(value.clone()) {
            Ok(known) => Ok(known.into()),
            Err(_) => {
                let type_name = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let inline_text = extract_inline_text(&value);
                Ok(BlockKind::Other {
                    type_name,
                    inline_text,
                    raw: value,
                })
            }
        }
    }
}

impl BlockKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::Paragraph { .. } => "paragraph",
            BlockKind::Heading { .. } => "heading",
            BlockKind::BulletListItem { .. } => "bulletListItem",
            BlockKind::NumberedListItem { .. } => "numberedListItem",
            BlockKind::CheckListItem { .. } => "checkListItem",
            BlockKind::CodeBlock { .. } => "codeBlock",
            BlockKind::Image { .. } => "image",
            BlockKind::Bookmark { .. } => "bookmark",
            BlockKind::File { .. } => "file",
            BlockKind::Folder { .. } => "folder",
            BlockKind::Other { .. } => "other",
        }
    }
}

/// The opaque, ordered block tree making up one document's content. Treated
/// as a tree the core only parses for text + block metadata (spec.md §1).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DocumentContent {
    pub blocks: Vec<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_block_type_round_trips_through_json() {
        let block = Block {
            id: "b1".to_string(),
            kind: BlockKind::Paragraph { text: "hello".to_string() },
            children: vec![],
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "paragraph");
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn unknown_block_type_with_inline_text_is_recovered() {
        let json = serde_json::json!({
            "id": "b1",
            "type": "callout",
            "text": "careful here",
        });
        let block: Block = serde_json::from_value(json).unwrap();
        match block.kind {
            BlockKind::Other { type_name, inline_text, .. } => {
                assert_eq!(type_name, "callout");
                assert_eq!(inline_text.as_deref(), Some("careful here"));
            }
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn unknown_block_type_with_inline_content_array_is_recovered() {
        let json = serde_json::json!({
            "id": "b1",
            "type": "alert",
            "content": [
                {"type": "text", "text": "part one "},
                {"type": "text", "text": "part two"},
                {"type": "mention", "text": "ignored"},
            ],
        });
        let block: Block = serde_json::from_value(json).unwrap();
        match block.kind {
            BlockKind::Other { inline_text, .. } => {
                assert_eq!(inline_text.as_deref(), Some("part one part two"));
            }
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn unknown_block_type_without_text_has_no_inline_text() {
        let json = serde_json::json!({
            "id": "b1",
            "type": "divider",
        });
        let block: Block = serde_json::from_value(json).unwrap();
        match block.kind {
            BlockKind::Other { inline_text, .. } => assert!(inline_text.is_none()),
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn unknown_block_round_trips_its_extra_fields_unchanged() {
        let json = serde_json::json!({
            "id": "b1",
            "type": "callout",
            "text": "careful here",
            "icon": "warning",
        });
        let block: Block = serde_json::from_value(json).unwrap();
        let back = serde_json::to_value(&block).unwrap();
        assert_eq!(back["id"], "b1");
        assert_eq!(back["type"], "callout");
        assert_eq!(back["text"], "careful here");
        assert_eq!(back["icon"], "warning");
    }
}
