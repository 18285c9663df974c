//! Walks a document's block tree into an ordered `ExtractedUnit` sequence
//! (spec.md §4.2).

use nook_core::document::{Block, BlockKind};
use nook_core::vector::ExternalKind;

use crate::types::ExtractedUnit;

/// Stateless: `extract` is called once per document content load.
pub struct BlockTextExtractor;

impl BlockTextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Walk `blocks` in document order, returning every `ExtractedUnit`
    /// found. Heading context is the nearest preceding heading (levels
    /// 1-3) in tree order, reset whenever a shallower or equal heading is
    /// seen.
    pub fn extract(&self, blocks: &[Block]) -> Vec<ExtractedUnit> {
        let mut units = Vec::new();
        let mut heading_stack: [Option<String>; 4] = [None, None, None, None];
        self.walk(blocks, &mut heading_stack, &mut units);
        units
    }

    fn walk(
        &self,
        blocks: &[Block],
        heading_stack: &mut [Option<String>; 4],
        units: &mut Vec<ExtractedUnit>,
    ) {
        for block in blocks {
            self.visit(block, heading_stack, units);
            self.walk(&block.children, heading_stack, units);
        }
    }

    fn visit(
        &self,
        block: &Block,
        heading_stack: &mut [Option<String>; 4],
        units: &mut Vec<ExtractedUnit>,
    ) {
        let heading_context = current_heading(heading_stack);

        match &block.kind {
            BlockKind::Heading { level, text } => {
                let level = (*level).clamp(1, 3) as usize;
                heading_stack[level] = Some(text.clone());
                for l in (level + 1)..heading_stack.len() {
                    heading_stack[l] = None;
                }
                units.push(ExtractedUnit::PlainText {
                    block_id: block.id.clone(),
                    block_type: block.kind.type_name().to_string(),
                    text: text.clone(),
                    heading_context,
                });
            }
            BlockKind::Paragraph { text }
            | BlockKind::BulletListItem { text }
            | BlockKind::NumberedListItem { text }
            | BlockKind::CheckListItem { text, .. }
            | BlockKind::CodeBlock { text, .. } => {
                units.push(ExtractedUnit::PlainText {
                    block_id: block.id.clone(),
                    block_type: block.kind.type_name().to_string(),
                    text: text.clone(),
                    heading_context,
                });
            }
            BlockKind::Bookmark { url, .. } => {
                units.push(ExtractedUnit::ExternalRef {
                    block_id: block.id.clone(),
                    kind: ExternalKind::Bookmark,
                    locator: url.clone(),
                    heading_context,
                });
            }
            BlockKind::File {
                original_path,
                archived_path,
                ..
            } => {
                let locator = if std::path::Path::new(original_path).exists() {
                    original_path.clone()
                } else {
                    archived_path.clone().unwrap_or_else(|| original_path.clone())
                };
                units.push(ExtractedUnit::ExternalRef {
                    block_id: block.id.clone(),
                    kind: ExternalKind::File,
                    locator,
                    heading_context,
                });
            }
            BlockKind::Folder { folder_path, .. } => {
                units.push(ExtractedUnit::ExternalRef {
                    block_id: block.id.clone(),
                    kind: ExternalKind::Folder,
                    locator: folder_path.clone(),
                    heading_context,
                });
            }
            BlockKind::Image { .. } => {
                // No recoverable text; images are not OCR'd.
            }
            BlockKind::Other { inline_text, .. } => {
                // spec.md §4.2: unknown block types participate in
                // extraction as a paragraph if they carry inline text,
                // otherwise they're ignored.
                if let Some(text) = inline_text {
                    if !text.trim().is_empty() {
                        units.push(ExtractedUnit::PlainText {
                            block_id: block.id.clone(),
                            block_type: "paragraph".to_string(),
                            text: text.clone(),
                            heading_context,
                        });
                    }
                }
            }
        }
    }
}

impl Default for BlockTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn current_heading(heading_stack: &[Option<String>; 4]) -> String {
    heading_stack
        .iter()
        .rev()
        .find_map(|h| h.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nook_core::document::Block;

    fn block(id: &str, kind: BlockKind) -> Block {
        Block {
            id: id.to_string(),
            kind,
            children: vec![],
        }
    }

    #[test]
    fn heading_context_applies_to_following_paragraphs() {
        let blocks = vec![
            block(
                "h1",
                BlockKind::Heading {
                    level: 1,
                    text: "Intro".to_string(),
                },
            ),
            block(
                "p1",
                BlockKind::Paragraph {
                    text: "hello".to_string(),
                },
            ),
        ];
        let units = BlockTextExtractor::new().extract(&blocks);
        match &units[1] {
            ExtractedUnit::PlainText { heading_context, .. } => {
                assert_eq!(heading_context, "Intro");
            }
            _ => panic!("expected plain text unit"),
        }
    }

    #[test]
    fn deeper_heading_resets_on_shallower_sibling() {
        let blocks = vec![
            block(
                "h1",
                BlockKind::Heading {
                    level: 1,
                    text: "A".to_string(),
                },
            ),
            block(
                "h2",
                BlockKind::Heading {
                    level: 2,
                    text: "B".to_string(),
                },
            ),
            block(
                "h1b",
                BlockKind::Heading {
                    level: 1,
                    text: "C".to_string(),
                },
            ),
            block(
                "p1",
                BlockKind::Paragraph {
                    text: "x".to_string(),
                },
            ),
        ];
        let units = BlockTextExtractor::new().extract(&blocks);
        match units.last().unwrap() {
            ExtractedUnit::PlainText { heading_context, .. } => {
                assert_eq!(heading_context, "C");
            }
            _ => panic!("expected plain text unit"),
        }
    }

    #[test]
    fn bookmark_emits_external_ref_with_url_locator() {
        let blocks = vec![block(
            "bm1",
            BlockKind::Bookmark {
                url: "https://example.com".to_string(),
                title: None,
                description: None,
                image: None,
                favicon: None,
                site_name: None,
                indexed: false,
                indexing: false,
                index_error: None,
            },
        )];
        let units = BlockTextExtractor::new().extract(&blocks);
        assert_eq!(
            units[0],
            ExtractedUnit::ExternalRef {
                block_id: "bm1".to_string(),
                kind: ExternalKind::Bookmark,
                locator: "https://example.com".to_string(),
                heading_context: String::new(),
            }
        );
    }

    #[test]
    fn bookmark_under_heading_carries_heading_context() {
        let blocks = vec![
            block(
                "h1",
                BlockKind::Heading {
                    level: 1,
                    text: "Links".to_string(),
                },
            ),
            block(
                "bm1",
                BlockKind::Bookmark {
                    url: "https://example.com".to_string(),
                    title: None,
                    description: None,
                    image: None,
                    favicon: None,
                    site_name: None,
                    indexed: false,
                    indexing: false,
                    index_error: None,
                },
            ),
        ];
        let units = BlockTextExtractor::new().extract(&blocks);
        match &units[1] {
            ExtractedUnit::ExternalRef { heading_context, .. } => {
                assert_eq!(heading_context, "Links");
            }
            _ => panic!("expected external ref unit"),
        }
    }

    #[test]
    fn unknown_block_with_inline_text_is_treated_as_paragraph() {
        let json = serde_json::json!({
            "id": "u1",
            "type": "callout",
            "text": "heads up",
        });
        let b: Block = serde_json::from_value(json).unwrap();
        let units = BlockTextExtractor::new().extract(&[b]);
        assert_eq!(
            units[0],
            ExtractedUnit::PlainText {
                block_id: "u1".to_string(),
                block_type: "paragraph".to_string(),
                text: "heads up".to_string(),
                heading_context: String::new(),
            }
        );
    }

    #[test]
    fn unknown_block_without_inline_text_is_ignored() {
        let json = serde_json::json!({
            "id": "u1",
            "type": "divider",
        });
        let b: Block = serde_json::from_value(json).unwrap();
        let units = BlockTextExtractor::new().extract(&[b]);
        assert!(units.is_empty());
    }
}
