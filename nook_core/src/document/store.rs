use crate::atomic::{read_json, write_json_atomic};
use crate::error::{Error, Result};
use crate::path_layout::PathLayout;

use super::DocumentContent;

/// Owns the per-document content blobs under `documents/{id}.json`, using
/// the same atomic-rename discipline as `DocumentRepo`.
pub struct DocumentStore {
    layout: PathLayout,
}

impl DocumentStore {
    pub fn new(layout: PathLayout) -> Self {
        Self { layout }
    }

    pub fn load(&self, doc_id: &str) -> Result<DocumentContent> {
        read_json(&self.layout.document_blob(doc_id))
    }

    pub fn save(&self, doc_id: &str, content: &DocumentContent) -> Result<()> {
        write_json_atomic(&self.layout.document_blob(doc_id), content)
    }

    pub fn delete(&self, doc_id: &str) -> Result<()> {
        let path = self.layout.document_blob(doc_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn exists(&self, doc_id: &str) -> bool {
        self.layout.document_blob(doc_id).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, BlockKind};

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(PathLayout::new(dir.into_path()));
        let content = DocumentContent {
            blocks: vec![Block {
                id: "b1".into(),
                kind: BlockKind::Paragraph { text: "hello".into() },
                children: vec![],
            }],
        };
        store.save("doc-1", &content).unwrap();
        let loaded = store.load("doc-1").unwrap();
        assert_eq!(loaded, content);
    }

    #[test]
    fn delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(PathLayout::new(dir.into_path()));
        store.delete("nope").unwrap();
    }
}
