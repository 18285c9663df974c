use std::sync::RwLock;

use chrono::Utc;

use crate::atomic::{read_json, write_json_atomic};
use crate::error::{Error, Result};
use crate::path_layout::PathLayout;

use super::{Document, DocumentIndex};

/// Owns the ordered list of document metadata, persisted as `index.json`.
///
/// All mutation goes through `&self` methods that take an internal write
/// lock and atomically rewrite the whole index file; this is the single
/// writer for document metadata the rest of the system assumes (spec.md §5).
pub struct DocumentRepo {
    layout: PathLayout,
    index: RwLock<DocumentIndex>,
}

impl DocumentRepo {
    /// Load `index.json` if present, otherwise start with an empty index.
    pub fn open(layout: PathLayout) -> Result<Self> {
        let index = match read_json::<DocumentIndex>(&layout.index_json()) {
            Ok(index) => index,
            Err(Error::NotFound(_)) => DocumentIndex::default(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            layout,
            index: RwLock::new(index),
        })
    }

    fn persist(&self, index: &DocumentIndex) -> Result<()> {
        write_json_atomic(&self.layout.index_json(), index)
    }

    fn with_lock(&self) -> std::sync::RwLockWriteGuard<'_, DocumentIndex> {
        self.index
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn list(&self) -> Vec<Document> {
        self.index
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .documents
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.index
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    pub fn active_id(&self) -> Option<String> {
        self.index
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .active_id
            .clone()
    }

    pub fn create(&self, title: impl Into<String>) -> Result<Document> {
        let mut guard = self.with_lock();
        let order = guard
            .documents
            .iter()
            .filter(|d| d.folder_id.is_none())
            .count() as i64;
        let mut doc = Document::new(title);
        doc.order = order;
        guard.documents.push(doc.clone());
        self.persist(&guard)?;
        Ok(doc)
    }

    pub fn rename(&self, id: &str, title: impl Into<String>) -> Result<Document> {
        let mut guard = self.with_lock();
        let doc = find_mut(&mut guard.documents, id)?;
        doc.title = title.into();
        doc.updated_at = Utc::now();
        let updated = doc.clone();
        self.persist(&guard)?;
        Ok(updated)
    }

    pub fn set_active(&self, id: Option<&str>) -> Result<()> {
        let mut guard = self.with_lock();
        if let Some(id) = id {
            if !guard.documents.iter().any(|d| d.id == id) {
                return Err(Error::NotFound(format!("document {id}")));
            }
        }
        guard.active_id = id.map(|s| s.to_string());
        self.persist(&guard)
    }

    pub fn add_tag(&self, id: &str, tag: &str) -> Result<Document> {
        let mut guard = self.with_lock();
        let doc = find_mut(&mut guard.documents, id)?;
        if !doc.tags.iter().any(|t| t == tag) {
            doc.tags.push(tag.to_string());
        }
        doc.updated_at = Utc::now();
        let updated = doc.clone();
        self.persist(&guard)?;
        Ok(updated)
    }

    pub fn remove_tag(&self, id: &str, tag: &str) -> Result<Document> {
        let mut guard = self.with_lock();
        let doc = find_mut(&mut guard.documents, id)?;
        doc.tags.retain(|t| t != tag);
        doc.updated_at = Utc::now();
        let updated = doc.clone();
        self.persist(&guard)?;
        Ok(updated)
    }

    /// Move a document to `folder_id` (or to the root if `None`), then
    /// densely renumber `order` within both the source and destination
    /// folders (Open Question resolution: dense-per-folder, SPEC_FULL.md §9).
    pub fn move_to_folder(&self, id: &str, folder_id: Option<&str>) -> Result<Document> {
        let mut guard = self.with_lock();
        let old_folder = find_mut(&mut guard.documents, id)?.folder_id.clone();
        {
            let doc = find_mut(&mut guard.documents, id)?;
            doc.folder_id = folder_id.map(|s| s.to_string());
            doc.updated_at = Utc::now();
        }
        renumber_folder(&mut guard.documents, old_folder.as_deref());
        renumber_folder(&mut guard.documents, folder_id);
        let updated = find_mut(&mut guard.documents, id)?.clone();
        self.persist(&guard)?;
        Ok(updated)
    }

    /// Reorder documents within a single folder to match `ordered_ids`
    /// exactly (every id in the folder must appear exactly once).
    pub fn reorder(&self, folder_id: Option<&str>, ordered_ids: &[String]) -> Result<()> {
        let mut guard = self.with_lock();
        let current: Vec<String> = guard
            .documents
            .iter()
            .filter(|d| d.folder_id.as_deref() == folder_id)
            .map(|d| d.id.clone())
            .collect();
        let mut wanted = ordered_ids.to_vec();
        wanted.sort();
        let mut have = current.clone();
        have.sort();
        if wanted != have {
            return Err(Error::InvalidInput(
                "reorder must be a permutation of the folder's current documents".into(),
            ));
        }
        for (i, id) in ordered_ids.iter().enumerate() {
            let doc = find_mut(&mut guard.documents, id)?;
            doc.order = i as i64;
        }
        self.persist(&guard)
    }

    pub fn delete(&self, id: &str) -> Result<Document> {
        let mut guard = self.with_lock();
        let pos = guard
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| Error::NotFound(format!("document {id}")))?;
        let removed = guard.documents.remove(pos);
        if guard.active_id.as_deref() == Some(id) {
            guard.active_id = None;
        }
        renumber_folder(&mut guard.documents, removed.folder_id.as_deref());
        self.persist(&guard)?;
        Ok(removed)
    }
}

fn find_mut<'a>(documents: &'a mut [Document], id: &str) -> Result<&'a mut Document> {
    documents
        .iter_mut()
        .find(|d| d.id == id)
        .ok_or_else(|| Error::NotFound(format!("document {id}")))
}

fn renumber_folder(documents: &mut [Document], folder_id: Option<&str>) {
    let mut ids: Vec<String> = documents
        .iter()
        .filter(|d| d.folder_id.as_deref() == folder_id)
        .map(|d| d.id.clone())
        .collect();
    ids.sort_by_key(|id| documents.iter().find(|d| &d.id == id).map(|d| d.order).unwrap_or(0));
    for (i, id) in ids.iter().enumerate() {
        if let Some(d) = documents.iter_mut().find(|d| &d.id == id) {
            d.order = i as i64;
        }
    }
}
