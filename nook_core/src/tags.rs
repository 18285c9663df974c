//! Tag colors, pinning, and collapse state (spec.md §3, §6 `tags.json`).
//! Tag counts are derived from `DocumentRepo`, never stored here.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::atomic::{read_json, write_json_atomic};
use crate::error::{Error, Result};
use crate::path_layout::PathLayout;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct TagFile {
    tags: Vec<Tag>,
}

pub struct TagStore {
    layout: PathLayout,
    tags: RwLock<Vec<Tag>>,
}

impl TagStore {
    pub fn open(layout: PathLayout) -> Result<Self> {
        let tags = match read_json::<TagFile>(&layout.tags_json()) {
            Ok(file) => file.tags,
            Err(Error::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            layout,
            tags: RwLock::new(tags),
        })
    }

    fn persist(&self, tags: &[Tag]) -> Result<()> {
        write_json_atomic(
            &self.layout.tags_json(),
            &TagFile { tags: tags.to_vec() },
        )
    }

    pub fn list(&self) -> Vec<Tag> {
        self.tags.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Insert the tag if it isn't already known (idempotent, like a set).
    pub fn ensure(&self, name: &str) -> Result<Tag> {
        let mut guard = self.tags.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(tag) = guard.iter().find(|t| t.name == name) {
            return Ok(tag.clone());
        }
        let tag = Tag {
            name: name.to_string(),
            color: None,
            is_pinned: false,
            collapsed: false,
            order: None,
        };
        guard.push(tag.clone());
        self.persist(&guard)?;
        Ok(tag)
    }

    pub fn set_color(&self, name: &str, color: Option<String>) -> Result<Tag> {
        self.mutate(name, |t| t.color = color)
    }

    pub fn pin(&self, name: &str, order: i64) -> Result<Tag> {
        self.mutate(name, |t| {
            t.is_pinned = true;
            t.order = Some(order);
        })
    }

    pub fn unpin(&self, name: &str) -> Result<Tag> {
        self.mutate(name, |t| {
            t.is_pinned = false;
            t.order = None;
        })
    }

    pub fn set_collapsed(&self, name: &str, collapsed: bool) -> Result<Tag> {
        self.mutate(name, |t| t.collapsed = collapsed)
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<Tag> {
        let mut guard = self.tags.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tag = guard
            .iter_mut()
            .find(|t| t.name == old_name)
            .ok_or_else(|| Error::NotFound(format!("tag {old_name}")))?;
        tag.name = new_name.to_string();
        let updated = tag.clone();
        self.persist(&guard)?;
        Ok(updated)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let mut guard = self.tags.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.retain(|t| t.name != name);
        self.persist(&guard)
    }

    fn mutate(&self, name: &str, f: impl FnOnce(&mut Tag)) -> Result<Tag> {
        let mut guard = self.tags.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tag = guard
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::NotFound(format!("tag {name}")))?;
        f(tag);
        let updated = tag.clone();
        self.persist(&guard)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TagStore {
        let dir = tempfile::tempdir().unwrap();
        TagStore::open(PathLayout::new(dir.into_path())).unwrap()
    }

    #[test]
    fn ensure_is_idempotent() {
        let store = store();
        store.ensure("work").unwrap();
        store.ensure("work").unwrap();
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn pin_then_unpin() {
        let store = store();
        store.ensure("work").unwrap();
        let tag = store.pin("work", 0).unwrap();
        assert!(tag.is_pinned);
        let tag = store.unpin("work").unwrap();
        assert!(!tag.is_pinned);
    }
}
