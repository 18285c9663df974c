//! Deterministic mapping from a base data directory to the on-disk layout
//! described in spec.md §6 (`<home>/.Nook/...`).

use std::path::{Path, PathBuf};

/// Resolves every on-disk path Nook touches, rooted at a single base
/// directory. Keeping this in one place means every component agrees on
/// where things live without needing to know about each other.
#[derive(Debug, Clone)]
pub struct PathLayout {
    base: PathBuf,
}

impl PathLayout {
    /// Build a layout rooted at `base` (typically `<home>/.Nook`).
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    /// The default layout, rooted at `~/.Nook`. Falls back to `./.Nook` if
    /// the home directory cannot be resolved.
    pub fn default_layout() -> Self {
        let base = dirs_home().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(".Nook"))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn index_json(&self) -> PathBuf {
        self.base.join("index.json")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.base.join("documents")
    }

    pub fn document_blob(&self, id: &str) -> PathBuf {
        self.documents_dir().join(format!("{id}.json"))
    }

    pub fn settings_json(&self) -> PathBuf {
        self.base.join("settings.json")
    }

    pub fn tags_json(&self) -> PathBuf {
        self.base.join("tags.json")
    }

    pub fn rag_config_json(&self) -> PathBuf {
        self.base.join("rag_config.json")
    }

    pub fn vectors_db(&self) -> PathBuf {
        self.base.join("vectors.db")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.base.join("images")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.base.join("files")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.base.join("temp")
    }

    /// Create every directory this layout names, if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.base.clone(),
            self.documents_dir(),
            self.images_dir(),
            self.files_dir(),
            self.temp_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_rooted_at_base() {
        let layout = PathLayout::new("/tmp/nook-test");
        assert_eq!(layout.index_json(), Path::new("/tmp/nook-test/index.json"));
        assert_eq!(
            layout.document_blob("abc-123"),
            Path::new("/tmp/nook-test/documents/abc-123.json")
        );
        assert_eq!(layout.vectors_db(), Path::new("/tmp/nook-test/vectors.db"));
    }
}
