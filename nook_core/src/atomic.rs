//! Write-tmp + fsync + rename helpers shared by every JSON sidecar file
//! (`index.json`, `documents/{id}.json`, `settings.json`, `tags.json`,
//! `rag_config.json`). See spec.md §6: "All JSON writes use write-tmp +
//! fsync + rename."

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Serialize `value` and atomically replace the file at `path`.
///
/// The write goes to `{path}.tmp` first, is fsync'd, then renamed over the
/// destination. A crash between the tmp write and the rename leaves the
/// previous file untouched; a crash after the rename leaves the new file
/// intact. There is no window where `path` is observed half-written.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    let bytes = serde_json::to_vec_pretty(value)?;
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read and deserialize a JSON sidecar file, mapping absence to `NotFound`
/// rather than an `Io` error so callers can distinguish "never created" from
/// "disk failure".
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!("{}", path.display()))
        } else {
            Error::Io(e)
        }
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Corruption(format!("{}: {e}", path.display())))
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tmp.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn atomic_write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/index.json");
        write_json_atomic(&path, &json!({"a": 1})).unwrap();
        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
