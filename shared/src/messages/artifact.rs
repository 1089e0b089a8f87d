//! Atomic JSON artifact persistence

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::{SharedError, SharedResult};

fn io_error(path: &Path, source: std::io::Error) -> SharedError {
    SharedError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize `value` as pretty JSON and replace `path` atomically
///
/// The payload goes to a sibling temp file which is synced and renamed over
/// the target, so readers see either the old or the new document.
pub fn atomic_write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> SharedResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| SharedError::SerializationError {
        message: format!("{} ({e})", path.display()),
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
    }

    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("artifact");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));

    let mut file = fs::File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
    file.write_all(&bytes).map_err(|e| io_error(&tmp, e))?;
    file.sync_all().map_err(|e| io_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Read and deserialize a JSON artifact
pub fn read_json<T: DeserializeOwned>(path: &Path) -> SharedResult<T> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SharedError::ArtifactMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(io_error(path, e)),
    };

    serde_json::from_slice(&content).map_err(|e| SharedError::DeserializationError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("state.json");

        atomic_write_json(&path, &json!({"generation": 1})).unwrap();
        atomic_write_json(&path, &json!({"generation": 2})).unwrap();

        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value["generation"], 2);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_read_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let result: SharedResult<serde_json::Value> = read_json(&temp.path().join("absent.json"));
        assert!(matches!(result, Err(SharedError::ArtifactMissing { .. })));
    }

    #[test]
    fn test_read_corrupt_artifact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corrupt.json");
        fs::write(&path, b"{\"truncated\": ").unwrap();

        let result: SharedResult<serde_json::Value> = read_json(&path);
        assert!(matches!(result, Err(SharedError::DeserializationError { .. })));
    }
}
