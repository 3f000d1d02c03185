//! File operations
//!
//! List, read, write, and delete on already-resolved absolute paths.
//! Writes go to a temp file first and are renamed into place so a partial
//! file is never observable.

use log::info;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::StorageError;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
}

/// Lists the contents of a directory, name plus is-directory flag.
pub fn list_directory(path: &Path) -> Result<Vec<EntryInfo>, StorageError> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(StorageError::NotADirectory(path.display().to_string()));
    }

    let mut entries = vec![];
    for entry in fs::read_dir(path)?.flatten() {
        let metadata = entry.metadata()?;
        entries.push(EntryInfo {
            name: entry.file_name().to_string_lossy().to_string(),
            is_dir: metadata.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

pub fn read_file(path: &Path) -> Result<Vec<u8>, StorageError> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.display().to_string()));
    }
    if !path.is_file() {
        return Err(StorageError::NotAFile(path.display().to_string()));
    }
    Ok(fs::read(path)?)
}

/// Atomic write: bytes land in a sibling temp file which is renamed over
/// the destination. The parent directory must already exist.
pub fn write_file(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            return Err(StorageError::NotFound(parent.display().to_string()));
        }
        if !parent.is_dir() {
            return Err(StorageError::NotADirectory(parent.display().to_string()));
        }
    }

    let temp = temp_path(path);
    fs::write(&temp, content)?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(StorageError::from(e));
    }
    info!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// Recursive delete. Deleting a missing path is an error, not a silent
/// success.
pub fn delete_entry(path: &Path) -> Result<(), StorageError> {
    let metadata = fs::symlink_metadata(path)
        .map_err(|_| StorageError::NotFound(path.display().to_string()))?;

    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    info!("Deleted {}", path.display());
    Ok(())
}

/// Sibling temp path used for atomic writes and streamed uploads.
pub fn temp_path(path: &Path) -> std::path::PathBuf {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    path.with_extension(format!("{}.tmp", ext))
}
