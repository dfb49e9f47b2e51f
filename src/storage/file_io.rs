//! File helpers for the document store
//!
//! Collection files are rewritten whole on every mutation, so every write goes
//! through a temp file and a rename.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::TallyError;

/// Read a JSON file, or `T::default()` when it doesn't exist yet
pub fn read_json<T, P>(path: P) -> Result<T, TallyError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)
        .map_err(|e| TallyError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| TallyError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Replace `path` with the JSON encoding of `data`
///
/// Readers see either the old file or the new one, never a torn write.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), TallyError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            TallyError::Storage(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let temp_path = path.with_extension("json.tmp");
    let file = File::create(&temp_path)
        .map_err(|e| TallyError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, data)
        .map_err(|e| TallyError::Storage(format!("Failed to serialize {}: {}", path.display(), e)))?;
    writer
        .flush()
        .and_then(|_| writer.get_ref().sync_all())
        .map_err(|e| TallyError::Storage(format!("Failed to flush {}: {}", path.display(), e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        TallyError::Storage(format!("Failed to replace {}: {}", path.display(), e))
    })
}

/// Remove a file, treating "already gone" as success
pub fn remove_file_if_exists<P: AsRef<Path>>(path: P) -> Result<(), TallyError> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TallyError::Storage(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Remove a directory tree, treating "already gone" as success
pub fn remove_dir_if_exists<P: AsRef<Path>>(path: P) -> Result<(), TallyError> {
    let path = path.as_ref();
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TallyError::Storage(format!(
            "Failed to erase {}: {}",
            path.display(),
            e
        ))),
    }
}
