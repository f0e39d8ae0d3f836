//! Crash-safe replacement of cache files
//!
//! The new content is written to a temporary file next to the target, synced, and renamed
//! over the target. After a crash the file holds either the old or the new content.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::domain::DomainError;

fn temp_path(path: &Path, parent: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or("cache");
    parent.join(format!(".{}.tmp.{}", file_name, Uuid::new_v4()))
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn write_and_rename(temp: &Path, path: &Path, parent: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(temp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp, path)?;
    fsync_dir(parent)
}

/// Atomically replaces the content of `path`
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), DomainError> {
    let parent = path.parent().ok_or_else(|| {
        DomainError::storage(format!("Path has no parent directory: {}", path.display()))
    })?;

    fs::create_dir_all(parent).map_err(|e| {
        DomainError::storage(format!(
            "Failed to create directory {}: {}",
            parent.display(),
            e
        ))
    })?;

    let temp = temp_path(path, parent);
    write_and_rename(&temp, path, parent, data).map_err(|e| {
        let _ = fs::remove_file(&temp);
        DomainError::storage(format!("Failed to write {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        atomic_write(&path, b"old").unwrap();
        atomic_write(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        atomic_write(&path, b"{}").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["cache.json"]);
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        atomic_write(&path, b"{}").unwrap();

        assert!(path.exists());
    }
}
