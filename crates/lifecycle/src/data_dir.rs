//! Instance data directories on the host filesystem.

use std::io;
use std::path::{Path, PathBuf};

use fleet_core::retention::bytes_to_mb;

/// Create the data directory if needed and return its absolute path, as
/// required for a bind mount.
pub async fn ensure(path: &Path) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(path).await?;
    tokio::fs::canonicalize(path).await
}

/// Remove a data directory and everything in it. A directory that is
/// already gone counts as removed.
pub async fn remove(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Approximate size of a data directory in whole megabytes.
///
/// Best-effort: any failure is logged and reported as 0.
pub async fn estimate_size_mb(path: &Path) -> i64 {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || dir_size_bytes(&owned)).await {
        Ok(Ok(bytes)) => bytes_to_mb(bytes),
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to measure data directory");
            0
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Data directory size task failed");
            0
        }
    }
}

/// Total size of regular files below `path`. Symlinks are not followed.
fn dir_size_bytes(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                total += entry.metadata()?.len();
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_creates_nested_dirs() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("alice").join("my-db");

        let abs = ensure(&path).await.unwrap();
        assert!(abs.is_absolute());
        assert!(abs.is_dir());

        // Idempotent.
        ensure(&path).await.unwrap();
    }

    #[tokio::test]
    async fn remove_tolerates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("gone");
        remove(&path).await.unwrap();

        std::fs::create_dir_all(path.join("nested")).unwrap();
        std::fs::write(path.join("nested/data.db"), b"x").unwrap();
        remove(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn size_estimate_counts_nested_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a/b")).unwrap();
        std::fs::write(root.path().join("a/b/big"), vec![0u8; 3 * 1024 * 1024]).unwrap();
        std::fs::write(root.path().join("small"), vec![0u8; 10]).unwrap();

        assert_eq!(estimate_size_mb(root.path()).await, 3);
    }

    #[tokio::test]
    async fn size_estimate_of_missing_dir_is_zero() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(estimate_size_mb(&root.path().join("nope")).await, 0);
    }
}
