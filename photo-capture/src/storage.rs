//! Persistent storage area for captured photos
//!
//! File system work runs on the blocking pool so the event loop stays free
//! while a file is resolved, moved or removed.

use crate::provider::BoxFuture;
use std::path::{Path, PathBuf};

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    NotFound(String),
    AlreadyExists(String),
    IoError(std::io::Error),
    Other(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(path) => write!(f, "File not found: {}", path),
            StorageError::AlreadyExists(path) => write!(f, "File already exists: {}", path),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
            StorageError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

/// File system capability used by the device provider
pub trait ArtifactStorage: Send + Sync {
    /// Resolves a file URI or path to an existing file
    fn resolve<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, Result<PathBuf, StorageError>>;

    /// Moves a resolved file into persistent storage, returning its new `src`
    fn move_into_storage<'a>(
        &'a self,
        entry: PathBuf,
        internal_name: &'a str,
    ) -> BoxFuture<'a, Result<String, StorageError>>;

    fn remove<'a>(&'a self, entry: PathBuf) -> BoxFuture<'a, Result<(), StorageError>>;
}

/// Storage rooted at a directory on the local file system
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn blocking<T, F>(task: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| StorageError::Other(format!("Task join error: {}", e)))?
}

fn resolve_path(uri: &str) -> Result<PathBuf, StorageError> {
    let path = PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri));

    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Ok(path.canonicalize()?),
        Ok(_) => Err(StorageError::Other(format!("Not a regular file: {}", uri))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorageError::NotFound(uri.to_string()))
        }
        Err(e) => Err(StorageError::IoError(e)),
    }
}

fn move_file(root: &Path, entry: &Path, internal_name: &str) -> Result<String, StorageError> {
    if Path::new(internal_name).file_name() != Some(std::ffi::OsStr::new(internal_name)) {
        return Err(StorageError::Other(format!(
            "Invalid storage name: {}",
            internal_name
        )));
    }

    std::fs::create_dir_all(root)?;
    let target = root.join(internal_name);
    if target.exists() {
        return Err(StorageError::AlreadyExists(target.display().to_string()));
    }

    if let Err(e) = std::fs::rename(entry, &target) {
        // Rename fails across mount points, fall back to copy + remove
        log::debug!("Rename failed ({}), copying instead", e);
        if let Err(e) = std::fs::copy(entry, &target) {
            // copy may have created a partial target
            if target.exists() {
                if let Err(cleanup) = std::fs::remove_file(&target) {
                    log::warn!("Could not remove partial {}: {}", target.display(), cleanup);
                }
            }
            return Err(e.into());
        }
        if let Err(e) = std::fs::remove_file(entry) {
            log::warn!("Could not remove original {}: {}", entry.display(), e);
        }
    }

    Ok(target.to_string_lossy().into_owned())
}

impl ArtifactStorage for LocalFileSystem {
    fn resolve<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, Result<PathBuf, StorageError>> {
        let uri = uri.to_string();
        Box::pin(blocking(move || resolve_path(&uri)))
    }

    fn move_into_storage<'a>(
        &'a self,
        entry: PathBuf,
        internal_name: &'a str,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        let root = self.root.clone();
        let internal_name = internal_name.to_string();
        Box::pin(blocking(move || move_file(&root, &entry, &internal_name)))
    }

    fn remove<'a>(&'a self, entry: PathBuf) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(blocking(move || {
            std::fs::remove_file(&entry).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StorageError::NotFound(entry.display().to_string()),
                _ => StorageError::IoError(e),
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("IMG_001.jpg");
        std::fs::write(&file, b"jpeg").unwrap();
        let fs = LocalFileSystem::new(dir.path().join("photos"));

        let uri = format!("file://{}", file.display());
        let resolved = fs.resolve(&uri).await.unwrap();
        assert_eq!(resolved, file.canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());

        let missing = dir.path().join("nope.jpg");
        let err = fs.resolve(missing.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_move_into_storage() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("IMG_001.jpg");
        std::fs::write(&cache, b"jpeg").unwrap();
        let fs = LocalFileSystem::new(dir.path().join("photos"));

        let src = fs.move_into_storage(cache.clone(), "job-1.jpg").await.unwrap();
        let stored = PathBuf::from(&src);
        assert_eq!(stored, fs.root().join("job-1.jpg"));
        assert!(stored.exists());
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn test_move_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let photos = dir.path().join("photos");
        std::fs::create_dir_all(&photos).unwrap();
        std::fs::write(photos.join("job-1.jpg"), b"old").unwrap();
        let cache = dir.path().join("IMG_001.jpg");
        std::fs::write(&cache, b"new").unwrap();
        let fs = LocalFileSystem::new(&photos);

        let err = fs.move_into_storage(cache.clone(), "job-1.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert!(cache.exists());
        assert_eq!(std::fs::read(photos.join("job-1.jpg")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_move_rejects_path_names() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("IMG_001.jpg");
        std::fs::write(&cache, b"jpeg").unwrap();
        let fs = LocalFileSystem::new(dir.path().join("photos"));

        let err = fs.move_into_storage(cache, "../escape.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::Other(_)));
    }

    #[tokio::test]
    async fn test_failed_move_leaves_no_target() {
        let dir = tempdir().unwrap();
        let photos = dir.path().join("photos");
        let fs = LocalFileSystem::new(&photos);

        let vanished = dir.path().join("IMG_404.jpg");
        let err = fs.move_into_storage(vanished, "job-1.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::IoError(_)));
        assert!(!photos.join("job-1.jpg").exists());
    }

    #[tokio::test]
    async fn test_remove_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("job-1.jpg");
        std::fs::write(&file, b"jpeg").unwrap();
        let fs = LocalFileSystem::new(dir.path());

        fs.remove(file.clone()).await.unwrap();
        assert!(!file.exists());

        let err = fs.remove(file).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
