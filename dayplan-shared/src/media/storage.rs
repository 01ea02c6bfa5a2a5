/// Where rendition files live
///
/// Storage is addressed by relative paths such as
/// `images/3f1c.../medium.png`. The database keeps only these paths;
/// [`MediaStorage::url`] turns one into the URL a client fetches.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Path escapes the storage root or is empty
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage for uploaded media
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Writes `bytes` at `path`, replacing any existing file
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Removes the file at `path`; a missing file is not an error
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Public URL of the file at `path`
    fn url(&self, path: &str) -> String;
}

/// Files under a local directory, served at a URL prefix
///
/// # Example
///
/// ```no_run
/// use dayplan_shared::media::{LocalMediaStorage, MediaStorage};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = LocalMediaStorage::new("./media", "/media/");
/// storage.save("images/a/small.png", b"...").await?;
/// assert_eq!(storage.url("images/a/small.png"), "/media/images/a/small.png");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if path.is_empty() || !is_plain {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        debug!(path, size = bytes.len(), "Stored media file");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                debug!(path, "Deleted media file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> LocalMediaStorage {
        let root = std::env::temp_dir().join(format!("dayplan-media-{}", uuid::Uuid::new_v4()));
        LocalMediaStorage::new(root, "/media")
    }

    #[test]
    fn test_url_joins_prefix() {
        let storage = LocalMediaStorage::new("/srv/media", "/media");
        assert_eq!(storage.url("images/x/small.png"), "/media/images/x/small.png");

        let cdn = LocalMediaStorage::new("/srv/media", "https://cdn.example.com/m/");
        assert_eq!(cdn.url("/a.png"), "https://cdn.example.com/m/a.png");
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let storage = LocalMediaStorage::new("/srv/media", "/media/");

        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("a/./b").is_ok());
        assert!(storage.resolve("").is_err());
        assert!(storage.resolve("images/a.png").is_ok());
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let storage = temp_storage();

        storage.save("images/abc/original.png", b"data").await.unwrap();
        let on_disk = storage.root().join("images/abc/original.png");
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), b"data");

        storage.delete("images/abc/original.png").await.unwrap();
        assert!(!on_disk.exists());

        // Deleting twice is fine
        storage.delete("images/abc/original.png").await.unwrap();

        let _ = tokio::fs::remove_dir_all(storage.root()).await;
    }
}
