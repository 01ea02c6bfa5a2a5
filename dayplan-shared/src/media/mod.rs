/// Profile image storage
///
/// # Modules
///
/// - [`renditions`]: decoding and scaling uploads with the `image` crate
/// - [`storage`]: the [`MediaStorage`] trait and its local-filesystem implementation
///
/// [`store_upload`] ties the two together: render, then write all three
/// files under a fresh `images/<uuid>/` directory.

pub mod renditions;
pub mod storage;

pub use renditions::{RenditionError, RenditionFormat, Renditions};
pub use storage::{LocalMediaStorage, MediaStorage, StorageError};

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

/// Storage paths of one upload's renditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRenditions {
    pub original: String,
    pub medium: String,
    pub small: String,
}

impl StoredRenditions {
    pub fn paths(&self) -> [&str; 3] {
        [
            self.original.as_str(),
            self.medium.as_str(),
            self.small.as_str(),
        ]
    }
}

/// Error type for [`store_upload`]
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error(transparent)]
    Rendition(#[from] RenditionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Renders an upload and writes its three files
///
/// If a write fails, files already written are removed before returning.
pub async fn store_upload(
    storage: &dyn MediaStorage,
    bytes: Bytes,
) -> Result<StoredRenditions, MediaError> {
    let renditions = renditions::render_blocking(bytes).await?;

    let dir = format!("images/{}", Uuid::new_v4());
    let ext = renditions.format.extension();
    let stored = StoredRenditions {
        original: format!("{}/original.{}", dir, renditions.original_extension),
        medium: format!("{}/medium.{}", dir, ext),
        small: format!("{}/small.{}", dir, ext),
    };

    let files: [(&str, &[u8]); 3] = [
        (stored.original.as_str(), &renditions.original[..]),
        (stored.medium.as_str(), renditions.medium.as_slice()),
        (stored.small.as_str(), renditions.small.as_slice()),
    ];

    for (index, (path, data)) in files.iter().enumerate() {
        if let Err(e) = storage.save(path, data).await {
            let written: Vec<&str> = files[..index].iter().map(|(p, _)| *p).collect();
            remove_files(storage, &written).await;
            return Err(e.into());
        }
    }

    Ok(stored)
}

/// Deletes files, logging failures instead of returning them
pub async fn remove_files(storage: &dyn MediaStorage, paths: &[&str]) {
    for path in paths {
        if let Err(e) = storage.delete(path).await {
            warn!(path, error = %e, "Failed to remove media file");
        }
    }
}
