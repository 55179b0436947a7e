//! services/api/src/adapters/storage.rs
//!
//! Filesystem object storage: the concrete implementation of the
//! `ImageStorageService` port. Objects land under the configured media
//! directory and are publicly reachable under `{base_url}/media/{path}`,
//! which the HTTP layer serves statically.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use storybook_core::ports::{ImageStorageService, PortError, PortResult, StoredObject};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Storage key for a page illustration, namespaced by story and page.
pub fn page_image_path(story_id: Uuid, page_id: Uuid) -> String {
    format!("stories/{}/pages/{}/illustration.png", story_id, page_id)
}

/// Filesystem-backed image storage.
pub struct FileImageStorage {
    base_dir: PathBuf,
    public_base_url: String,
}

impl FileImageStorage {
    /// Creates the storage adapter, ensuring the media root exists.
    pub async fn new(
        base_dir: impl AsRef<Path>,
        public_base_url: impl Into<String>,
    ) -> PortResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(Self {
            base_dir,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[async_trait]
impl ImageStorageService for FileImageStorage {
    async fn upload(&self, path: &str, data: &[u8], mime_type: &str) -> PortResult<StoredObject> {
        // Storage keys are generated internally from UUIDs; reject anything
        // that could step outside the media root anyway.
        if path.split('/').any(|segment| segment == "..") || path.starts_with('/') {
            return Err(PortError::Unexpected(format!(
                "Invalid storage path '{}'",
                path
            )));
        }

        let target = self.base_dir.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }

        fs::write(&target, data)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(
            path = %path,
            size = data.len(),
            mime_type = %mime_type,
            "Stored image"
        );

        Ok(StoredObject {
            storage_path: path.to_string(),
            public_url: format!("{}/media/{}", self.public_base_url, path),
        })
    }
}
