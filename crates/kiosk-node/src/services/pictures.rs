//! Storage for the single "current" picture shown on the frame.

use crate::errors::NodeError;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use uuid::Uuid;

/// Largest accepted upload.
pub const MAX_PICTURE_BYTES: usize = 20 * 1024 * 1024;

/// Writes uploads to `<dir>/current.<ext>`.
#[derive(Debug, Clone)]
pub struct PictureStore {
    dir: PathBuf,
}

impl PictureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File extension for an accepted image content type.
    pub fn extension_for(content_type: &str) -> Option<&'static str> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" => Some(".jpg"),
            "image/png" => Some(".png"),
            "image/webp" => Some(".webp"),
            _ => None,
        }
    }

    /// Replace the current picture and return the URL it is served at.
    ///
    /// The bytes are written to a temporary file in the same directory and
    /// renamed into place, so readers never see a partial image.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(&self, content_type: &str, bytes: &[u8]) -> Result<String, NodeError> {
        let ext = Self::extension_for(content_type).ok_or_else(|| {
            NodeError::UnsupportedMediaType("Use JPEG/PNG/WebP".to_string())
        })?;

        if bytes.is_empty() {
            return Err(NodeError::BadRequest("Picture is empty".to_string()));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| NodeError::Storage(format!("create {}: {}", self.dir.display(), e)))?;

        let file_name = format!("current{}", ext);
        let final_path = self.dir.join(&file_name);
        let tmp_path = self.dir.join(format!(".upload-{}{}", Uuid::new_v4(), ext));

        if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(NodeError::Storage(format!(
                "write {}: {}",
                tmp_path.display(),
                e
            )));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(NodeError::Storage(format!(
                "rename to {}: {}",
                final_path.display(),
                e
            )));
        }

        let url = format!("/pics/{}", file_name);
        info!(target: "kiosk.pictures", url = %url, "Picture stored");
        Ok(url)
    }
}
