//! A host backed by a local directory
//!
//! Files are addressed by file key relative to the directory root. A lookup
//! of attachment `field` on record `id` of app `app` reads
//! `records/<app>-<id>.json` and returns its first attached file key.

use async_trait::async_trait;
use invoice_layout::{Host, LayoutError, Record};
use std::path::{Component, Path, PathBuf};

pub struct DirectoryHost {
    root: PathBuf,
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl DirectoryHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            #[cfg(feature = "http")]
            client: reqwest::Client::new(),
        }
    }

    /// Resolve a file key inside the root, refusing keys that climb out of it
    fn path_for(&self, file_key: &str) -> Result<PathBuf, LayoutError> {
        let relative = Path::new(file_key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if file_key.is_empty() || escapes {
            return Err(LayoutError::Fetch(format!("invalid file key: {}", file_key)));
        }
        Ok(self.root.join(relative))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, LayoutError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| LayoutError::Fetch(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl Host for DirectoryHost {
    async fn fetch_file_bytes(&self, file_key: &str) -> Result<Vec<u8>, LayoutError> {
        let path = self.path_for(file_key)?;
        tracing::debug!(path = %path.display(), "reading asset");
        self.read(&path).await
    }

    async fn fetch_record_field(
        &self,
        app_id: u64,
        record_id: u64,
        field_key: &str,
    ) -> Result<Option<String>, LayoutError> {
        let path = self
            .root
            .join("records")
            .join(format!("{}-{}.json", app_id, record_id));
        if !path.exists() {
            return Ok(None);
        }
        let bytes = self.read(&path).await?;
        let record: Record = serde_json::from_slice(&bytes)
            .map_err(|e| LayoutError::Fetch(format!("{}: {}", path.display(), e)))?;
        Ok(record.first_file_key(field_key))
    }

    #[cfg(feature = "http")]
    async fn fetch_remote_bytes(&self, url: &str) -> Result<Vec<u8>, LayoutError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LayoutError::Fetch(format!("GET {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(LayoutError::Fetch(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LayoutError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "http"))]
    async fn fetch_remote_bytes(&self, url: &str) -> Result<Vec<u8>, LayoutError> {
        Err(LayoutError::Fetch(format!(
            "cannot fetch {}: built without the http feature",
            url
        )))
    }
}
