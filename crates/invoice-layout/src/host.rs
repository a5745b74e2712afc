//! The host platform that supplies files and records
//!
//! Every fetch is an async suspension point. Failures are fatal to the render
//! that issued them; nothing is retried.

use crate::error::LayoutError;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait Host: Send + Sync {
    /// Bytes of a stored file
    async fn fetch_file_bytes(&self, file_key: &str) -> Result<Vec<u8>, LayoutError>;

    /// File key of the first file attached to `field_key` on a record, if any
    async fn fetch_record_field(
        &self,
        app_id: u64,
        record_id: u64,
        field_key: &str,
    ) -> Result<Option<String>, LayoutError>;

    /// Plain GET of an arbitrary URL
    async fn fetch_remote_bytes(&self, url: &str) -> Result<Vec<u8>, LayoutError>;
}

/// A host backed by in-memory maps
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    files: HashMap<String, Vec<u8>>,
    attachments: HashMap<(u64, u64, String), String>,
    urls: HashMap<String, Vec<u8>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file_key: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.files.insert(file_key.into(), bytes);
        self
    }

    pub fn with_attachment(
        mut self,
        app_id: u64,
        record_id: u64,
        field_key: impl Into<String>,
        file_key: impl Into<String>,
    ) -> Self {
        self.attachments
            .insert((app_id, record_id, field_key.into()), file_key.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.urls.insert(url.into(), bytes);
        self
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn fetch_file_bytes(&self, file_key: &str) -> Result<Vec<u8>, LayoutError> {
        self.files
            .get(file_key)
            .cloned()
            .ok_or_else(|| LayoutError::Fetch(format!("file not found: {}", file_key)))
    }

    async fn fetch_record_field(
        &self,
        app_id: u64,
        record_id: u64,
        field_key: &str,
    ) -> Result<Option<String>, LayoutError> {
        Ok(self
            .attachments
            .get(&(app_id, record_id, field_key.to_string()))
            .cloned())
    }

    async fn fetch_remote_bytes(&self, url: &str) -> Result<Vec<u8>, LayoutError> {
        self.urls
            .get(url)
            .cloned()
            .ok_or_else(|| LayoutError::Fetch(format!("GET {} failed: not found", url)))
    }
}

#[cfg(feature = "http")]
pub use rest::RestHost;

#[cfg(feature = "http")]
mod rest {
    use super::Host;
    use crate::error::LayoutError;
    use crate::record::Record;
    use async_trait::async_trait;

    const API_TOKEN_HEADER: &str = "X-Cybozu-API-Token";

    /// A host reached over its REST API
    #[derive(Debug, Clone)]
    pub struct RestHost {
        client: reqwest::Client,
        base_url: String,
        api_token: Option<String>,
    }

    impl RestHost {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
                api_token: None,
            }
        }

        pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
            self.api_token = Some(token.into());
            self
        }

        async fn get(
            &self,
            url: &str,
            query: &[(&str, String)],
        ) -> Result<reqwest::Response, LayoutError> {
            let mut request = self.client.get(url).query(query);
            if let Some(token) = &self.api_token {
                request = request.header(API_TOKEN_HEADER, token);
            }
            let response = request
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
            Ok(response)
        }
    }

    #[async_trait]
    impl Host for RestHost {
        async fn fetch_file_bytes(&self, file_key: &str) -> Result<Vec<u8>, LayoutError> {
            let url = format!("{}/k/v1/file.json", self.base_url);
            let response = self.get(&url, &[("fileKey", file_key.to_string())]).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| LayoutError::Fetch(e.to_string()))?;
            Ok(bytes.to_vec())
        }

        async fn fetch_record_field(
            &self,
            app_id: u64,
            record_id: u64,
            field_key: &str,
        ) -> Result<Option<String>, LayoutError> {
            let url = format!("{}/k/v1/record.json", self.base_url);
            let response = self
                .get(&url, &[("app", app_id.to_string()), ("id", record_id.to_string())])
                .await?;
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| LayoutError::Fetch(e.to_string()))?;
            let record = Record::from_value(body.get("record").cloned().unwrap_or_default());
            Ok(record.first_file_key(field_key))
        }

        async fn fetch_remote_bytes(&self, url: &str) -> Result<Vec<u8>, LayoutError> {
            let response = self.get(url, &[]).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| LayoutError::Fetch(e.to_string()))?;
            Ok(bytes.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_host_lookups() {
        let host = MemoryHost::new()
            .with_file("abc", vec![1, 2, 3])
            .with_attachment(7, 1, "template", "abc");

        assert_eq!(host.fetch_file_bytes("abc").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(
            host.fetch_record_field(7, 1, "template").await.unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(host.fetch_record_field(7, 2, "template").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let host = MemoryHost::new();
        assert!(matches!(
            host.fetch_file_bytes("nope").await,
            Err(LayoutError::Fetch(_))
        ));
        assert!(matches!(
            host.fetch_remote_bytes("https://example.invalid/font.ttf").await,
            Err(LayoutError::Fetch(_))
        ));
    }
}
