use crate::domain::asset::ContentKind;
use crate::ports::store::AssetStore;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;
use std::path::Path;

/// Client for an HTTP object store with S3-like semantics: `PUT` writes an
/// object, `GET` on a folder returns a JSON array of keys, `GET` on an
/// object reads it back. Absolute locators are fetched as-is, so public CDN
/// URLs work for the base clip and the watermark.
#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            locator.to_string()
        } else {
            format!("{}/{}", self.base_url, locator.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl AssetStore for HttpStore {
    async fn upload(
        &self,
        local_path: &Path,
        folder: &str,
        _kind: ContentKind,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or("upload source has no usable file name")?;
        let locator = format!("{folder}/{file_name}");

        let body = tokio::fs::read(local_path).await?;
        self.client
            .put(self.object_url(&locator))
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(locator)
    }

    async fn list_by_folder(
        &self,
        folder: &str,
        kind: ContentKind,
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/{}/", self.base_url, folder.trim_matches('/'));
        let mut keys: Vec<String> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        keys.retain(|key| kind.matches_extension(key));
        keys.sort();
        Ok(keys)
    }

    async fn download(
        &self,
        locator: &str,
        local_path: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let response = self
            .client
            .get(self.object_url(locator))
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &bytes).await?;
        Ok(())
    }
}
