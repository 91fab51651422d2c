use crate::domain::asset::ContentKind;
use async_trait::async_trait;
use std::error::Error;
use std::path::Path;

/// Remote asset store. Listings are read-your-writes: an upload is visible
/// to `list_by_folder` as soon as the call returns.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload a local file into a folder; returns the stored locator.
    async fn upload(
        &self,
        local_path: &Path,
        folder: &str,
        kind: ContentKind,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// List locators of the given kind in a folder, in stable order.
    async fn list_by_folder(
        &self,
        folder: &str,
        kind: ContentKind,
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>>;

    /// Download a locator's bytes to a local path.
    async fn download(
        &self,
        locator: &str,
        local_path: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}
