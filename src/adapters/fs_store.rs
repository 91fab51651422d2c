use crate::domain::asset::ContentKind;
use crate::ports::store::AssetStore;
use async_trait::async_trait;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Directory-backed store for local and single-server deployments. A
/// locator is the object's path relative to the store root, e.g.
/// `vi-image/beach.png`.
#[derive(Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, locator: &str) -> PathBuf {
        self.root.join(locator)
    }
}

#[async_trait]
impl AssetStore for FsStore {
    async fn upload(
        &self,
        local_path: &Path,
        folder: &str,
        kind: ContentKind,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or("upload source has no usable file name")?;
        if !kind.matches_extension(file_name) {
            return Err(format!("'{file_name}' does not look like {kind:?} content").into());
        }

        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::copy(local_path, dir.join(file_name)).await?;
        Ok(format!("{folder}/{file_name}"))
    }

    async fn list_by_folder(
        &self,
        folder: &str,
        kind: ContentKind,
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let dir = self.root.join(folder);
        let mut locators = Vec::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(locators),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if kind.matches_extension(name) {
                    locators.push(format!("{folder}/{name}"));
                }
            }
        }

        // Listing order is part of the contract: lexicographic, so a fixed
        // input set always yields the same slideshow order.
        locators.sort();
        Ok(locators)
    }

    async fn download(
        &self,
        locator: &str,
        local_path: &Path,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(self.object_path(locator), local_path).await?;
        Ok(())
    }
}
