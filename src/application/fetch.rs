use crate::domain::asset::{Asset, ContentKind};
use crate::ports::store::AssetStore;
use std::error::Error;
use tempfile::NamedTempFile;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to allocate scratch storage: {0}")]
    Scratch(#[from] std::io::Error),
    #[error("failed to download '{locator}': {source}")]
    Transport {
        locator: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("'{0}' resolved to an empty payload")]
    EmptyPayload(String),
}

/// Materialize a locator as a local, exclusively owned asset. The backing
/// temp file lives exactly as long as the returned asset, so a failure in
/// any later stage still reclaims it.
pub async fn fetch<S: AssetStore + ?Sized>(
    store: &S,
    locator: &str,
    kind: ContentKind,
) -> Result<Asset, FetchError> {
    let staging = NamedTempFile::new()?.into_temp_path();

    store
        .download(locator, &staging)
        .await
        .map_err(|source| FetchError::Transport {
            locator: locator.to_string(),
            source,
        })?;

    let byte_size = tokio::fs::metadata(&staging).await?.len();
    if byte_size == 0 {
        return Err(FetchError::EmptyPayload(locator.to_string()));
    }

    Ok(Asset::new(locator, kind, staging, byte_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::store::MockAssetStore;

    #[tokio::test]
    async fn fetch_materializes_the_download() {
        let mut store = MockAssetStore::new();
        store
            .expect_download()
            .withf(|locator, _| locator == "vi-image/beach.png")
            .times(1)
            .returning(|_, path| {
                std::fs::write(path, b"png bytes").unwrap();
                Ok(())
            });

        let asset = fetch(&store, "vi-image/beach.png", ContentKind::Image)
            .await
            .unwrap();
        assert_eq!(asset.locator(), "vi-image/beach.png");
        assert_eq!(asset.kind(), ContentKind::Image);
        assert_eq!(asset.byte_size(), 9);
        assert_eq!(asset.read().await.unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn transport_failures_surface_the_locator() {
        let mut store = MockAssetStore::new();
        store
            .expect_download()
            .times(1)
            .returning(|_, _| Err("404 not found".into()));

        let err = fetch(&store, "vi-video/base.mp4", ContentKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(err.to_string().contains("vi-video/base.mp4"));
    }

    #[tokio::test]
    async fn an_empty_payload_is_an_error() {
        let mut store = MockAssetStore::new();
        // download "succeeds" but writes nothing
        store.expect_download().times(1).returning(|_, _| Ok(()));

        let err = fetch(&store, "vi-image/blank.png", ContentKind::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyPayload(_)));
    }
}
