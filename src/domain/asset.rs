use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::TempPath;

/// What a locator points at. Decided once at ingestion and carried through
/// the pipeline as data, instead of re-deriving it from file extensions at
/// every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Image,
    Video,
}

impl ContentKind {
    /// File extensions accepted for this kind of content.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ContentKind::Image => &["png", "jpg", "jpeg", "gif"],
            ContentKind::Video => &["mp4", "mov", "mkv", "webm"],
        }
    }

    pub fn matches_extension(self, file_name: &str) -> bool {
        file_name
            .rsplit_once('.')
            .map(|(_, ext)| {
                let ext = ext.to_ascii_lowercase();
                self.extensions().contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

/// A remote reference materialized as a local, exclusively owned temp file.
///
/// The backing file is deleted when the asset drops, so whichever way a job
/// ends, consumed scratch storage is reclaimed with it.
#[derive(Debug)]
pub struct Asset {
    locator: String,
    kind: ContentKind,
    byte_size: u64,
    local: TempPath,
}

impl Asset {
    pub fn new(
        locator: impl Into<String>,
        kind: ContentKind,
        local: TempPath,
        byte_size: u64,
    ) -> Self {
        Self {
            locator: locator.into(),
            kind,
            byte_size,
            local,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn path(&self) -> &Path {
        &self.local
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_asset(kind: ContentKind, contents: &[u8]) -> Asset {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        let size = contents.len() as u64;
        Asset::new("folder/item", kind, file.into_temp_path(), size)
    }

    #[test]
    fn image_extensions_match_case_insensitively() {
        assert!(ContentKind::Image.matches_extension("photo.PNG"));
        assert!(ContentKind::Image.matches_extension("photo.jpeg"));
        assert!(!ContentKind::Image.matches_extension("clip.mp4"));
        assert!(!ContentKind::Image.matches_extension("no_extension"));
    }

    #[test]
    fn video_extensions_match() {
        assert!(ContentKind::Video.matches_extension("clip.mp4"));
        assert!(!ContentKind::Video.matches_extension("photo.png"));
    }

    #[tokio::test]
    async fn asset_reads_back_its_contents() {
        let asset = temp_asset(ContentKind::Image, b"pixels");
        assert_eq!(asset.byte_size(), 6);
        assert_eq!(asset.read().await.unwrap(), b"pixels");
    }

    #[test]
    fn dropping_an_asset_removes_the_backing_file() {
        let asset = temp_asset(ContentKind::Video, b"clip");
        let path = asset.path().to_path_buf();
        assert!(path.exists());
        drop(asset);
        assert!(!path.exists());
    }
}
