use crate::domain::timeline::{Timeline, VideoMeta};
use async_trait::async_trait;
use std::path::Path;

/// Knobs passed straight through to the video encoder.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub codec: String,
    pub pixel_format: String,
    pub fps: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: String::from("libx264"),
            pixel_format: String::from("yuv420p"),
            fps: 24,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },
    #[error("{context}: {stderr}")]
    CommandFailed { context: String, stderr: String },
    #[error("could not parse probe output: {0}")]
    Probe(String),
    #[error("failed to stage frame for encoding: {0}")]
    StageFrame(String),
    #[error("encoder scratch I/O: {0}")]
    Scratch(#[from] std::io::Error),
}

/// External video encoder, invoked once per job on the assembled timeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Probe a local video file for resolution, frame rate and duration.
    async fn probe(&self, path: &Path) -> Result<VideoMeta, EncodeError>;

    /// Render the timeline into a single video file at `out_path`.
    async fn render(
        &self,
        timeline: &Timeline,
        settings: &EncodeSettings,
        out_path: &Path,
    ) -> Result<(), EncodeError>;
}
