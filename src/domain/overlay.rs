use crate::domain::compositor::CompositeError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the watermark is laid over a background frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPlacement {
    /// Stretch the watermark to the full canvas and alpha-blend it.
    FullComposite,
    /// Scale the watermark to the canvas height, keeping its aspect ratio,
    /// and blend it centered.
    Centered,
}

impl FromStr for OverlayPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" | "full_composite" => Ok(Self::FullComposite),
            "center" | "centered" => Ok(Self::Centered),
            other => Err(format!("unknown overlay placement '{other}'")),
        }
    }
}

/// The watermark for one job: decoded once, then blended over every admitted
/// background image. Immutable for the lifetime of the job.
pub struct OverlaySpec {
    image: RgbaImage,
    placement: OverlayPlacement,
}

impl OverlaySpec {
    pub fn from_bytes(bytes: &[u8], placement: OverlayPlacement) -> Result<Self, CompositeError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(CompositeError::EmptyImage);
        }
        Ok(Self { image, placement })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn placement(&self) -> OverlayPlacement {
        self.placement
    }
}
