use crate::domain::overlay::{OverlayPlacement, OverlaySpec};
use image::imageops::{self, FilterType};
use image::RgbaImage;

#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has a zero dimension")]
    EmptyImage,
}

/// One finished slideshow still: a self-contained RGBA raster at the output
/// resolution. No further dependency on the source file it was built from.
pub struct CompositedFrame {
    pixels: RgbaImage,
}

impl CompositedFrame {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Blend the watermark over one background image at the output resolution.
///
/// `FullComposite` resizes both layers to exactly `target` and alpha-blends
/// them pixel for pixel; `Centered` scales the watermark to the target
/// height, keeping its aspect ratio, and blends it at the canvas center.
/// Lanczos3 resampling throughout. Identical inputs yield a pixel-identical
/// raster.
pub fn composite(
    background: &[u8],
    overlay: &OverlaySpec,
    target: (u32, u32),
) -> Result<CompositedFrame, CompositeError> {
    let (width, height) = target;
    if width == 0 || height == 0 {
        return Err(CompositeError::EmptyImage);
    }

    let decoded = image::load_from_memory(background)?.to_rgba8();
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(CompositeError::EmptyImage);
    }
    let mut canvas = imageops::resize(&decoded, width, height, FilterType::Lanczos3);

    match overlay.placement() {
        OverlayPlacement::FullComposite => {
            let scaled = imageops::resize(overlay.image(), width, height, FilterType::Lanczos3);
            imageops::overlay(&mut canvas, &scaled, 0, 0);
        }
        OverlayPlacement::Centered => {
            let source = overlay.image();
            let scaled_width = (f64::from(source.width()) * f64::from(height)
                / f64::from(source.height()))
            .round()
            .max(1.0) as u32;
            let scaled = imageops::resize(source, scaled_width, height, FilterType::Lanczos3);
            let x = (i64::from(width) - i64::from(scaled.width())) / 2;
            let y = (i64::from(height) - i64::from(scaled.height())) / 2;
            imageops::overlay(&mut canvas, &scaled, x, y);
        }
    }

    Ok(CompositedFrame::new(canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img.clone())
            .write_to(
                &mut std::io::Cursor::new(&mut buf),
                image::ImageFormat::Png,
            )
            .unwrap();
        buf
    }

    fn solid_png(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
        png_bytes(&RgbaImage::from_pixel(width, height, pixel))
    }

    fn overlay_spec(width: u32, height: u32, pixel: Rgba<u8>, placement: OverlayPlacement) -> OverlaySpec {
        OverlaySpec::from_bytes(&solid_png(width, height, pixel), placement).unwrap()
    }

    #[test]
    fn full_composite_output_is_exactly_target_size() {
        let background = solid_png(10, 7, Rgba([0, 0, 255, 255]));
        let overlay = overlay_spec(3, 3, Rgba([255, 0, 0, 255]), OverlayPlacement::FullComposite);

        let frame = composite(&background, &overlay, (64, 48)).unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 48));
    }

    #[test]
    fn opaque_overlay_wins_transparent_overlay_vanishes() {
        let background = solid_png(4, 4, Rgba([0, 0, 255, 255]));

        let opaque = overlay_spec(4, 4, Rgba([255, 0, 0, 255]), OverlayPlacement::FullComposite);
        let frame = composite(&background, &opaque, (4, 4)).unwrap();
        assert_eq!(frame.pixels().get_pixel(2, 2), &Rgba([255, 0, 0, 255]));

        let transparent = overlay_spec(4, 4, Rgba([255, 0, 0, 0]), OverlayPlacement::FullComposite);
        let frame = composite(&background, &transparent, (4, 4)).unwrap();
        assert_eq!(frame.pixels().get_pixel(2, 2), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn centered_overlay_covers_the_middle_not_the_edges() {
        let background = solid_png(8, 8, Rgba([0, 0, 255, 255]));
        // A square watermark on a wide canvas: scaled to canvas height, it
        // leaves the left and right flanks untouched.
        let overlay = overlay_spec(4, 4, Rgba([0, 255, 0, 255]), OverlayPlacement::Centered);

        let frame = composite(&background, &overlay, (32, 8)).unwrap();
        assert_eq!(frame.pixels().get_pixel(16, 4), &Rgba([0, 255, 0, 255]));
        assert_eq!(frame.pixels().get_pixel(0, 4), &Rgba([0, 0, 255, 255]));
        assert_eq!(frame.pixels().get_pixel(31, 4), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn compositing_is_idempotent_on_identical_inputs() {
        let background = solid_png(9, 5, Rgba([10, 20, 30, 255]));
        let overlay = overlay_spec(2, 6, Rgba([200, 100, 0, 128]), OverlayPlacement::Centered);

        let first = composite(&background, &overlay, (24, 16)).unwrap();
        let second = composite(&background, &overlay, (24, 16)).unwrap();
        assert_eq!(first.pixels().as_raw(), second.pixels().as_raw());
    }

    #[test]
    fn corrupt_background_is_a_decode_error() {
        let overlay = overlay_spec(2, 2, Rgba([0, 0, 0, 255]), OverlayPlacement::FullComposite);
        let result = composite(b"\xff\xd8garbage", &overlay, (4, 4));
        assert!(matches!(result, Err(CompositeError::Decode(_))));
    }

    #[test]
    fn zero_target_is_rejected() {
        let background = solid_png(2, 2, Rgba([0, 0, 0, 255]));
        let overlay = overlay_spec(2, 2, Rgba([0, 0, 0, 255]), OverlayPlacement::FullComposite);
        assert!(matches!(
            composite(&background, &overlay, (0, 4)),
            Err(CompositeError::EmptyImage)
        ));
    }
}
