//! Source-image probing and the derived texture metadata.

use std::path::Path;

use anyhow::{ensure, Context, Result};

/// Scale applied to the diagonal texel size to get the instanced cell radius.
const CELL_RADIUS_SCALE: f32 = 50.0;

/// Dimensions of the source texture plus the derived values the effect
/// shaders consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureMetadata {
    pub width: u32,
    pub height: u32,
    pub pixel_count: u64,
    pub inverse_width: f32,
    pub inverse_height: f32,
}

impl TextureMetadata {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "texture has degenerate geometry {width}x{height}"
        );
        Ok(Self {
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
            inverse_width: 1.0 / width as f32,
            inverse_height: 1.0 / height as f32,
        })
    }

    /// Radius, in UV units, of the quad drawn around each instanced seed.
    pub fn instancing_radius(&self) -> f32 {
        let diagonal = (self.inverse_width * self.inverse_width
            + self.inverse_height * self.inverse_height)
            .sqrt();
        diagonal * CELL_RADIUS_SCALE
    }
}

/// A decoded source image, converted to RGBA for upload.
pub struct ProbedImage {
    pub pixels: Vec<u8>,
    pub metadata: TextureMetadata,
}

/// Decodes the image at `path` and derives its metadata.
pub fn probe_image(path: &Path) -> Result<ProbedImage> {
    let decoded = image::open(path)
        .with_context(|| format!("failed to open image at {}", path.display()))?;
    let rgba = decoded.into_rgba8();
    let (width, height) = rgba.dimensions();
    let metadata = TextureMetadata::new(width, height)?;
    tracing::debug!(
        path = %path.display(),
        width,
        height,
        pixel_count = metadata.pixel_count,
        "probed source image"
    );
    Ok(ProbedImage {
        pixels: rgba.into_raw(),
        metadata,
    })
}

/// Reads only the image header to report dimensions, without decoding or
/// retaining pixel data.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path)
        .with_context(|| format!("failed to read image header at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_derives_from_geometry() {
        let metadata = TextureMetadata::new(512, 256).unwrap();
        assert_eq!(metadata.width, 512);
        assert_eq!(metadata.height, 256);
        assert_eq!(metadata.pixel_count, 131_072);
        assert_eq!(metadata.inverse_width, 1.0 / 512.0);
        assert_eq!(metadata.inverse_height, 1.0 / 256.0);
    }

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(TextureMetadata::new(0, 256).is_err());
        assert!(TextureMetadata::new(512, 0).is_err());
    }

    #[test]
    fn instancing_radius_tracks_texel_diagonal() {
        let square = TextureMetadata::new(100, 100).unwrap();
        let expected = (2.0f32 / (100.0 * 100.0)).sqrt() * 50.0;
        assert!((square.instancing_radius() - expected).abs() < 1e-6);
    }
}
