use std::path::Path;

use image::{ColorType, ImageFormat};
use tracing::{debug, info};

use crate::error::CodecError;
use crate::raster::{PixelLayout, RasterImage};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Reads and writes rasters on behalf of the pipeline.
pub trait ImageCodec {
    fn decode(&self, path: &Path) -> Result<RasterImage, CodecError>;

    fn encode(&self, image: &RasterImage, path: &Path) -> Result<(), CodecError>;
}

/// [`ImageCodec`] over the `image` crate. Decoding always yields an RGB
/// raster; encoding keeps the raster's layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec;

fn format_for(path: &Path) -> Result<ImageFormat, CodecError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "bmp" => Ok(ImageFormat::Bmp),
        "tif" | "tiff" => Ok(ImageFormat::Tiff),
        _ => Err(CodecError::UnsupportedExtension {
            path: path.to_path_buf(),
        }),
    }
}

impl ImageCodec for FileCodec {
    fn decode(&self, path: &Path) -> Result<RasterImage, CodecError> {
        format_for(path)?;
        info!(?path, "loading image file");
        let t0 = std::time::Instant::now();

        let img = image::open(path).map_err(|source| CodecError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis(),
            width = img.width(),
            height = img.height(),
            color = ?img.color(),
            "image decode"
        );

        // Alpha is dropped and gray is expanded, so every decoded raster
        // starts out as RGB.
        let rgb = img.into_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(RasterImage::new(
            width,
            height,
            PixelLayout::Rgb,
            rgb.into_raw(),
        )?)
    }

    fn encode(&self, image: &RasterImage, path: &Path) -> Result<(), CodecError> {
        let format = format_for(path)?;
        let color = match image.layout() {
            PixelLayout::Gray => ColorType::L8,
            PixelLayout::Rgb => ColorType::Rgb8,
        };
        let t0 = std::time::Instant::now();
        image::save_buffer_with_format(
            path,
            image.data(),
            image.width(),
            image.height(),
            color,
            format,
        )
        .map_err(|source| CodecError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis(),
            ?format,
            ?path,
            "image encode"
        );
        Ok(())
    }
}
