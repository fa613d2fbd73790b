use serde::{Deserialize, Serialize};

use crate::error::ImageError;

/// Interleaving of the samples in a [`RasterImage`].
///
/// The canonical color order is R, G, B. Blue-first data from a host
/// surface is converted with [`RasterImage::from_bgr`] / [`RasterImage::to_bgr`]
/// and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelLayout {
    Gray,
    Rgb,
}

impl PixelLayout {
    pub const fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }
}

/// 8-bit raster image.
///
/// Pixel data is stored row-major, interleaved according to `layout`.
/// There are no mutating accessors: every transformation produces a new
/// buffer, so a raster can be shared behind an `Arc` freely.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn expected_len(width: u32, height: u32, layout: PixelLayout) -> usize {
    width as usize * height as usize * layout.channels()
}

impl RasterImage {
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let expected = expected_len(width, height, layout);
        if data.len() != expected {
            return Err(ImageError::DataLength {
                width,
                height,
                layout,
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// Solid image with every sample set to `value`.
    pub fn filled(width: u32, height: u32, layout: PixelLayout, value: u8) -> Self {
        Self {
            width,
            height,
            layout,
            data: vec![value; expected_len(width, height, layout)],
        }
    }

    /// Build an RGB raster from blue-first interleaved bytes.
    pub fn from_bgr(width: u32, height: u32, mut data: Vec<u8>) -> Result<Self, ImageError> {
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Self::new(width, height, PixelLayout::Rgb, data)
    }

    /// Crate-internal constructor for buffers whose length is correct by
    /// construction.
    pub(crate) fn from_vec(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), expected_len(width, height, layout));
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Samples of the pixel at (x, y). Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let c = self.channels();
        let idx = (y as usize * self.width as usize + x as usize) * c;
        &self.data[idx..idx + c]
    }

    /// Apply a per-sample lookup table, keeping the layout.
    pub fn map_lut(&self, lut: &[u8; 256]) -> Self {
        let data = self.data.iter().map(|&v| lut[v as usize]).collect();
        Self::from_vec(self.width, self.height, self.layout, data)
    }

    /// Luma (BT.601, 14-bit fixed point). Gray input is copied.
    pub fn to_gray(&self) -> Self {
        match self.layout {
            PixelLayout::Gray => self.clone(),
            PixelLayout::Rgb => {
                let data = self
                    .data
                    .chunks_exact(3)
                    .map(|px| luma_u8(px[0], px[1], px[2]))
                    .collect();
                Self::from_vec(self.width, self.height, PixelLayout::Gray, data)
            }
        }
    }

    /// RGB copy; gray samples are replicated into all three channels.
    pub fn to_rgb(&self) -> Self {
        match self.layout {
            PixelLayout::Rgb => self.clone(),
            PixelLayout::Gray => {
                let mut data = Vec::with_capacity(self.data.len() * 3);
                for &v in &self.data {
                    data.extend_from_slice(&[v, v, v]);
                }
                Self::from_vec(self.width, self.height, PixelLayout::Rgb, data)
            }
        }
    }

    /// Blue-first interleaved bytes for hosts that expect that order.
    pub fn to_bgr(&self) -> Vec<u8> {
        let mut data = self.to_rgb().into_raw();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        data
    }
}

/// BT.601 luma with the same rounding as common 8-bit implementations.
pub(crate) fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_dimensions() {
        let img = RasterImage::filled(100, 50, PixelLayout::Rgb, 0);
        assert_eq!(img.data().len(), 100 * 50 * 3);
        assert_eq!(img.pixel_count(), 5000);
        assert_eq!(img.channels(), 3);
    }

    #[test]
    fn new_validates_length() {
        assert!(RasterImage::new(2, 2, PixelLayout::Rgb, vec![0; 12]).is_ok());
        assert!(RasterImage::new(2, 2, PixelLayout::Gray, vec![0; 4]).is_ok());

        let err = RasterImage::new(2, 2, PixelLayout::Rgb, vec![0; 10]).unwrap_err();
        assert_eq!(
            err,
            ImageError::DataLength {
                width: 2,
                height: 2,
                layout: PixelLayout::Rgb,
                expected: 12,
                found: 10,
            }
        );
    }

    #[test]
    fn zero_dimensions_are_empty() {
        let img = RasterImage::new(0, 0, PixelLayout::Rgb, vec![]).unwrap();
        assert!(img.is_empty());
    }

    #[test]
    fn bgr_boundary_swaps_channels() {
        let img = RasterImage::from_bgr(1, 1, vec![10, 20, 30]).unwrap();
        assert_eq!(img.pixel(0, 0), &[30, 20, 10]);
        assert_eq!(img.to_bgr(), vec![10, 20, 30]);
    }

    #[test]
    fn gray_of_neutral_pixel_keeps_value() {
        let img = RasterImage::filled(2, 2, PixelLayout::Rgb, 128);
        let gray = img.to_gray();
        assert_eq!(gray.layout(), PixelLayout::Gray);
        assert!(gray.data().iter().all(|&v| v == 128));
    }

    #[test]
    fn gray_weights_favor_green() {
        let red = RasterImage::new(1, 1, PixelLayout::Rgb, vec![255, 0, 0]).unwrap();
        let green = RasterImage::new(1, 1, PixelLayout::Rgb, vec![0, 255, 0]).unwrap();
        assert_eq!(red.to_gray().data()[0], 76);
        assert_eq!(green.to_gray().data()[0], 150);
    }

    #[test]
    fn rgb_from_gray_replicates() {
        let gray = RasterImage::new(2, 1, PixelLayout::Gray, vec![7, 9]).unwrap();
        let rgb = gray.to_rgb();
        assert_eq!(rgb.data(), &[7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn map_lut_produces_new_buffer() {
        let img = RasterImage::filled(3, 3, PixelLayout::Gray, 10);
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = 255 - i as u8;
        }
        let out = img.map_lut(&lut);
        assert!(out.data().iter().all(|&v| v == 245));
        assert!(img.data().iter().all(|&v| v == 10));
    }
}
