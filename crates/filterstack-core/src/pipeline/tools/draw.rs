//! Overlay drawing for the detection tools. Shapes are clipped to the
//! canvas.

use std::f32::consts::TAU;

use crate::raster::{PixelLayout, RasterImage};

pub(crate) const GREEN: [u8; 3] = [0, 255, 0];

/// RGB copy of an image to draw detections on.
pub(crate) struct Canvas {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Canvas {
    pub fn from_image(image: &RasterImage) -> Self {
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data: image.to_rgb().into_raw(),
        }
    }

    pub fn put(&mut self, x: isize, y: isize, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return;
        }
        let idx = (y as usize * self.width + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&color);
    }

    /// `thickness`-wide square centered on `(x, y)`.
    fn dot(&mut self, x: isize, y: isize, thickness: usize, color: [u8; 3]) {
        let lo = -(thickness as isize / 2);
        let hi = lo + thickness.max(1) as isize;
        for dy in lo..hi {
            for dx in lo..hi {
                self.put(x + dx, y + dy, color);
            }
        }
    }

    /// Bresenham segment between two inclusive endpoints.
    pub fn line(
        &mut self,
        (x0, y0): (isize, isize),
        (x1, y1): (isize, isize),
        thickness: usize,
        color: [u8; 3],
    ) {
        let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
        let (sx, sy) = ((x1 - x0).signum(), (y1 - y0).signum());
        let (mut x, mut y) = (x0, y0);
        let mut err = dx + dy;
        loop {
            self.dot(x, y, thickness, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn circle(&mut self, (cx, cy): (f32, f32), radius: f32, thickness: usize, color: [u8; 3]) {
        let samples = ((TAU * radius * 2.0).ceil() as usize).max(8);
        for i in 0..samples {
            let a = TAU * i as f32 / samples as f32;
            let x = (cx + radius * a.cos()).round() as isize;
            let y = (cy + radius * a.sin()).round() as isize;
            self.dot(x, y, thickness, color);
        }
    }

    pub fn into_image(self) -> RasterImage {
        RasterImage::from_vec(
            self.width as u32,
            self.height as u32,
            PixelLayout::Rgb,
            self.data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> Canvas {
        Canvas::from_image(&RasterImage::filled(w, h, PixelLayout::Gray, 0))
    }

    fn green_at(img: &RasterImage, x: u32, y: u32) -> bool {
        img.pixel(x, y) == GREEN
    }

    #[test]
    fn gray_input_becomes_rgb() {
        let canvas = Canvas::from_image(&RasterImage::filled(2, 2, PixelLayout::Gray, 9));
        let img = canvas.into_image();
        assert_eq!(img.layout(), PixelLayout::Rgb);
        assert!(img.data().iter().all(|&v| v == 9));
    }

    #[test]
    fn line_covers_both_endpoints() {
        let mut canvas = blank(10, 10);
        canvas.line((1, 1), (8, 5), 1, GREEN);
        let img = canvas.into_image();
        assert!(green_at(&img, 1, 1) && green_at(&img, 8, 5));
        assert!(!green_at(&img, 8, 1));
    }

    #[test]
    fn thick_lines_widen() {
        let mut canvas = blank(10, 10);
        canvas.line((0, 5), (9, 5), 2, GREEN);
        let img = canvas.into_image();
        assert!((0..10).all(|x| green_at(&img, x, 4) && green_at(&img, x, 5)));
        assert!(!green_at(&img, 0, 6));
    }

    #[test]
    fn shapes_are_clipped() {
        let mut canvas = blank(6, 6);
        canvas.circle((0.0, 0.0), 4.0, 2, GREEN);
        canvas.line((-5, -5), (20, 20), 1, GREEN);
        let img = canvas.into_image();
        assert!(green_at(&img, 4, 0) && green_at(&img, 5, 5));
    }
}
