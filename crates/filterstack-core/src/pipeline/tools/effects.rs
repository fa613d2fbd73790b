use crate::error::ProcessingError;
use crate::params::ParamSpec;
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::RasterImage;

use super::adjust::build_lut;
use super::kernel::{ensure_not_empty, ensure_window_fits, laplacian, map_planes, window_param};

const FLIP_DIRECTIONS: &[&str] = &["horizontal", "vertical", "both"];

declare_tool!(
    /// Scales every sample down by `amount`.
    DarkenImage,
    [ParamSpec::float("amount", 0.2, 0.0, 1.0)]
);

impl Tool for DarkenImage {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let keep = 1.0 - self.params.get_float("amount")? as f32;
        Ok(image.map_lut(&build_lut(|v| v * keep)))
    }
}

declare_tool!(
    /// Mirrors the image around the vertical axis, the horizontal axis or
    /// both.
    FlippingMirroring,
    [ParamSpec::choice("direction", "horizontal", FLIP_DIRECTIONS)]
);

impl Tool for FlippingMirroring {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let (mirror_x, mirror_y) = match self.params.get_choice("direction")? {
            "horizontal" => (true, false),
            "vertical" => (false, true),
            _ => (true, true),
        };

        let (w, h) = (image.width() as usize, image.height() as usize);
        let cn = image.channels();
        let src = image.data();
        let mut data = Vec::with_capacity(src.len());
        for y in 0..h {
            let sy = if mirror_y { h - 1 - y } else { y };
            for x in 0..w {
                let sx = if mirror_x { w - 1 - x } else { x };
                let idx = (sy * w + sx) * cn;
                data.extend_from_slice(&src[idx..idx + cn]);
            }
        }

        Ok(RasterImage::from_vec(
            image.width(),
            image.height(),
            image.layout(),
            data,
        ))
    }
}

declare_tool!(
    /// Subtracts the scaled Laplacian from every channel, steepening edges.
    LaplacianSharpening,
    [
        ParamSpec::odd("kernel_size", 3, 1, 7),
        ParamSpec::positive("scale", 1.0, 0.0, 10.0),
    ]
);

impl Tool for LaplacianSharpening {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let size = window_param(&self.params, "kernel_size")?;
        ensure_window_fits(image, size)?;
        let scale = self.params.get_float("scale")? as f32;
        Ok(map_planes(image, |plane| {
            plane.zip(&laplacian(plane, size), |v, lap| v - scale * lap)
        }))
    }
}

declare_tool!(
    /// Quantizes every sample to `levels` evenly spaced values.
    Posterization,
    [ParamSpec::int("levels", 4, 2, 8)]
);

impl Tool for Posterization {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let step = 255.0 / (self.params.get_int("levels")? - 1) as f32;
        Ok(image.map_lut(&build_lut(|v| (v / step).round() * step)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use crate::pipeline::tools::test_support::{configured, gray_from_fn, rgb_from_fn};
    use crate::raster::PixelLayout;

    #[test]
    fn darken_default_keeps_eighty_percent() {
        let img = RasterImage::filled(2, 2, PixelLayout::Rgb, 100);
        let out = DarkenImage::new().apply(&img).unwrap();
        assert!(out.data().iter().all(|&v| v == 80));
    }

    #[test]
    fn darken_full_is_black() {
        let tool = configured(DarkenImage::new(), &[("amount", ParamValue::Float(1.0))]);
        let img = RasterImage::filled(2, 2, PixelLayout::Gray, 200);
        assert!(tool.apply(&img).unwrap().data().iter().all(|&v| v == 0));
    }

    #[test]
    fn flip_horizontal_mirrors_columns() {
        let img = rgb_from_fn(3, 1, |x, _| [x as u8, 0, 0]);
        let out = FlippingMirroring::new().apply(&img).unwrap();
        assert_eq!(out.data(), &[2, 0, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn flip_vertical_and_both() {
        let img = gray_from_fn(2, 2, |x, y| (y * 2 + x) as u8);
        let vertical = configured(FlippingMirroring::new(), &[("direction", "vertical".into())]);
        assert_eq!(vertical.apply(&img).unwrap().data(), &[2, 3, 0, 1]);

        let both = configured(FlippingMirroring::new(), &[("direction", "both".into())]);
        assert_eq!(both.apply(&img).unwrap().data(), &[3, 2, 1, 0]);
    }

    #[test]
    fn flip_twice_is_identity() {
        let img = gray_from_fn(5, 3, |x, y| (x * 10 + y) as u8);
        let tool = configured(FlippingMirroring::new(), &[("direction", "both".into())]);
        let twice = tool.apply(&tool.apply(&img).unwrap()).unwrap();
        assert_eq!(twice, img);
    }

    #[test]
    fn sharpening_flat_is_identity() {
        let img = RasterImage::filled(5, 5, PixelLayout::Rgb, 60);
        assert_eq!(LaplacianSharpening::new().apply(&img).unwrap(), img);
    }

    #[test]
    fn sharpening_brightens_bright_side_of_edge() {
        let img = gray_from_fn(8, 8, |x, _| if x < 4 { 50 } else { 150 });
        let tool = configured(LaplacianSharpening::new(), &[("kernel_size", ParamValue::Int(1))]);
        let out = tool.apply(&img).unwrap();
        assert!(out.pixel(3, 4)[0] < 50);
        assert!(out.pixel(4, 4)[0] > 150);
    }

    #[test]
    fn posterize_levels() {
        let img = RasterImage::new(4, 1, PixelLayout::Gray, vec![0, 40, 130, 250]).unwrap();
        let out = Posterization::new().apply(&img).unwrap();
        assert_eq!(out.data(), &[0, 0, 170, 255]);

        let two = configured(Posterization::new(), &[("levels", ParamValue::Int(2))]);
        assert_eq!(two.apply(&img).unwrap().data(), &[0, 0, 255, 255]);
    }
}
