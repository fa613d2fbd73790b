use crate::color::{hsv_to_rgb, rgb_to_hsv, to_u8};
use crate::error::{ProcessingError, ValidationError};
use crate::params::{ParamSet, ParamSpec};
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::{PixelLayout, RasterImage};

use super::adjust::build_lut;
use super::kernel::{ensure_not_empty, require_rgb};

/// Map every RGB pixel through `f`, keeping the layout.
fn map_rgb(image: &RasterImage, f: impl Fn([f32; 3]) -> [f32; 3]) -> RasterImage {
    let mut data = Vec::with_capacity(image.data().len());
    for px in image.data().chunks_exact(3) {
        let out = f([px[0] as f32, px[1] as f32, px[2] as f32]);
        data.extend(out.map(to_u8));
    }
    RasterImage::from_vec(image.width(), image.height(), PixelLayout::Rgb, data)
}

/// Rewrite the HSV representation of every pixel. Samples are scaled to
/// `[0, 1]` for the conversion.
fn map_hsv(image: &RasterImage, f: impl Fn(f32, f32, f32) -> (f32, f32, f32)) -> RasterImage {
    map_rgb(image, |[r, g, b]| {
        let (h, s, v) = rgb_to_hsv(r / 255.0, g / 255.0, b / 255.0);
        let (h, s, v) = f(h, s, v);
        let (r, g, b) = hsv_to_rgb(h, s, v);
        [r * 255.0, g * 255.0, b * 255.0]
    })
}

declare_tool!(
    /// Independent gain per color channel.
    ColorBalancing,
    [
        ParamSpec::float("red", 1.0, 0.0, 2.0),
        ParamSpec::float("green", 1.0, 0.0, 2.0),
        ParamSpec::float("blue", 1.0, 0.0, 2.0),
    ]
);

impl Tool for ColorBalancing {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        require_rgb(image)?;
        let gains = [
            self.params.get_float("red")? as f32,
            self.params.get_float("green")? as f32,
            self.params.get_float("blue")? as f32,
        ];
        Ok(map_rgb(image, |px| {
            [px[0] * gains[0], px[1] * gains[1], px[2] * gains[2]]
        }))
    }
}

declare_tool!(
    /// Weighted sum of the color channels into a single gray channel.
    GrayscaleConversion,
    [
        ParamSpec::float("red_weight", 0.299, 0.0, 1.0),
        ParamSpec::float("green_weight", 0.587, 0.0, 1.0),
        ParamSpec::float("blue_weight", 0.114, 0.0, 1.0),
    ]
);

impl Tool for GrayscaleConversion {
    tool_state!();

    fn check(&self, candidate: &ParamSet) -> Result<(), ValidationError> {
        let sum: f64 = ["red_weight", "green_weight", "blue_weight"]
            .iter()
            .map(|name| candidate.get_float(name).unwrap_or(0.0))
            .sum();
        if (sum - 1.0).abs() > 1e-3 {
            return Err(ValidationError::Constraint(format!(
                "channel weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        require_rgb(image)?;
        let wr = self.params.get_float("red_weight")? as f32;
        let wg = self.params.get_float("green_weight")? as f32;
        let wb = self.params.get_float("blue_weight")? as f32;

        let data = image
            .data()
            .chunks_exact(3)
            .map(|px| to_u8(wr * px[0] as f32 + wg * px[1] as f32 + wb * px[2] as f32))
            .collect();
        Ok(RasterImage::from_vec(
            image.width(),
            image.height(),
            PixelLayout::Gray,
            data,
        ))
    }
}

declare_tool!(
    /// Rotates the hue of every pixel by `hue_shift` degrees.
    HueAdjustment,
    [ParamSpec::int("hue_shift", 0, -180, 180)]
);

impl Tool for HueAdjustment {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        require_rgb(image)?;
        let shift = self.params.get_int("hue_shift")? as f32;
        if shift == 0.0 {
            return Ok(image.clone());
        }
        Ok(map_hsv(image, |h, s, v| (h + shift, s, v)))
    }
}

declare_tool!(
    /// Blend between the image and its negative.
    InvertColors,
    [ParamSpec::float("strength", 1.0, 0.0, 1.0)]
);

impl Tool for InvertColors {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let strength = self.params.get_float("strength")? as f32;
        Ok(image.map_lut(&build_lut(|v| {
            (1.0 - strength) * v + strength * (255.0 - v)
        })))
    }
}

declare_tool!(
    /// Scales HSV saturation, clamped to the valid range.
    SaturationAdjustment,
    [ParamSpec::float("saturation", 1.0, 0.0, 10.0)]
);

impl Tool for SaturationAdjustment {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        require_rgb(image)?;
        let factor = self.params.get_float("saturation")? as f32;
        if factor == 1.0 {
            return Ok(image.clone());
        }
        Ok(map_hsv(image, |h, s, v| (h, (s * factor).min(1.0), v)))
    }
}

declare_tool!(
    /// Classic sepia tone matrix, blended with the input by `intensity`.
    SepiaEffect,
    [ParamSpec::float("intensity", 1.0, 0.0, 1.0)]
);

impl Tool for SepiaEffect {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        require_rgb(image)?;
        let t = self.params.get_float("intensity")? as f32;
        Ok(map_rgb(image, |[r, g, b]| {
            let tone = [
                0.393 * r + 0.769 * g + 0.189 * b,
                0.349 * r + 0.686 * g + 0.168 * b,
                0.272 * r + 0.534 * g + 0.131 * b,
            ]
            .map(|v| v.min(255.0));
            [
                (1.0 - t) * r + t * tone[0],
                (1.0 - t) * g + t * tone[1],
                (1.0 - t) * b + t * tone[2],
            ]
        }))
    }
}

declare_tool!(
    /// Paint every pixel whose channels all lie within `tolerance` of the
    /// target color with the replacement color.
    SelectiveColorReplacement,
    [
        ParamSpec::int("target_red", 0, 0, 255),
        ParamSpec::int("target_green", 0, 0, 255),
        ParamSpec::int("target_blue", 0, 0, 255),
        ParamSpec::int("replacement_red", 0, 0, 255),
        ParamSpec::int("replacement_green", 0, 0, 255),
        ParamSpec::int("replacement_blue", 0, 0, 255),
        ParamSpec::float("tolerance", 30.0, 0.0, 255.0),
    ]
);

impl SelectiveColorReplacement {
    fn color(&self, prefix: &str) -> Result<[f32; 3], ProcessingError> {
        let mut rgb = [0.0; 3];
        for (v, channel) in rgb.iter_mut().zip(["red", "green", "blue"]) {
            *v = self.params.get_int(&format!("{prefix}_{channel}"))? as f32;
        }
        Ok(rgb)
    }
}

impl Tool for SelectiveColorReplacement {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        require_rgb(image)?;
        let target = self.color("target")?;
        let replacement = self.color("replacement")?;
        let tolerance = self.params.get_float("tolerance")? as f32;

        Ok(map_rgb(image, |px| {
            let within = px
                .iter()
                .zip(&target)
                .all(|(v, t)| (v - t).abs() <= tolerance);
            if within { replacement } else { px }
        }))
    }
}
