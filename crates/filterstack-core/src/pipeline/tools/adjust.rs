use crate::color::{
    OKLAB_MAX_CHROMA, linear_luminance, linear_to_srgb_u8, oklab_chroma, srgb_u8_to_linear, to_u8,
};
use crate::error::ProcessingError;
use crate::params::ParamSpec;
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::{PixelLayout, RasterImage};

use super::kernel::{ensure_not_empty, require_rgb};

/// Lookup table of a per-sample transfer function, rounded and saturated.
pub(super) fn build_lut(f: impl Fn(f32) -> f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = to_u8(f(i as f32));
    }
    lut
}

declare_tool!(
    /// Adds a constant offset to every sample.
    BrightnessAdjustment,
    [ParamSpec::float("brightness", 0.0, -255.0, 255.0)]
);

impl Tool for BrightnessAdjustment {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let offset = self.params.get_float("brightness")? as f32;
        Ok(image.map_lut(&build_lut(|v| v + offset)))
    }
}

declare_tool!(
    /// Scales every sample by a gain factor.
    ContrastAdjustment,
    [ParamSpec::float("contrast", 1.0, 0.0, 10.0)]
);

impl Tool for ContrastAdjustment {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let gain = self.params.get_float("contrast")? as f32;
        Ok(image.map_lut(&build_lut(|v| v * gain)))
    }
}

declare_tool!(
    /// Multiplies every sample by a positive exposure factor.
    ExposureAdjustment,
    [ParamSpec::positive("exposure", 1.0, 0.0, 10.0)]
);

impl Tool for ExposureAdjustment {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let factor = self.params.get_float("exposure")? as f32;
        Ok(image.map_lut(&build_lut(|v| v * factor)))
    }
}

declare_tool!(
    /// Power-law correction `out = 255 * (in / 255)^(1 / gamma)`.
    GammaCorrection,
    [ParamSpec::positive("gamma", 1.0, 0.0, 10.0)]
);

impl Tool for GammaCorrection {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let inv_gamma = 1.0 / self.params.get_float("gamma")? as f32;
        Ok(image.map_lut(&build_lut(|v| (v / 255.0).powf(inv_gamma) * 255.0)))
    }
}

declare_tool!(
    /// Saturation boost weighted toward muted colors.
    ///
    /// Works in linear light. The per-pixel effect is scaled by how far the
    /// pixel's OKLab chroma is from the gamut maximum, so positive values lift
    /// dull colors more than vivid ones and negative values mute vivid colors
    /// first.
    VibranceAdjustment,
    [ParamSpec::float("vibrance", 0.0, -1.0, 1.0)]
);

impl Tool for VibranceAdjustment {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        require_rgb(image)?;
        let strength = self.params.get_float("vibrance")? as f32;
        if strength == 0.0 {
            return Ok(image.clone());
        }

        let sign = strength.signum();
        let mut data = Vec::with_capacity(image.data().len());
        for px in image.data().chunks_exact(3) {
            let [r, g, b] = [px[0], px[1], px[2]].map(srgb_u8_to_linear);
            let y = linear_luminance(r, g, b);

            let sat = (oklab_chroma(r, g, b) / OKLAB_MAX_CHROMA).clamp(0.0, 1.0);
            let effect = (strength * (1.0 - sign * sat)).max(-1.0);

            for c in [r, g, b] {
                data.push(linear_to_srgb_u8((y + (1.0 + effect) * (c - y)).max(0.0)));
            }
        }

        Ok(RasterImage::from_vec(
            image.width(),
            image.height(),
            PixelLayout::Rgb,
            data,
        ))
    }
}
