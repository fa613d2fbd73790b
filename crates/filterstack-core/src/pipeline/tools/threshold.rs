use crate::color::to_u8;
use crate::error::ProcessingError;
use crate::params::ParamSpec;
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::{PixelLayout, RasterImage};

use super::kernel::{ensure_not_empty, ensure_window_fits, gaussian_blur, replicate, window_param};

const THRESHOLD_TYPES: &[&str] = &["binary", "binary_inv", "trunc", "tozero", "tozero_inv"];
const BINARY_TYPES: &[&str] = &["binary", "binary_inv"];
const ADAPTIVE_METHODS: &[&str] = &["mean", "gaussian"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThresholdType {
    Binary,
    BinaryInv,
    Trunc,
    ToZero,
    ToZeroInv,
}

impl ThresholdType {
    fn parse(name: &str) -> Result<Self, ProcessingError> {
        Ok(match name {
            "binary" => Self::Binary,
            "binary_inv" => Self::BinaryInv,
            "trunc" => Self::Trunc,
            "tozero" => Self::ToZero,
            "tozero_inv" => Self::ToZeroInv,
            other => {
                return Err(ProcessingError::Failed(format!(
                    "unknown threshold type `{other}`"
                )));
            }
        })
    }

    fn apply(self, value: f32, thresh: f32, max_value: u8) -> u8 {
        let above = value > thresh;
        match self {
            Self::Binary => {
                if above {
                    max_value
                } else {
                    0
                }
            }
            Self::BinaryInv => {
                if above {
                    0
                } else {
                    max_value
                }
            }
            Self::Trunc => to_u8(if above { thresh } else { value }),
            Self::ToZero => to_u8(if above { value } else { 0.0 }),
            Self::ToZeroInv => to_u8(if above { 0.0 } else { value }),
        }
    }
}

fn gray_map(gray: &RasterImage, f: impl Fn(usize, u8) -> u8) -> RasterImage {
    let data = gray
        .data()
        .iter()
        .enumerate()
        .map(|(i, &v)| f(i, v))
        .collect();
    RasterImage::from_vec(gray.width(), gray.height(), PixelLayout::Gray, data)
}

/// Threshold that maximizes the between-class variance of the histogram.
pub(crate) fn otsu_threshold(gray: &RasterImage) -> u8 {
    let mut hist = [0u64; 256];
    for &v in gray.data() {
        hist[v as usize] += 1;
    }
    let total = gray.data().len() as f64;
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut weight_bg = 0.0f64;
    let mut sum_bg = 0.0f64;
    let mut best_between = -1.0f64;
    let mut best = 0u8;

    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg <= f64::EPSILON {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg <= f64::EPSILON {
            break;
        }
        sum_bg += t as f64 * count as f64;
        let diff = sum_bg / weight_bg - (sum_all - sum_bg) / weight_fg;
        let between = weight_bg * weight_fg * diff * diff;
        if between > best_between {
            best_between = between;
            best = t as u8;
        }
    }
    best
}

declare_tool!(
    /// Fixed global threshold on the luma channel.
    SimpleThreshold,
    [
        ParamSpec::float("threshold", 127.0, 0.0, 255.0),
        ParamSpec::int("max_value", 255, 0, 255),
        ParamSpec::choice("threshold_type", "binary", THRESHOLD_TYPES),
    ]
);

impl Tool for SimpleThreshold {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let thresh = self.params.get_float("threshold")? as f32;
        let max_value = self.params.get_int("max_value")? as u8;
        let kind = ThresholdType::parse(self.params.get_choice("threshold_type")?)?;
        Ok(gray_map(&image.to_gray(), |_, v| {
            kind.apply(v as f32, thresh, max_value)
        }))
    }
}

declare_tool!(
    /// Binary threshold at the Otsu level of the luma histogram.
    OtsuThreshold,
    [ParamSpec::int("max_value", 255, 0, 255)]
);

impl Tool for OtsuThreshold {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_not_empty(image)?;
        let max_value = self.params.get_int("max_value")? as u8;
        let gray = image.to_gray();
        let thresh = otsu_threshold(&gray) as f32;
        Ok(gray_map(&gray, |_, v| {
            ThresholdType::Binary.apply(v as f32, thresh, max_value)
        }))
    }
}

/// Box mean over a `block`x`block` window with replicated borders.
fn local_mean(gray: &RasterImage, block: usize) -> Vec<f32> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let r = (block / 2) as isize;
    let src = gray.data();
    let area = (block * block) as f32;
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            for dy in -r..=r {
                let sy = replicate(y as isize + dy, h);
                for dx in -r..=r {
                    sum += src[sy * w + replicate(x as isize + dx, w)] as u32;
                }
            }
            out.push((sum as f32 / area).round());
        }
    }
    out
}

declare_tool!(
    /// Threshold against the local mean (or Gaussian-weighted mean) of a
    /// `block_size` neighborhood, minus `c`.
    AdaptiveThreshold,
    [
        ParamSpec::int("max_value", 255, 0, 255),
        ParamSpec::odd("block_size", 11, 3, 99),
        ParamSpec::float("c", 2.0, -255.0, 255.0),
        ParamSpec::choice("adaptive_method", "mean", ADAPTIVE_METHODS),
        ParamSpec::choice("threshold_type", "binary", BINARY_TYPES),
    ]
);

impl Tool for AdaptiveThreshold {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let block = window_param(&self.params, "block_size")?;
        ensure_window_fits(image, block)?;
        let max_value = self.params.get_int("max_value")? as u8;
        let c = self.params.get_float("c")? as f32;
        let kind = ThresholdType::parse(self.params.get_choice("threshold_type")?)?;

        let gray = image.to_gray();
        let local: Vec<f32> = match self.params.get_choice("adaptive_method")? {
            "gaussian" => gaussian_blur(&gray, block, block, 0.0, 0.0)
                .data()
                .iter()
                .map(|&v| v as f32)
                .collect(),
            _ => local_mean(&gray, block),
        };

        Ok(gray_map(&gray, |i, v| {
            kind.apply(v as f32, local[i] - c, max_value)
        }))
    }
}
