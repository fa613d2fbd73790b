//! Grayscale morphology with a flat structuring element. Samples outside
//! the image are ignored, so borders never pull values toward black or
//! white.

use crate::error::ProcessingError;
use crate::params::{ParamSet, ParamSpec};
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::RasterImage;

use super::kernel::{ensure_window_fits, window_param};

const SHAPES: &[&str] = &["rect", "ellipse", "cross"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MorphOp {
    Erode,
    Dilate,
    Open,
    Close,
    TopHat,
    BlackHat,
}

/// Offsets of the active cells of a `size`x`size` structuring element.
fn structuring_element(shape: &str, size: usize) -> Vec<(isize, isize)> {
    let r = (size / 2) as isize;
    let mut offsets = Vec::with_capacity(size * size);
    for dy in -r..=r {
        let half_width = match shape {
            "cross" if dy != 0 => 0,
            "ellipse" if r > 0 => (((r * r - dy * dy) as f64).sqrt().round()) as isize,
            _ => r,
        };
        for dx in -half_width..=half_width {
            offsets.push((dx, dy));
        }
    }
    offsets
}

fn extremum(image: &RasterImage, element: &[(isize, isize)], dilate: bool) -> RasterImage {
    let (w, h) = (image.width() as isize, image.height() as isize);
    let cn = image.channels();
    let src = image.data();
    let mut data = Vec::with_capacity(src.len());

    for y in 0..h {
        for x in 0..w {
            for c in 0..cn {
                let mut best = if dilate { u8::MIN } else { u8::MAX };
                for &(dx, dy) in element {
                    let (sx, sy) = (x + dx, y + dy);
                    if sx < 0 || sy < 0 || sx >= w || sy >= h {
                        continue;
                    }
                    let v = src[(sy as usize * w as usize + sx as usize) * cn + c];
                    best = if dilate { best.max(v) } else { best.min(v) };
                }
                data.push(best);
            }
        }
    }

    RasterImage::from_vec(image.width(), image.height(), image.layout(), data)
}

fn repeat(image: &RasterImage, element: &[(isize, isize)], dilate: bool, n: usize) -> RasterImage {
    let mut out = extremum(image, element, dilate);
    for _ in 1..n {
        out = extremum(&out, element, dilate);
    }
    out
}

fn difference(a: &RasterImage, b: &RasterImage) -> RasterImage {
    let data = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| x.saturating_sub(y))
        .collect();
    RasterImage::from_vec(a.width(), a.height(), a.layout(), data)
}

fn morph(params: &ParamSet, op: MorphOp, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
    let size = window_param(params, "kernel_size")?;
    ensure_window_fits(image, size)?;
    let element = structuring_element(params.get_choice("kernel_shape")?, size);
    let n = window_param(params, "iterations")?;

    let erode = |img: &RasterImage| repeat(img, &element, false, n);
    let dilate = |img: &RasterImage| repeat(img, &element, true, n);

    Ok(match op {
        MorphOp::Erode => erode(image),
        MorphOp::Dilate => dilate(image),
        MorphOp::Open => dilate(&erode(image)),
        MorphOp::Close => erode(&dilate(image)),
        MorphOp::TopHat => difference(image, &dilate(&erode(image))),
        MorphOp::BlackHat => difference(&erode(&dilate(image)), image),
    })
}

macro_rules! morph_tool {
    ($(#[$meta:meta])* $ty:ident, $op:expr) => {
        declare_tool!(
            $(#[$meta])*
            $ty,
            [
                ParamSpec::odd("kernel_size", 3, 1, 31),
                ParamSpec::choice("kernel_shape", "rect", SHAPES),
                ParamSpec::int("iterations", 1, 1, 10),
            ]
        );

        impl Tool for $ty {
            tool_state!();

            fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
                morph(&self.params, $op, image)
            }
        }
    };
}

morph_tool!(
    /// Local minimum over the structuring element.
    Erosion,
    MorphOp::Erode
);
morph_tool!(
    /// Local maximum over the structuring element.
    Dilation,
    MorphOp::Dilate
);
morph_tool!(
    /// Erosion followed by dilation; removes small bright specks.
    Opening,
    MorphOp::Open
);
morph_tool!(
    /// Dilation followed by erosion; fills small dark holes.
    Closing,
    MorphOp::Close
);
morph_tool!(
    /// Image minus its opening: bright details smaller than the element.
    TopHatTransform,
    MorphOp::TopHat
);
morph_tool!(
    /// Closing minus the image: dark details smaller than the element.
    BlackHatTransform,
    MorphOp::BlackHat
);
