use image::GrayImage;
use image::imageops::{self, FilterType};

use crate::color::to_u8;
use crate::error::ProcessingError;
use crate::params::ParamSpec;
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::RasterImage;

use super::draw::{Canvas, GREEN};
use super::kernel::{Plane, ensure_not_empty, sobel};

/// Bresenham circle of radius 3, clockwise from the top.
const CIRCLE: [(isize, isize); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const RING_RADIUS: usize = 3;

/// Contiguous arc length that makes a corner (FAST-9).
const ARC: usize = 9;

/// Corner score of the pixel at `(x, y)`, or `None` when fewer than
/// [`ARC`] contiguous circle samples are all brighter or all darker than
/// the center by more than `threshold`.
fn corner_score(luma: &Plane, x: usize, y: usize, threshold: f32) -> Option<f32> {
    let p = luma.at(x, y);
    let ring: [f32; 16] = CIRCLE.map(|(dx, dy)| {
        luma.at((x as isize + dx) as usize, (y as isize + dy) as usize)
    });

    let longest_run = |pred: &dyn Fn(f32) -> bool| {
        let mut best = 0;
        let mut run = 0;
        // Walk the ring twice so arcs wrapping past the start are counted.
        for i in 0..32 {
            if pred(ring[i % 16]) {
                run += 1;
                best = best.max(run);
            } else {
                run = 0;
            }
        }
        best.min(16)
    };

    let brighter = longest_run(&|v| v > p + threshold);
    let darker = longest_run(&|v| v < p - threshold);
    if brighter < ARC && darker < ARC {
        return None;
    }

    let bright_sum: f32 = ring.iter().map(|&v| (v - p - threshold).max(0.0)).sum();
    let dark_sum: f32 = ring.iter().map(|&v| (p - v - threshold).max(0.0)).sum();
    Some(bright_sum.max(dark_sum))
}

/// Segment-test corners at least `border` pixels away from every edge, with
/// their scores. `border` must be at least 3 so the ring stays inside.
fn detect(luma: &Plane, threshold: f32, suppress: bool, border: usize) -> Vec<(usize, usize, f32)> {
    let (w, h) = (luma.width, luma.height);
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    let mut scores = vec![0.0f32; w * h];
    for y in border..h - border {
        for x in border..w - border {
            if let Some(score) = corner_score(luma, x, y, threshold) {
                scores[y * w + x] = score;
            }
        }
    }

    let mut corners = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let s = scores[y * w + x];
            if s <= 0.0 {
                continue;
            }
            let is_peak = !suppress
                || (-1isize..=1).all(|dy| {
                    (-1isize..=1).all(|dx| {
                        (dx == 0 && dy == 0)
                            || s > scores[(y as isize + dy) as usize * w + (x as isize + dx) as usize]
                    })
                });
            if is_peak {
                corners.push((x, y, s));
            }
        }
    }
    corners
}

declare_tool!(
    /// FAST-9 corner detector on the luma channel. Corners are drawn as
    /// green circles on an RGB copy of the input.
    FastCornerDetection,
    [
        ParamSpec::int("threshold", 10, 1, 255),
        ParamSpec::flag("non_max_suppression", true),
    ]
);

impl FastCornerDetection {
    /// Corner positions for the current parameters.
    pub fn corners(&self, image: &RasterImage) -> Result<Vec<(u32, u32)>, ProcessingError> {
        ensure_not_empty(image)?;
        let threshold = self.params.get_int("threshold")? as f32;
        let suppress = self.params.get_bool("non_max_suppression")?;
        Ok(detect(&Plane::luma(image), threshold, suppress, RING_RADIUS)
            .into_iter()
            .map(|(x, y, _)| (x as u32, y as u32))
            .collect())
    }
}

impl Tool for FastCornerDetection {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let corners = self.corners(image)?;
        let mut canvas = Canvas::from_image(image);
        for (cx, cy) in corners {
            for (dx, dy) in CIRCLE {
                canvas.put(cx as isize + dx, cy as isize + dy, GREEN);
            }
        }
        Ok(canvas.into_image())
    }
}

/// A keypoint in input image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the oriented patch at input scale.
    pub size: f32,
    /// Degrees in `[0, 360)`.
    pub angle: f32,
    pub response: f32,
    /// Pyramid level the keypoint was found on.
    pub octave: u32,
}

const SCORE_TYPES: &[&str] = &["harris", "fast"];

const HARRIS_K: f32 = 0.04;

/// Half-width of the 7x7 Harris window; never exceeds the detection border.
const HARRIS_RADIUS: usize = 3;

/// `base` resized by `1 / scale`, or `None` once the level would vanish.
fn pyramid_level(base: &Plane, scale: f32) -> Option<Plane> {
    let width = (base.width as f32 / scale).round() as u32;
    let height = (base.height as f32 / scale).round() as u32;
    if width == 0 || height == 0 {
        return None;
    }
    let bytes = base.data.iter().map(|&v| to_u8(v)).collect();
    let gray = GrayImage::from_raw(base.width as u32, base.height as u32, bytes)?;
    let resized = imageops::resize(&gray, width, height, FilterType::Triangle);
    Some(Plane {
        width: width as usize,
        height: height as usize,
        data: resized.into_raw().into_iter().map(f32::from).collect(),
    })
}

fn harris_response(ix: &Plane, iy: &Plane, x: usize, y: usize) -> f32 {
    let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
    for yy in y - HARRIS_RADIUS..=y + HARRIS_RADIUS {
        for xx in x - HARRIS_RADIUS..=x + HARRIS_RADIUS {
            let (gx, gy) = (ix.at(xx, yy), iy.at(xx, yy));
            a += gx * gx;
            b += gy * gy;
            c += gx * gy;
        }
    }
    a * b - c * c - HARRIS_K * (a + b) * (a + b)
}

/// Direction from `(x, y)` to the intensity centroid of the disc around it.
fn orientation(plane: &Plane, x: usize, y: usize, radius: isize) -> f32 {
    let (mut m10, mut m01) = (0.0f32, 0.0f32);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (px, py) = (x as isize + dx, y as isize + dy);
            if px < 0 || py < 0 || px >= plane.width as isize || py >= plane.height as isize {
                continue;
            }
            let v = plane.at(px as usize, py as usize);
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    let degrees = m01.atan2(m10).to_degrees().rem_euclid(360.0);
    // A tiny negative angle wraps to exactly 360.0 in f32.
    if degrees >= 360.0 { 0.0 } else { degrees }
}

declare_tool!(
    /// ORB keypoints: FAST-9 corners over a scale pyramid, ranked by Harris
    /// or FAST score and oriented by their intensity centroid. Each keypoint
    /// is drawn as a green circle of its patch size with a stroke along its
    /// orientation, on an RGB copy of the input.
    ORBFeatureDetection,
    [
        ParamSpec::int("n_features", 500, 1, 10_000),
        ParamSpec::positive("scale_factor", 1.2, 1.0, 4.0),
        ParamSpec::int("n_levels", 8, 1, 32),
        ParamSpec::int("edge_threshold", 31, 1, 255),
        ParamSpec::int("patch_size", 31, 2, 255),
        ParamSpec::int("fast_threshold", 20, 1, 255),
        ParamSpec::choice("score_type", "harris", SCORE_TYPES),
    ]
);

impl ORBFeatureDetection {
    /// The strongest `n_features` keypoints over all pyramid levels.
    pub fn keypoints(&self, image: &RasterImage) -> Result<Vec<Keypoint>, ProcessingError> {
        ensure_not_empty(image)?;
        let n_features = self.params.get_int("n_features")? as usize;
        let scale_factor = self.params.get_float("scale_factor")? as f32;
        let n_levels = self.params.get_int("n_levels")? as u32;
        let border = (self.params.get_int("edge_threshold")? as usize).max(RING_RADIUS);
        let patch_size = self.params.get_int("patch_size")? as f32;
        let threshold = self.params.get_int("fast_threshold")? as f32;
        let harris = self.params.get_choice("score_type")? == "harris";

        let base = Plane::luma(image);
        let radius = (patch_size / 2.0) as isize;
        let mut keypoints = Vec::new();

        for octave in 0..n_levels {
            let scale = scale_factor.powi(octave as i32);
            let level = if octave == 0 {
                base.clone()
            } else {
                match pyramid_level(&base, scale) {
                    Some(level) => level,
                    None => break,
                }
            };
            if level.width <= 2 * border || level.height <= 2 * border {
                break;
            }

            let gradients = harris.then(|| (sobel(&level, 1, 0, 3), sobel(&level, 0, 1, 3)));
            for (x, y, fast_score) in detect(&level, threshold, true, border) {
                let response = match &gradients {
                    Some((ix, iy)) => harris_response(ix, iy, x, y),
                    None => fast_score,
                };
                keypoints.push(Keypoint {
                    x: x as f32 * scale,
                    y: y as f32 * scale,
                    size: patch_size * scale,
                    angle: orientation(&level, x, y, radius),
                    response,
                    octave,
                });
            }
        }

        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(n_features);
        Ok(keypoints)
    }
}

impl Tool for ORBFeatureDetection {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let keypoints = self.keypoints(image)?;
        let mut canvas = Canvas::from_image(image);
        for kp in &keypoints {
            let radius = kp.size / 2.0;
            let angle = kp.angle.to_radians();
            canvas.circle((kp.x, kp.y), radius, 1, GREEN);
            canvas.line(
                (kp.x.round() as isize, kp.y.round() as isize),
                (
                    (kp.x + radius * angle.cos()).round() as isize,
                    (kp.y + radius * angle.sin()).round() as isize,
                ),
                1,
                GREEN,
            );
        }
        Ok(canvas.into_image())
    }
}
