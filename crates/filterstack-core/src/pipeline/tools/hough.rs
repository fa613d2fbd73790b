use std::f32::consts::PI;

use crate::error::{ProcessingError, ValidationError};
use crate::params::{ParamSet, ParamSpec};
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::RasterImage;

use super::draw::{Canvas, GREEN};
use super::edges::canny;
use super::kernel::{Plane, ensure_not_empty, sobel};

const TRANSFORM_TYPES: &[&str] = &["lines", "circles"];

/// Canny thresholds used to find line candidates.
const LINE_CANNY: (f32, f32) = (50.0, 150.0);

const STROKE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl Segment {
    pub fn length(&self) -> f32 {
        let dx = self.end.0 as f32 - self.start.0 as f32;
        let dy = self.end.1 as f32 - self.start.1 as f32;
        dx.hypot(dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub votes: u32,
}

struct EdgeMap {
    width: usize,
    height: usize,
    on: Vec<bool>,
}

impl EdgeMap {
    fn get(&self, x: isize, y: isize) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.on[y as usize * self.width + x as usize]
    }

    fn clear(&mut self, x: isize, y: isize) {
        if self.get(x, y) {
            self.on[y as usize * self.width + x as usize] = false;
        }
    }
}

/// Cells of `acc` (row-major, `cols` wide) that reach `threshold` and beat
/// their 8 neighbours, strongest first.
fn peaks(acc: &[u32], cols: usize, threshold: u32) -> Vec<(usize, usize, u32)> {
    let rows = acc.len() / cols;
    let mut found = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let v = acc[r * cols + c];
            if v < threshold {
                continue;
            }
            let is_peak = (-1isize..=1).all(|dr| {
                (-1isize..=1).all(|dc| {
                    let (nr, nc) = (r as isize + dr, c as isize + dc);
                    if (dr == 0 && dc == 0)
                        || nr < 0
                        || nc < 0
                        || nr >= rows as isize
                        || nc >= cols as isize
                    {
                        return true;
                    }
                    let n = acc[nr as usize * cols + nc as usize];
                    // Ties go to the earlier cell.
                    if (nr, nc) < (r as isize, c as isize) { v > n } else { v >= n }
                })
            });
            if is_peak {
                found.push((r, c, v));
            }
        }
    }
    found.sort_by(|a, b| b.2.cmp(&a.2));
    found
}

/// Probabilistic-style line search: vote in (rho, theta) space, then walk
/// each peak line across the edge map and split it into runs whose gaps do
/// not exceed `max_gap`. Edge pixels used by an accepted segment no longer
/// support later lines.
fn find_segments(
    edges: &mut EdgeMap,
    rho_res: f32,
    theta_res: f32,
    threshold: u32,
    min_length: f32,
    max_gap: usize,
) -> Vec<Segment> {
    let (w, h) = (edges.width, edges.height);
    let max_rho = ((w * w + h * h) as f32).sqrt().ceil();
    let num_rho = (2.0 * max_rho / rho_res).ceil() as usize + 1;
    let num_theta = ((PI / theta_res).round() as usize).max(1);
    let trig: Vec<(f32, f32)> = (0..num_theta)
        .map(|t| {
            let theta = t as f32 * theta_res;
            (theta.cos(), theta.sin())
        })
        .collect();

    let mut acc = vec![0u32; num_rho * num_theta];
    for y in 0..h {
        for x in 0..w {
            if !edges.on[y * w + x] {
                continue;
            }
            for (t, &(cos, sin)) in trig.iter().enumerate() {
                let rho = x as f32 * cos + y as f32 * sin;
                let r = ((rho + max_rho) / rho_res).round() as usize;
                if r < num_rho {
                    acc[r * num_theta + t] += 1;
                }
            }
        }
    }

    let mut segments = Vec::new();
    for (r, t, _) in peaks(&acc, num_theta, threshold) {
        let rho = r as f32 * rho_res - max_rho;
        let (cos, sin) = trig[t];
        let (x0, y0) = (rho * cos, rho * sin);
        // Unit direction along the line and the normal used to tolerate
        // one pixel of quantization.
        let dir = (-sin, cos);
        let normal = (cos.round() as isize, sin.round() as isize);

        let mut run: Option<((isize, isize), (isize, isize))> = None;
        let mut gap = 0usize;
        let mut hits = Vec::new();
        let limit = max_rho as isize;

        let mut close = |run: &mut Option<((isize, isize), (isize, isize))>,
                         hits: &mut Vec<(isize, isize)>,
                         edges: &mut EdgeMap| {
            if let Some((start, end)) = run.take() {
                let segment = Segment {
                    start: (start.0 as u32, start.1 as u32),
                    end: (end.0 as u32, end.1 as u32),
                };
                if segment.length() >= min_length {
                    for &(x, y) in hits.iter() {
                        edges.clear(x, y);
                    }
                    segments.push(segment);
                }
            }
            hits.clear();
        };

        for s in -limit..=limit {
            let px = (x0 + s as f32 * dir.0).round() as isize;
            let py = (y0 + s as f32 * dir.1).round() as isize;
            if px < 0 || py < 0 || px >= w as isize || py >= h as isize {
                continue;
            }
            let hit = [(0, 0), normal, (-normal.0, -normal.1)]
                .into_iter()
                .map(|(nx, ny)| (px + nx, py + ny))
                .find(|&(x, y)| edges.get(x, y));

            match hit {
                Some(p) => {
                    run = Some(match run {
                        Some((start, _)) => (start, (px, py)),
                        None => ((px, py), (px, py)),
                    });
                    hits.push(p);
                    gap = 0;
                }
                None if run.is_some() => {
                    gap += 1;
                    if gap > max_gap {
                        close(&mut run, &mut hits, edges);
                    }
                }
                None => {}
            }
        }
        close(&mut run, &mut hits, edges);
    }
    segments
}

/// Gradient Hough circles: every edge pixel votes for centers along its
/// gradient at each radius in range; centers are accumulator peaks kept at
/// least `min_dist` apart, each with the best-supported radius.
fn find_circles(
    luma: &Plane,
    edges: &[bool],
    dp: f32,
    min_dist: f32,
    votes_needed: u32,
    min_radius: usize,
    max_radius: usize,
) -> Vec<Circle> {
    let (w, h) = (luma.width, luma.height);
    let gx = sobel(luma, 1, 0, 3);
    let gy = sobel(luma, 0, 1, 3);

    let cols = ((w as f32 / dp).ceil() as usize).max(1);
    let rows = ((h as f32 / dp).ceil() as usize).max(1);
    let mut acc = vec![0u32; cols * rows];
    let mut points = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if !edges[i] {
                continue;
            }
            let (dx, dy) = (gx.data[i], gy.data[i]);
            let mag = dx.hypot(dy);
            if mag <= f32::EPSILON {
                continue;
            }
            points.push((x as f32, y as f32));
            let (ux, uy) = (dx / mag, dy / mag);
            for r in min_radius.max(1)..=max_radius {
                for sign in [-1.0f32, 1.0] {
                    let cx = (x as f32 + sign * r as f32 * ux) / dp;
                    let cy = (y as f32 + sign * r as f32 * uy) / dp;
                    let (c, rr) = (cx.round(), cy.round());
                    if c >= 0.0 && rr >= 0.0 && (c as usize) < cols && (rr as usize) < rows {
                        acc[rr as usize * cols + c as usize] += 1;
                    }
                }
            }
        }
    }

    let mut circles: Vec<Circle> = Vec::new();
    let mut histogram = vec![0u32; max_radius + 1];
    for (r, c, _) in peaks(&acc, cols, votes_needed) {
        let (cx, cy) = (c as f32 * dp, r as f32 * dp);
        if circles
            .iter()
            .any(|o| (o.x - cx).hypot(o.y - cy) < min_dist)
        {
            continue;
        }

        histogram.iter_mut().for_each(|b| *b = 0);
        for &(px, py) in &points {
            let d = (px - cx).hypot(py - cy).round() as usize;
            if (min_radius..=max_radius).contains(&d) {
                histogram[d] += 1;
            }
        }
        let best = (min_radius..=max_radius).max_by_key(|&d| (histogram[d], std::cmp::Reverse(d)));
        if let Some(radius) = best
            && histogram[radius] >= votes_needed
        {
            circles.push(Circle {
                x: cx,
                y: cy,
                radius: radius as f32,
                votes: histogram[radius],
            });
        }
    }
    circles
}

declare_tool!(
    /// Hough transform on Canny edges of the luma channel. `lines` finds
    /// straight segments, `circles` uses gradient-directed center voting.
    /// Detections are drawn in green on an RGB copy of the luma channel.
    HoughTransform,
    [
        ParamSpec::choice("transform_type", "lines", TRANSFORM_TYPES),
        ParamSpec::positive("rho", 1.0, 0.0, 100.0),
        ParamSpec::positive("theta", (PI / 180.0) as f64, 0.0, PI as f64),
        ParamSpec::int("threshold", 100, 1, 100_000),
        ParamSpec::int("min_line_length", 100, 0, 100_000),
        ParamSpec::int("max_line_gap", 10, 0, 100_000),
        ParamSpec::positive("dp", 1.0, 0.0, 16.0),
        ParamSpec::positive("min_dist", 50.0, 0.0, 100_000.0),
        ParamSpec::positive("param1", 50.0, 0.0, 1000.0),
        ParamSpec::int("param2", 30, 1, 100_000),
        ParamSpec::int("min_radius", 0, 0, 100_000),
        ParamSpec::int("max_radius", 0, 0, 100_000),
    ]
);

impl HoughTransform {
    fn luma_and_edges(
        image: &RasterImage,
        low: f32,
        high: f32,
    ) -> Result<(Plane, Vec<bool>), ProcessingError> {
        ensure_not_empty(image)?;
        let luma = Plane::luma(image);
        let edges = canny(&luma, low, high, 3, false);
        Ok((luma, edges))
    }

    pub fn lines(&self, image: &RasterImage) -> Result<Vec<Segment>, ProcessingError> {
        let (luma, on) = Self::luma_and_edges(image, LINE_CANNY.0, LINE_CANNY.1)?;
        let mut edges = EdgeMap {
            width: luma.width,
            height: luma.height,
            on,
        };
        Ok(find_segments(
            &mut edges,
            self.params.get_float("rho")? as f32,
            self.params.get_float("theta")? as f32,
            self.params.get_int("threshold")? as u32,
            self.params.get_int("min_line_length")? as f32,
            self.params.get_int("max_line_gap")? as usize,
        ))
    }

    /// A `max_radius` of 0 searches up to half the shorter image side.
    pub fn circles(&self, image: &RasterImage) -> Result<Vec<Circle>, ProcessingError> {
        let high = self.params.get_float("param1")? as f32;
        let (luma, edges) = Self::luma_and_edges(image, high / 2.0, high)?;
        let min_radius = self.params.get_int("min_radius")? as usize;
        let max_radius = match self.params.get_int("max_radius")? as usize {
            0 => (luma.width.min(luma.height) / 2).max(min_radius),
            r => r,
        };
        Ok(find_circles(
            &luma,
            &edges,
            self.params.get_float("dp")? as f32,
            self.params.get_float("min_dist")? as f32,
            self.params.get_int("param2")? as u32,
            min_radius,
            max_radius,
        ))
    }
}

impl Tool for HoughTransform {
    tool_state!();

    fn check(&self, candidate: &ParamSet) -> Result<(), ValidationError> {
        let min = candidate.get_int("min_radius").unwrap_or(0);
        let max = candidate.get_int("max_radius").unwrap_or(0);
        if max != 0 && max < min {
            return Err(ValidationError::Constraint(format!(
                "max_radius ({max}) must be 0 or at least min_radius ({min})"
            )));
        }
        Ok(())
    }

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let mut canvas = Canvas::from_image(&image.to_gray());
        if self.params.get_choice("transform_type")? == "circles" {
            for c in self.circles(image)? {
                canvas.circle((c.x, c.y), c.radius, STROKE, GREEN);
            }
        } else {
            for s in self.lines(image)? {
                let start = (s.start.0 as isize, s.start.1 as isize);
                let end = (s.end.0 as isize, s.end.1 as isize);
                canvas.line(start, end, STROKE, GREEN);
            }
        }
        Ok(canvas.into_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamMap, ParamValue};
    use crate::pipeline::tools::test_support::{configured, gray_from_fn, rgb_from_fn};
    use crate::raster::PixelLayout;

    fn half_plane() -> RasterImage {
        gray_from_fn(64, 64, |_, y| if y < 32 { 0 } else { 200 })
    }

    fn short_lines() -> HoughTransform {
        configured(
            HoughTransform::new(),
            &[
                ("threshold", ParamValue::Int(30)),
                ("min_line_length", ParamValue::Int(30)),
                ("max_line_gap", ParamValue::Int(5)),
            ],
        )
    }

    fn disc_detector() -> HoughTransform {
        configured(
            HoughTransform::new(),
            &[
                ("transform_type", ParamValue::Choice("circles".into())),
                ("min_dist", ParamValue::Float(20.0)),
                ("param1", ParamValue::Float(100.0)),
                ("param2", ParamValue::Int(15)),
                ("min_radius", ParamValue::Int(10)),
                ("max_radius", ParamValue::Int(20)),
            ],
        )
    }

    #[test]
    fn horizontal_boundary_is_one_segment() {
        let segments = short_lines().lines(&half_plane()).unwrap();
        assert_eq!(segments.len(), 1, "segments: {segments:?}");
        let s = segments[0];
        assert!(s.length() >= 60.0, "{s:?}");
        assert!((30..=32).contains(&s.start.1) && (30..=32).contains(&s.end.1), "{s:?}");
    }

    #[test]
    fn segments_shorter_than_minimum_are_dropped() {
        let tool = configured(short_lines(), &[("min_line_length", ParamValue::Int(100))]);
        assert!(tool.lines(&half_plane()).unwrap().is_empty());
    }

    #[test]
    fn default_threshold_needs_more_votes_than_a_small_image_has() {
        assert!(HoughTransform::new().lines(&half_plane()).unwrap().is_empty());
    }

    #[test]
    fn lines_are_drawn_over_luma() {
        let img = rgb_from_fn(64, 64, |_, y| if y < 32 { [0, 0, 90] } else { [200, 200, 200] });
        let out = short_lines().apply(&img).unwrap();
        assert_eq!(out.layout(), PixelLayout::Rgb);
        for x in 8..56 {
            assert!(
                (29..=33).any(|y| out.pixel(x, y) == GREEN),
                "no stroke at column {x}"
            );
        }
        // Away from the stroke the image is gray.
        let px = out.pixel(5, 5);
        assert!(px[0] == px[1] && px[1] == px[2]);
    }

    #[test]
    fn disc_is_found_once() {
        let img = gray_from_fn(64, 64, |x, y| {
            let (dx, dy) = (x as f32 - 32.0, y as f32 - 32.0);
            if dx.hypot(dy) <= 15.0 { 200 } else { 0 }
        });
        let circles = disc_detector().circles(&img).unwrap();
        assert_eq!(circles.len(), 1, "circles: {circles:?}");
        let c = circles[0];
        assert!((c.x - 32.0).abs() <= 2.0 && (c.y - 32.0).abs() <= 2.0, "{c:?}");
        assert!((c.radius - 15.0).abs() <= 2.0, "{c:?}");
    }

    #[test]
    fn flat_image_has_no_detections() {
        let img = RasterImage::filled(40, 40, PixelLayout::Rgb, 120);
        assert!(short_lines().lines(&img).unwrap().is_empty());
        assert!(disc_detector().circles(&img).unwrap().is_empty());
        assert_eq!(disc_detector().apply(&img).unwrap(), img);
    }

    #[test]
    fn radius_bounds_are_checked() {
        let mut tool = HoughTransform::new();
        let update = ParamMap::from([
            ("min_radius".to_string(), ParamValue::Int(20)),
            ("max_radius".to_string(), ParamValue::Int(10)),
        ]);
        assert!(matches!(
            tool.update_parameters(&update),
            Err(ValidationError::Constraint(_))
        ));
        let open_ended = ParamMap::from([("min_radius".to_string(), ParamValue::Int(20))]);
        tool.update_parameters(&open_ended).unwrap();
    }

    #[test]
    fn empty_input_fails() {
        let img = RasterImage::filled(0, 0, PixelLayout::Gray, 0);
        assert_eq!(
            HoughTransform::new().apply(&img).unwrap_err(),
            ProcessingError::EmptyImage
        );
    }
}
