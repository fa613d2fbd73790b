use crate::error::{ProcessingError, ValidationError};
use crate::params::{ParamSet, ParamSpec};
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::{PixelLayout, RasterImage};

use super::kernel::{Plane, ensure_window_fits, filter2d, laplacian, sobel, window_param};

const DIRECTIONS: &[&str] = &["x", "y", "both"];

declare_tool!(
    /// Absolute Sobel derivative of the luma channel.
    SobelFilter,
    [
        ParamSpec::odd("kernel_size", 3, 1, 7),
        ParamSpec::int("dx", 1, 0, 2),
        ParamSpec::int("dy", 1, 0, 2),
        ParamSpec::positive("scale", 1.0, 0.0, 100.0),
    ]
);

impl Tool for SobelFilter {
    tool_state!();

    fn check(&self, candidate: &ParamSet) -> Result<(), ValidationError> {
        let order = |name: &str| candidate.get_int(name).unwrap_or(0);
        if order("dx") + order("dy") < 1 {
            return Err(ValidationError::Constraint(
                "at least one of `dx` and `dy` must be positive".into(),
            ));
        }
        Ok(())
    }

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let size = window_param(&self.params, "kernel_size")?;
        ensure_window_fits(image, size)?;
        let dx = window_param(&self.params, "dx")?;
        let dy = window_param(&self.params, "dy")?;
        let scale = self.params.get_float("scale")? as f32;

        let grad = sobel(&Plane::luma(image), dx, dy, size);
        Ok(grad.map(|v| (v * scale).abs()).to_gray_raster())
    }
}

/// Canny edge map of `luma`: gradient magnitude from `aperture`-sized Sobel
/// derivatives, non-maximum suppression along the quantized gradient
/// direction and hysteresis between `low` and `high`.
pub(crate) fn canny(luma: &Plane, low: f32, high: f32, aperture: usize, l2: bool) -> Vec<bool> {
    let gx = sobel(luma, 1, 0, aperture);
    let gy = sobel(luma, 0, 1, aperture);
    let mag = gx.zip(&gy, |a, b| {
        if l2 {
            (a * a + b * b).sqrt()
        } else {
            a.abs() + b.abs()
        }
    });

    let (w, h) = (luma.width, luma.height);
    let at = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0.0
        } else {
            mag.data[y as usize * w + x as usize]
        }
    };

    const TAN_22_5: f32 = 0.414_213_56;
    const TAN_67_5: f32 = 2.414_213_6;
    const WEAK: u8 = 1;
    const STRONG: u8 = 2;

    let mut state = vec![0u8; w * h];
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let m = mag.data[idx];
            if m <= low {
                continue;
            }
            let (xi, yi) = (x as isize, y as isize);
            let (ax, ay) = (gx.data[idx].abs(), gy.data[idx].abs());
            let is_max = if ay < ax * TAN_22_5 {
                m > at(xi - 1, yi) && m >= at(xi + 1, yi)
            } else if ay > ax * TAN_67_5 {
                m > at(xi, yi - 1) && m >= at(xi, yi + 1)
            } else {
                let s = if (gx.data[idx] < 0.0) != (gy.data[idx] < 0.0) {
                    -1
                } else {
                    1
                };
                m > at(xi - s, yi - 1) && m > at(xi + s, yi + 1)
            };
            if !is_max {
                continue;
            }
            if m > high {
                state[idx] = STRONG;
                stack.push((x, y));
            } else {
                state[idx] = WEAK;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let nidx = ny * w + nx;
                if state[nidx] == WEAK {
                    state[nidx] = STRONG;
                    stack.push((nx, ny));
                }
            }
        }
    }

    state.into_iter().map(|s| s == STRONG).collect()
}

declare_tool!(
    /// Canny edge detector: Sobel gradients, non-maximum suppression along
    /// the quantized gradient direction and hysteresis between the two
    /// thresholds.
    CannyEdgeDetection,
    [
        ParamSpec::float("threshold1", 100.0, 0.0, 1000.0),
        ParamSpec::float("threshold2", 200.0, 0.0, 1000.0),
        ParamSpec::odd("aperture_size", 3, 3, 7),
        ParamSpec::flag("l2gradient", false),
    ]
);

impl Tool for CannyEdgeDetection {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let aperture = window_param(&self.params, "aperture_size")?;
        ensure_window_fits(image, aperture)?;
        let t1 = self.params.get_float("threshold1")? as f32;
        let t2 = self.params.get_float("threshold2")? as f32;
        let (low, high) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        let l2 = self.params.get_bool("l2gradient")?;

        let edges = canny(&Plane::luma(image), low, high, aperture, l2);
        let data = edges
            .into_iter()
            .map(|edge| if edge { 255 } else { 0 })
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
    /// Absolute Laplacian of the luma channel, `|scale * lap + delta|`.
    LaplacianEdgeDetection,
    [
        ParamSpec::odd("kernel_size", 3, 1, 7),
        ParamSpec::positive("scale", 1.0, 0.0, 100.0),
        ParamSpec::float("delta", 0.0, -255.0, 255.0),
    ]
);

impl Tool for LaplacianEdgeDetection {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let size = window_param(&self.params, "kernel_size")?;
        ensure_window_fits(image, size)?;
        let scale = self.params.get_float("scale")? as f32;
        let delta = self.params.get_float("delta")? as f32;

        let lap = laplacian(&Plane::luma(image), size);
        Ok(lap.map(|v| (v * scale + delta).abs()).to_gray_raster())
    }
}

declare_tool!(
    /// Prewitt gradient of the luma channel. Directional responses are
    /// saturated to `0..=255`; `both` combines them as a magnitude.
    PrewittOperator,
    [
        ParamSpec::choice("direction", "both", DIRECTIONS),
        ParamSpec::positive("scale", 1.0, 0.0, 100.0),
    ]
);

impl Tool for PrewittOperator {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        ensure_window_fits(image, 3)?;
        let scale = self.params.get_float("scale")? as f32;
        let luma = Plane::luma(image);

        let kx = [-1.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0].map(|k: f32| k * scale);
        let ky = [-1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0].map(|k: f32| k * scale);
        let saturate = |v: f32| v.clamp(0.0, 255.0);

        let gradient = match self.params.get_choice("direction")? {
            "x" => filter2d(&luma, &kx, 3).map(saturate),
            "y" => filter2d(&luma, &ky, 3).map(saturate),
            _ => {
                let gx = filter2d(&luma, &kx, 3).map(saturate);
                let gy = filter2d(&luma, &ky, 3).map(saturate);
                gx.zip(&gy, |a, b| (a * a + b * b).sqrt())
            }
        };
        Ok(gradient.to_gray_raster())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamMap, ParamValue};
    use crate::pipeline::tools::test_support::{configured, gray_from_fn, rgb_from_fn};

    fn square(size: u32) -> RasterImage {
        gray_from_fn(size, size, |x, y| {
            if (8..24).contains(&x) && (8..24).contains(&y) {
                255
            } else {
                0
            }
        })
    }

    fn lit(img: &RasterImage) -> usize {
        img.data().iter().filter(|&&v| v > 0).count()
    }

    #[test]
    fn sobel_outputs_gray_from_rgb() {
        let img = rgb_from_fn(8, 8, |x, _| [(x * 30) as u8; 3]);
        let tool = configured(SobelFilter::new(), &[("dy", ParamValue::Int(0))]);
        let out = tool.apply(&img).unwrap();
        assert_eq!(out.layout(), PixelLayout::Gray);
        // Central difference of 60, times the 1-2-1 smoothing sum.
        assert_eq!(out.pixel(4, 4)[0], 240);
    }

    #[test]
    fn sobel_requires_some_derivative() {
        let mut tool = SobelFilter::new();
        let update: ParamMap = [
            ("dx".to_string(), ParamValue::Int(0)),
            ("dy".to_string(), ParamValue::Int(0)),
        ]
        .into();
        assert!(matches!(
            tool.update_parameters(&update),
            Err(ValidationError::Constraint(_))
        ));
        assert_eq!(tool.get_parameters()["dx"], ParamValue::Int(1));
    }

    #[test]
    fn canny_finds_square_outline() {
        let out = CannyEdgeDetection::new().apply(&square(32)).unwrap();
        assert_eq!(out.layout(), PixelLayout::Gray);
        assert!(out.data().iter().all(|&v| v == 0 || v == 255));
        assert!(lit(&out) > 0);
        assert_eq!(out.pixel(16, 16)[0], 0);
        assert_eq!(out.pixel(2, 2)[0], 0);
    }

    #[test]
    fn canny_uniform_image_has_no_edges() {
        let img = RasterImage::filled(16, 16, PixelLayout::Gray, 90);
        let out = CannyEdgeDetection::new().apply(&img).unwrap();
        assert_eq!(lit(&out), 0);
    }

    #[test]
    fn canny_higher_thresholds_find_fewer_edges() {
        let img = gray_from_fn(32, 32, |x, y| ((x * 7 + y * 3) % 40 * 6) as u8);
        let loose = configured(
            CannyEdgeDetection::new(),
            &[("threshold1", ParamValue::Int(10)), ("threshold2", ParamValue::Int(50))],
        );
        let strict = configured(
            CannyEdgeDetection::new(),
            &[("threshold1", ParamValue::Int(400)), ("threshold2", ParamValue::Int(900))],
        );
        assert!(lit(&loose.apply(&img).unwrap()) >= lit(&strict.apply(&img).unwrap()));
    }

    #[test]
    fn canny_aperture_must_fit() {
        let tool = configured(
            CannyEdgeDetection::new(),
            &[("aperture_size", ParamValue::Int(7))],
        );
        let img = RasterImage::filled(5, 20, PixelLayout::Gray, 0);
        assert!(matches!(
            tool.apply(&img),
            Err(ProcessingError::KernelTooLarge { kernel: 7, .. })
        ));
    }

    #[test]
    fn laplacian_flat_is_delta() {
        let img = RasterImage::filled(6, 6, PixelLayout::Rgb, 40);
        let tool = configured(
            LaplacianEdgeDetection::new(),
            &[("delta", ParamValue::Float(-12.0))],
        );
        let out = tool.apply(&img).unwrap();
        assert!(out.data().iter().all(|&v| v == 12));
    }

    #[test]
    fn laplacian_responds_to_spot() {
        let img = gray_from_fn(7, 7, |x, y| if x == 3 && y == 3 { 50 } else { 0 });
        let out = LaplacianEdgeDetection::new().apply(&img).unwrap();
        assert_eq!(out.pixel(3, 3)[0], 255);
        assert_eq!(out.pixel(0, 0)[0], 0);
    }

    #[test]
    fn prewitt_directions() {
        let img = gray_from_fn(6, 6, |x, _| if x < 3 { 0 } else { 60 });
        let x_only = configured(PrewittOperator::new(), &[("direction", "x".into())]);
        let y_only = configured(PrewittOperator::new(), &[("direction", "y".into())]);

        assert_eq!(x_only.apply(&img).unwrap().pixel(2, 3)[0], 180);
        assert!(y_only.apply(&img).unwrap().data().iter().all(|&v| v == 0));
        assert_eq!(PrewittOperator::new().apply(&img).unwrap().pixel(2, 3)[0], 180);
    }

    #[test]
    fn prewitt_rejects_unknown_direction() {
        let mut tool = PrewittOperator::new();
        let update: ParamMap = [(
            "direction".to_string(),
            ParamValue::Choice("diagonal".into()),
        )].into();
        assert!(matches!(
            tool.update_parameters(&update),
            Err(ValidationError::InvalidChoice { .. })
        ));
        assert_eq!(tool.get_valid_options()["direction"], vec!["x", "y", "both"]);
    }
}
