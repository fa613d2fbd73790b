use crate::error::{ProcessingError, ValidationError};
use crate::params::{ParamSet, ParamSpec};
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::RasterImage;

use super::kernel::{Plane, ensure_window_fits, merge, reflect101, sep_filter, split, window_param};

declare_tool!(
    /// Non-local means denoising. Every pixel becomes a weighted mean of the
    /// pixels in its search window, weighted by how closely their template
    /// patches match its own: `exp(-d² / h²)` with `d²` the mean squared
    /// patch difference over all channels.
    NonLocalMeansDenoising,
    [
        ParamSpec::positive("h", 10.0, 0.0, 100.0),
        ParamSpec::odd("template_window_size", 7, 1, 21),
        ParamSpec::odd("search_window_size", 21, 3, 63),
    ]
);

impl Tool for NonLocalMeansDenoising {
    tool_state!();

    fn check(&self, candidate: &ParamSet) -> Result<(), ValidationError> {
        let template = candidate.get_int("template_window_size").unwrap_or(0);
        let search = candidate.get_int("search_window_size").unwrap_or(0);
        if search <= template {
            return Err(ValidationError::Constraint(format!(
                "search_window_size ({search}) must be larger than template_window_size ({template})"
            )));
        }
        Ok(())
    }

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let template = window_param(&self.params, "template_window_size")?;
        ensure_window_fits(image, template)?;
        let search = window_param(&self.params, "search_window_size")?;
        let h = self.params.get_float("h")? as f32;

        let planes = split(image);
        let (w, ht) = (image.width() as usize, image.height() as usize);
        let n = w * ht;
        let cn = planes.len() as f32;
        let inv_h2 = 1.0 / (h * h);
        let box_kernel = vec![1.0 / template as f32; template];
        let radius = (search / 2) as isize;

        let mut acc = vec![vec![0.0f32; n]; planes.len()];
        let mut weights = vec![0.0f32; n];
        let mut shifted = vec![0usize; n];
        let mut diff = Plane {
            width: w,
            height: ht,
            data: vec![0.0; n],
        };

        // One pass per offset: the patch distance for every pixel at once is
        // the box mean of the per-pixel squared difference to the shifted image.
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                for y in 0..ht {
                    let sy = reflect101(y as isize + dy, ht);
                    for x in 0..w {
                        let sx = reflect101(x as isize + dx, w);
                        shifted[y * w + x] = sy * w + sx;
                    }
                }

                for (i, d) in diff.data.iter_mut().enumerate() {
                    *d = planes
                        .iter()
                        .map(|p| {
                            let delta = p.data[i] - p.data[shifted[i]];
                            delta * delta
                        })
                        .sum::<f32>()
                        / cn;
                }

                let distance = sep_filter(&diff, &box_kernel, &box_kernel);
                for i in 0..n {
                    let weight = (-distance.data[i].max(0.0) * inv_h2).exp();
                    weights[i] += weight;
                    for (a, p) in acc.iter_mut().zip(&planes) {
                        a[i] += weight * p.data[shifted[i]];
                    }
                }
            }
        }

        let out: Vec<Plane> = acc
            .into_iter()
            .map(|sums| Plane {
                width: w,
                height: ht,
                data: sums.iter().zip(&weights).map(|(s, wsum)| s / wsum).collect(),
            })
            .collect();
        Ok(merge(&out, image.layout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamMap, ParamValue};
    use crate::pipeline::tools::test_support::{configured, gray_from_fn, rgb_from_fn};
    use crate::raster::PixelLayout;

    fn small_windows(h: f64) -> NonLocalMeansDenoising {
        configured(
            NonLocalMeansDenoising::new(),
            &[
                ("h", ParamValue::Float(h)),
                ("template_window_size", ParamValue::Int(3)),
                ("search_window_size", ParamValue::Int(7)),
            ],
        )
    }

    fn variance(data: &[u8]) -> f64 {
        let mean = data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64;
        data.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / data.len() as f64
    }

    #[test]
    fn flat_image_is_unchanged() {
        let img = RasterImage::filled(10, 10, PixelLayout::Rgb, 90);
        assert_eq!(small_windows(10.0).apply(&img).unwrap(), img);
    }

    #[test]
    fn noise_is_reduced() {
        let img = gray_from_fn(12, 12, |x, y| (100 + (x * 7 + y * 13) % 21) as u8 - 10);
        let out = small_windows(30.0).apply(&img).unwrap();
        assert!(variance(out.data()) < variance(img.data()) / 2.0);
    }

    #[test]
    fn strong_edges_survive() {
        let img = rgb_from_fn(12, 12, |x, _| if x < 6 { [0, 0, 0] } else { [200, 200, 200] });
        assert_eq!(small_windows(10.0).apply(&img).unwrap(), img);
    }

    #[test]
    fn search_window_must_exceed_template() {
        let mut tool = NonLocalMeansDenoising::new();
        let update = ParamMap::from([("search_window_size".to_string(), ParamValue::Int(7))]);
        assert!(matches!(
            tool.update_parameters(&update),
            Err(ValidationError::Constraint(_))
        ));
        assert_eq!(tool.get_parameters()["search_window_size"], ParamValue::Int(21));
    }

    #[test]
    fn template_larger_than_image_fails() {
        let img = RasterImage::filled(4, 4, PixelLayout::Gray, 1);
        assert_eq!(
            NonLocalMeansDenoising::new().apply(&img).unwrap_err(),
            ProcessingError::KernelTooLarge {
                kernel: 7,
                width: 4,
                height: 4
            }
        );
    }
}
