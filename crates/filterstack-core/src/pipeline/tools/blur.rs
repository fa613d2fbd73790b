use crate::color::to_u8;
use crate::error::ProcessingError;
use crate::params::ParamSpec;
use crate::pipeline::tool::{Tool, declare_tool, tool_state};
use crate::raster::RasterImage;

use super::kernel::{
    ensure_rect_fits, ensure_window_fits, gaussian_blur, reflect101, replicate, window_param,
};

declare_tool!(
    /// Separable Gaussian low-pass filter.
    GaussianBlur,
    [
        ParamSpec::odd("kernel_size", 5, 1, 99),
        ParamSpec::positive("sigma", 1.0, 0.0, 100.0),
    ]
);

impl Tool for GaussianBlur {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let size = window_param(&self.params, "kernel_size")?;
        ensure_window_fits(image, size)?;
        let sigma = self.params.get_float("sigma")?;
        Ok(gaussian_blur(image, size, size, sigma, sigma))
    }
}

declare_tool!(
    /// Gaussian smoothing with independent kernel sizes and sigmas per axis.
    /// A zero sigma is derived from the kernel size.
    GaussianNoiseReduction,
    [
        ParamSpec::odd("kernel_width", 5, 1, 31),
        ParamSpec::odd("kernel_height", 5, 1, 31),
        ParamSpec::float("sigma_x", 0.0, 0.0, 100.0),
        ParamSpec::float("sigma_y", 0.0, 0.0, 100.0),
    ]
);

impl Tool for GaussianNoiseReduction {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let kw = window_param(&self.params, "kernel_width")?;
        let kh = window_param(&self.params, "kernel_height")?;
        ensure_rect_fits(image, kw, kh)?;
        let sigma_x = self.params.get_float("sigma_x")?;
        let sigma_y = self.params.get_float("sigma_y")?;
        Ok(gaussian_blur(image, kw, kh, sigma_x, sigma_y))
    }
}

declare_tool!(
    /// Per-channel median over a square window, edges replicated.
    MedianBlur,
    [ParamSpec::odd("kernel_size", 5, 1, 31)]
);

impl Tool for MedianBlur {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let size = window_param(&self.params, "kernel_size")?;
        ensure_window_fits(image, size)?;
        if size == 1 {
            return Ok(image.clone());
        }

        let (w, h) = (image.width() as usize, image.height() as usize);
        let cn = image.channels();
        let r = (size / 2) as isize;
        let src = image.data();
        let mut data = vec![0u8; src.len()];
        let mut window = Vec::with_capacity(size * size);

        for y in 0..h {
            for x in 0..w {
                for c in 0..cn {
                    window.clear();
                    for dy in -r..=r {
                        let sy = replicate(y as isize + dy, h);
                        for dx in -r..=r {
                            let sx = replicate(x as isize + dx, w);
                            window.push(src[(sy * w + sx) * cn + c]);
                        }
                    }
                    let mid = window.len() / 2;
                    let (_, median, _) = window.select_nth_unstable(mid);
                    data[(y * w + x) * cn + c] = *median;
                }
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
    /// Edge-preserving smoothing: spatial Gaussian weights within a disc of
    /// diameter `d`, multiplied by a Gaussian on the L1 color distance to the
    /// center pixel.
    BilateralFilter,
    [
        ParamSpec::int("d", 9, 1, 25),
        ParamSpec::positive("sigma_color", 75.0, 0.0, 255.0),
        ParamSpec::positive("sigma_space", 75.0, 0.0, 255.0),
    ]
);

impl Tool for BilateralFilter {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let d = window_param(&self.params, "d")?;
        ensure_window_fits(image, d)?;
        let sigma_color = self.params.get_float("sigma_color")? as f32;
        let sigma_space = self.params.get_float("sigma_space")? as f32;

        let radius = (d / 2) as isize;
        if radius == 0 {
            return Ok(image.clone());
        }

        let space_coeff = -0.5 / (sigma_space * sigma_space);
        let color_coeff = -0.5 / (sigma_color * sigma_color);

        let mut offsets = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let r2 = (dx * dx + dy * dy) as f32;
                if r2.sqrt() <= radius as f32 {
                    offsets.push((dx, dy, (r2 * space_coeff).exp()));
                }
            }
        }

        let cn = image.channels();
        let color_weight: Vec<f32> = (0..256 * cn)
            .map(|i| ((i * i) as f32 * color_coeff).exp())
            .collect();

        let (w, h) = (image.width() as usize, image.height() as usize);
        let src = image.data();
        let mut data = Vec::with_capacity(src.len());
        let mut acc = vec![0.0f32; cn];

        for y in 0..h {
            for x in 0..w {
                let center = &src[(y * w + x) * cn..(y * w + x + 1) * cn];
                acc.iter_mut().for_each(|a| *a = 0.0);
                let mut wsum = 0.0f32;

                for &(dx, dy, ws) in &offsets {
                    let sx = reflect101(x as isize + dx, w);
                    let sy = reflect101(y as isize + dy, h);
                    let px = &src[(sy * w + sx) * cn..(sy * w + sx + 1) * cn];
                    let dist: usize = px
                        .iter()
                        .zip(center)
                        .map(|(&a, &b)| a.abs_diff(b) as usize)
                        .sum();
                    let weight = ws * color_weight[dist];
                    for (a, &v) in acc.iter_mut().zip(px) {
                        *a += weight * v as f32;
                    }
                    wsum += weight;
                }

                data.extend(acc.iter().map(|&a| to_u8(a / wsum)));
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
    /// Sharpen by adding back `amount` times the difference to a Gaussian
    /// blur. With a positive `threshold`, pixels whose change stays within it
    /// keep their original value.
    UnsharpMasking,
    [
        ParamSpec::odd("kernel_size", 5, 1, 31),
        ParamSpec::float("amount", 1.5, 0.0, 10.0),
        ParamSpec::float("threshold", 0.0, 0.0, 255.0),
    ]
);

impl Tool for UnsharpMasking {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let size = window_param(&self.params, "kernel_size")?;
        ensure_window_fits(image, size)?;
        let amount = self.params.get_float("amount")? as f32;
        let threshold = self.params.get_float("threshold")? as f32;

        let blurred = gaussian_blur(image, size, size, 0.0, 0.0);
        let data = image
            .data()
            .iter()
            .zip(blurred.data())
            .map(|(&orig, &blur)| {
                let sharp = to_u8((1.0 + amount) * orig as f32 - amount * blur as f32);
                if threshold > 0.0 && (sharp.abs_diff(orig) as f32) <= threshold {
                    orig
                } else {
                    sharp
                }
            })
            .collect();

        Ok(RasterImage::from_vec(
            image.width(),
            image.height(),
            image.layout(),
            data,
        ))
    }
}

declare_tool!(
    /// Detail layer: the image minus its Gaussian blur, saturated at zero.
    HighPassFilter,
    [
        ParamSpec::odd("kernel_size", 3, 1, 31),
        ParamSpec::positive("sigma", 1.0, 0.0, 100.0),
    ]
);

impl Tool for HighPassFilter {
    tool_state!();

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
        let size = window_param(&self.params, "kernel_size")?;
        ensure_window_fits(image, size)?;
        let sigma = self.params.get_float("sigma")?;

        let blurred = gaussian_blur(image, size, size, sigma, sigma);
        let data = image
            .data()
            .iter()
            .zip(blurred.data())
            .map(|(&orig, &blur)| orig.saturating_sub(blur))
            .collect();

        Ok(RasterImage::from_vec(
            image.width(),
            image.height(),
            image.layout(),
            data,
        ))
    }
}
