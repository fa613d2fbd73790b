//! Shared primitives for the windowed tools: precondition checks, border
//! handling, float planes and the classic separable kernels.

use crate::color::to_u8;
use crate::error::ProcessingError;
use crate::params::ParamSet;
use crate::raster::{PixelLayout, RasterImage};

pub(crate) fn ensure_not_empty(image: &RasterImage) -> Result<(), ProcessingError> {
    if image.is_empty() {
        return Err(ProcessingError::EmptyImage);
    }
    Ok(())
}

pub(crate) fn require_rgb(image: &RasterImage) -> Result<(), ProcessingError> {
    ensure_not_empty(image)?;
    if image.layout() != PixelLayout::Rgb {
        return Err(ProcessingError::UnsupportedLayout {
            expected: PixelLayout::Rgb,
            found: image.layout(),
        });
    }
    Ok(())
}

/// Fails when a `window`-wide square kernel does not fit inside the image.
pub(crate) fn ensure_window_fits(image: &RasterImage, window: usize) -> Result<(), ProcessingError> {
    ensure_rect_fits(image, window, window)
}

pub(crate) fn ensure_rect_fits(
    image: &RasterImage,
    kernel_w: usize,
    kernel_h: usize,
) -> Result<(), ProcessingError> {
    ensure_not_empty(image)?;
    if kernel_w > image.width() as usize || kernel_h > image.height() as usize {
        return Err(ProcessingError::KernelTooLarge {
            kernel: kernel_w.max(kernel_h) as u32,
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}

/// Integer parameter as a window size. The declared domain keeps it positive.
pub(crate) fn window_param(params: &ParamSet, name: &str) -> Result<usize, ProcessingError> {
    let v = params.get_int(name)?;
    usize::try_from(v).map_err(|_| ProcessingError::Failed(format!("`{name}` must be positive")))
}

/// Mirror an out-of-range coordinate without repeating the edge sample
/// (`gfedcb|abcdefgh|gfedcba`).
pub(crate) fn reflect101(coord: isize, len: usize) -> usize {
    let n = len as isize;
    if n <= 1 {
        return 0;
    }
    let period = 2 * n - 2;
    let mut c = coord % period;
    if c < 0 {
        c += period;
    }
    if c >= n {
        c = period - c;
    }
    c as usize
}

pub(crate) fn replicate(coord: isize, len: usize) -> usize {
    coord.clamp(0, len as isize - 1) as usize
}

/// One channel of a raster as f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn channel(image: &RasterImage, channel: usize) -> Self {
        let step = image.channels();
        let data = image
            .data()
            .iter()
            .skip(channel)
            .step_by(step)
            .map(|&v| v as f32)
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data,
        }
    }

    /// Luma plane; gray input is taken as is.
    pub fn luma(image: &RasterImage) -> Self {
        Self::channel(&image.to_gray(), 0)
    }

    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn zip(&self, other: &Plane, f: impl Fn(f32, f32) -> f32) -> Self {
        debug_assert_eq!(self.data.len(), other.data.len());
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// Round and saturate into a gray raster.
    pub fn to_gray_raster(&self) -> RasterImage {
        merge(std::slice::from_ref(self), PixelLayout::Gray)
    }
}

pub(crate) fn split(image: &RasterImage) -> Vec<Plane> {
    (0..image.channels())
        .map(|c| Plane::channel(image, c))
        .collect()
}

/// Interleave planes back into a raster, rounding and saturating to u8.
pub(crate) fn merge(planes: &[Plane], layout: PixelLayout) -> RasterImage {
    debug_assert_eq!(planes.len(), layout.channels());
    let (width, height) = (planes[0].width, planes[0].height);
    let mut data = Vec::with_capacity(width * height * planes.len());
    for i in 0..width * height {
        for plane in planes {
            data.push(to_u8(plane.data[i]));
        }
    }
    RasterImage::from_vec(width as u32, height as u32, layout, data)
}

/// Apply `f` to every channel plane and reassemble with the input layout.
pub(crate) fn map_planes(image: &RasterImage, f: impl Fn(&Plane) -> Plane) -> RasterImage {
    let planes: Vec<Plane> = split(image).iter().map(f).collect();
    merge(&planes, image.layout())
}

/// Separable correlation with reflect-101 borders: rows with `kx`, then
/// columns with `ky`.
pub(crate) fn sep_filter(plane: &Plane, kx: &[f32], ky: &[f32]) -> Plane {
    let (w, h) = (plane.width, plane.height);
    let rx = (kx.len() / 2) as isize;
    let ry = (ky.len() / 2) as isize;

    let mut rows = vec![0.0f32; w * h];
    for y in 0..h {
        let src = &plane.data[y * w..(y + 1) * w];
        for x in 0..w {
            rows[y * w + x] = kx
                .iter()
                .enumerate()
                .map(|(i, &k)| k * src[reflect101(x as isize + i as isize - rx, w)])
                .sum();
        }
    }

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            out[y * w + x] = ky
                .iter()
                .enumerate()
                .map(|(i, &k)| k * rows[reflect101(y as isize + i as isize - ry, h) * w + x])
                .sum();
        }
    }

    Plane {
        width: w,
        height: h,
        data: out,
    }
}

/// Dense `size`x`size` correlation with reflect-101 borders.
pub(crate) fn filter2d(plane: &Plane, kernel: &[f32], size: usize) -> Plane {
    debug_assert_eq!(kernel.len(), size * size);
    let (w, h) = (plane.width, plane.height);
    let r = (size / 2) as isize;
    let mut out = vec![0.0f32; w * h];

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for ky in 0..size {
                let sy = reflect101(y as isize + ky as isize - r, h);
                for kx in 0..size {
                    let k = kernel[ky * size + kx];
                    if k != 0.0 {
                        let sx = reflect101(x as isize + kx as isize - r, w);
                        acc += k * plane.data[sy * w + sx];
                    }
                }
            }
            out[y * w + x] = acc;
        }
    }

    Plane {
        width: w,
        height: h,
        data: out,
    }
}

/// Normalized 1-D Gaussian. A non-positive `sigma` is derived from the size
/// as `0.3 * ((size - 1) / 2 - 1) + 0.8`; small sizes then use the fixed
/// binomial tables.
pub(crate) fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f32> {
    const FIXED: [&[f32]; 4] = [
        &[1.0],
        &[0.25, 0.5, 0.25],
        &[0.0625, 0.25, 0.375, 0.25, 0.0625],
        &[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
    ];

    if sigma <= 0.0 && size % 2 == 1 && size <= 7 {
        return FIXED[size / 2].to_vec();
    }

    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let center = (size as f64 - 1.0) * 0.5;
    let scale = -0.5 / (sigma * sigma);

    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Derivative kernel of the given `order` (binomial smoothing for order 0).
/// Size 1 is promoted to 3 for non-zero orders.
pub(crate) fn deriv_kernel(order: usize, size: usize) -> Vec<f32> {
    let size = if size == 1 && order > 0 { 3 } else { size };
    match (size, order) {
        (1, _) => return vec![1.0],
        (3, 0) => return vec![1.0, 2.0, 1.0],
        (3, 1) => return vec![-1.0, 0.0, 1.0],
        (3, _) => return vec![1.0, -2.0, 1.0],
        _ => {}
    }

    let mut k = vec![0i64; size + 1];
    k[0] = 1;
    for _ in 0..size - order - 1 {
        let mut old = k[0];
        for j in 1..=size {
            let new = k[j] + k[j - 1];
            k[j - 1] = old;
            old = new;
        }
    }
    for _ in 0..order {
        let mut old = -k[0];
        for j in 1..=size {
            let new = k[j - 1] - k[j];
            k[j - 1] = old;
            old = new;
        }
    }
    k.truncate(size);
    k.into_iter().map(|v| v as f32).collect()
}

/// Gaussian blur of every channel. `sigma_y <= 0` reuses `sigma_x`.
pub(crate) fn gaussian_blur(
    image: &RasterImage,
    size_x: usize,
    size_y: usize,
    sigma_x: f64,
    sigma_y: f64,
) -> RasterImage {
    let sigma_y = if sigma_y <= 0.0 { sigma_x } else { sigma_y };
    let kx = gaussian_kernel(size_x, sigma_x);
    let ky = gaussian_kernel(size_y, sigma_y);
    map_planes(image, |plane| sep_filter(plane, &kx, &ky))
}

/// Sobel derivative of the given orders.
pub(crate) fn sobel(plane: &Plane, dx: usize, dy: usize, size: usize) -> Plane {
    sep_filter(plane, &deriv_kernel(dx, size), &deriv_kernel(dy, size))
}

/// Sum of second derivatives. Sizes 1 and 3 use the dense 3x3 kernels.
pub(crate) fn laplacian(plane: &Plane, size: usize) -> Plane {
    match size {
        1 => filter2d(plane, &[0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0], 3),
        3 => filter2d(plane, &[2.0, 0.0, 2.0, 0.0, -8.0, 0.0, 2.0, 0.0, 2.0], 3),
        _ => {
            let d2x = sobel(plane, 2, 0, size);
            let d2y = sobel(plane, 0, 2, size);
            d2x.zip(&d2y, |a, b| a + b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect101_borders() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(2, 5), 2);
        assert_eq!(reflect101(-3, 1), 0);
        assert_eq!(reflect101(-3, 2), 1);
    }

    #[test]
    fn replicate_borders() {
        assert_eq!(replicate(-4, 5), 0);
        assert_eq!(replicate(9, 5), 4);
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        for &(size, sigma) in &[(5, 1.0), (11, 2.5), (9, 0.0), (3, 0.0)] {
            let k = gaussian_kernel(size, sigma);
            assert_eq!(k.len(), size);
            let sum: f32 = k.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "size {size} sums to {sum}");
            for i in 0..size / 2 {
                assert!((k[i] - k[size - 1 - i]).abs() < 1e-6);
            }
            assert!(k[size / 2] >= k[0]);
        }
    }

    #[test]
    fn derivative_kernels() {
        assert_eq!(deriv_kernel(0, 5), vec![1.0, 4.0, 6.0, 4.0, 1.0]);
        assert_eq!(deriv_kernel(1, 5), vec![-1.0, -2.0, 0.0, 2.0, 1.0]);
        assert_eq!(deriv_kernel(2, 5), vec![1.0, 0.0, -2.0, 0.0, 1.0]);
        assert_eq!(deriv_kernel(1, 1), vec![-1.0, 0.0, 1.0]);
        assert_eq!(deriv_kernel(0, 1), vec![1.0]);
    }

    #[test]
    fn window_check() {
        let img = RasterImage::filled(3, 5, PixelLayout::Gray, 0);
        assert!(ensure_window_fits(&img, 3).is_ok());
        assert_eq!(
            ensure_window_fits(&img, 5),
            Err(ProcessingError::KernelTooLarge {
                kernel: 5,
                width: 3,
                height: 5
            })
        );
    }

    #[test]
    fn rgb_required() {
        let gray = RasterImage::filled(2, 2, PixelLayout::Gray, 0);
        assert!(matches!(
            require_rgb(&gray),
            Err(ProcessingError::UnsupportedLayout { .. })
        ));
        let empty = RasterImage::filled(0, 0, PixelLayout::Rgb, 0);
        assert_eq!(require_rgb(&empty), Err(ProcessingError::EmptyImage));
    }

    #[test]
    fn split_merge_roundtrip() {
        let img = RasterImage::new(2, 1, PixelLayout::Rgb, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let planes = split(&img);
        assert_eq!(planes[1].data, vec![2.0, 5.0]);
        assert_eq!(merge(&planes, PixelLayout::Rgb), img);
    }

    #[test]
    fn blur_keeps_flat_image() {
        let img = RasterImage::filled(8, 6, PixelLayout::Rgb, 90);
        assert_eq!(gaussian_blur(&img, 5, 5, 1.2, 0.0), img);
    }

    #[test]
    fn sobel_on_ramp() {
        let data: Vec<f32> = (0..25).map(|i| (i % 5) as f32 * 10.0).collect();
        let plane = Plane {
            width: 5,
            height: 5,
            data,
        };
        let gx = sobel(&plane, 1, 0, 3);
        // Interior: (right - left) * (1 + 2 + 1) = 20 * 4.
        assert_eq!(gx.at(2, 2), 80.0);
        let gy = sobel(&plane, 0, 1, 3);
        assert_eq!(gy.at(2, 2), 0.0);
    }

    #[test]
    fn laplacian_of_flat_is_zero() {
        let plane = Plane {
            width: 6,
            height: 6,
            data: vec![42.0; 36],
        };
        for size in [1, 3, 5] {
            assert!(laplacian(&plane, size).data.iter().all(|&v| v.abs() < 1e-3));
        }
    }
}
