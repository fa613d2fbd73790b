//! Color-space helpers on normalized `f32` samples. 8-bit rasters enter and
//! leave through [`srgb_u8_to_linear`], [`linear_to_srgb_u8`] and [`to_u8`].

use std::sync::LazyLock;

/// Linear RGB to the LMS cone response used by OKLab.
const RGB_TO_LMS: [[f32; 3]; 3] = [
    [0.412_221_46, 0.536_332_55, 0.051_445_995],
    [0.211_903_5, 0.680_699_5, 0.107_396_96],
    [0.088_302_46, 0.281_718_85, 0.629_978_7],
];

/// Rows producing the OKLab `a` and `b` axes from cube-rooted LMS.
const LMS_TO_AB: [[f32; 3]; 2] = [
    [1.977_998_5, -2.428_592_2, 0.450_593_7],
    [0.025_904_037, 0.782_771_77, -0.808_675_77],
];

/// Upper bound of OKLab chroma over the sRGB gamut (pure magenta peaks
/// near 0.323).
pub const OKLAB_MAX_CHROMA: f32 = 0.33;

fn dot(row: &[f32; 3], v: [f32; 3]) -> f32 {
    row[0] * v[0] + row[1] * v[1] + row[2] * v[2]
}

/// sRGB decoding curve, `[0, 1]` in both domains.
pub fn srgb_to_linear(encoded: f32) -> f32 {
    if encoded > 0.04045 {
        ((encoded + 0.055) / 1.055).powf(2.4)
    } else {
        encoded / 12.92
    }
}

/// sRGB encoding curve, inverse of [`srgb_to_linear`].
pub fn linear_to_srgb(linear: f32) -> f32 {
    if linear > 0.003_130_8 {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    } else {
        linear * 12.92
    }
}

static DECODE_LUT: LazyLock<[f32; 256]> =
    LazyLock::new(|| std::array::from_fn(|i| srgb_to_linear(i as f32 / 255.0)));

pub fn srgb_u8_to_linear(v: u8) -> f32 {
    DECODE_LUT[usize::from(v)]
}

pub fn linear_to_srgb_u8(v: f32) -> u8 {
    to_u8(linear_to_srgb(v.clamp(0.0, 1.0)) * 255.0)
}

/// Chroma (distance from the neutral axis) of a linear RGB color in OKLab.
pub fn oklab_chroma(r: f32, g: f32, b: f32) -> f32 {
    let lms = RGB_TO_LMS.map(|row| dot(&row, [r, g, b]).max(0.0).cbrt());
    let [a, b] = LMS_TO_AB.map(|row| dot(&row, lms));
    a.hypot(b)
}

/// Rec. 709 luminance of linear RGB.
pub fn linear_luminance(r: f32, g: f32, b: f32) -> f32 {
    dot(&[0.2126, 0.7152, 0.0722], [r, g, b])
}

/// `[0, 1]` RGB to `(hue in degrees [0, 360), saturation, value)`.
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let delta = max - r.min(g).min(b);

    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (h, s, max)
}

/// Inverse of [`rgb_to_hsv`]; any hue angle is wrapped onto the circle.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let sector = h.rem_euclid(360.0) / 60.0;
    let c = v * s;
    let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match sector as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (r + m, g + m, b + m)
}

pub fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
