//! Built-in tools, grouped by category.

mod adjust;
mod blur;
mod colors;
mod denoise;
mod draw;
mod edges;
mod effects;
mod features;
mod hough;
pub(crate) mod kernel;
mod morphology;
mod threshold;

pub use adjust::{
    BrightnessAdjustment, ContrastAdjustment, ExposureAdjustment, GammaCorrection,
    VibranceAdjustment,
};
pub use blur::{
    BilateralFilter, GaussianBlur, GaussianNoiseReduction, HighPassFilter, MedianBlur,
    UnsharpMasking,
};
pub use colors::{
    ColorBalancing, GrayscaleConversion, HueAdjustment, InvertColors, SaturationAdjustment,
    SelectiveColorReplacement, SepiaEffect,
};
pub use denoise::NonLocalMeansDenoising;
pub use edges::{CannyEdgeDetection, LaplacianEdgeDetection, PrewittOperator, SobelFilter};
pub use effects::{DarkenImage, FlippingMirroring, LaplacianSharpening, Posterization};
pub use features::{FastCornerDetection, Keypoint, ORBFeatureDetection};
pub use hough::{Circle, HoughTransform, Segment};
pub use morphology::{BlackHatTransform, Closing, Dilation, Erosion, Opening, TopHatTransform};
pub use threshold::{AdaptiveThreshold, OtsuThreshold, SimpleThreshold};
