use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::RegistryError;
use crate::pipeline::tool::Tool;
use crate::pipeline::tools::*;

/// Grouping used by front ends to organize the tool list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ToolCategory {
    Adjustment,
    Filter,
    EdgeDetection,
    NoiseReduction,
    Morphological,
    Color,
    Effect,
    FeatureDetection,
    Threshold,
}

impl ToolCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Adjustment => "Adjustment",
            Self::Filter => "Filter",
            Self::EdgeDetection => "Edge Detection",
            Self::NoiseReduction => "Noise Reduction",
            Self::Morphological => "Morphological",
            Self::Color => "Color",
            Self::Effect => "Effect",
            Self::FeatureDetection => "Feature Detection",
            Self::Threshold => "Threshold",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub type ToolFactory = fn() -> Box<dyn Tool>;

struct Entry {
    name: &'static str,
    category: ToolCategory,
    factory: ToolFactory,
}

/// Name → factory table for every tool a pipeline can be built from.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
}

macro_rules! register_builtins {
    ($registry:expr, $($category:ident => [$($ty:ident),* $(,)?]),* $(,)?) => {
        $($(
            $registry.register($ty::NAME, ToolCategory::$category, || Box::new($ty::new()));
        )*)*
    };
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins!(registry,
            Adjustment => [
                BrightnessAdjustment,
                ContrastAdjustment,
                ExposureAdjustment,
                GammaCorrection,
                VibranceAdjustment,
            ],
            Filter => [
                BilateralFilter,
                GaussianBlur,
                MedianBlur,
                SobelFilter,
                UnsharpMasking,
                HighPassFilter,
            ],
            EdgeDetection => [CannyEdgeDetection, LaplacianEdgeDetection, PrewittOperator],
            NoiseReduction => [GaussianNoiseReduction, NonLocalMeansDenoising],
            Morphological => [
                Closing,
                Dilation,
                Erosion,
                Opening,
                TopHatTransform,
                BlackHatTransform,
            ],
            Color => [
                ColorBalancing,
                GrayscaleConversion,
                HueAdjustment,
                InvertColors,
                SaturationAdjustment,
                SelectiveColorReplacement,
            ],
            Effect => [
                DarkenImage,
                FlippingMirroring,
                LaplacianSharpening,
                Posterization,
                SepiaEffect,
            ],
            FeatureDetection => [ORBFeatureDetection, HoughTransform, FastCornerDetection],
            Threshold => [SimpleThreshold, AdaptiveThreshold, OtsuThreshold],
        );
        registry
    }

    /// Add or replace the entry for `name`. A replaced entry keeps its
    /// position in the listing.
    pub fn register(&mut self, name: &'static str, category: ToolCategory, factory: ToolFactory) {
        let entry = Entry {
            name,
            category,
            factory,
        };
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Tool names in registration order.
    pub fn list_available(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    /// A fresh tool instance with default parameters.
    pub fn create(&self, name: &str) -> Result<Box<dyn Tool>, RegistryError> {
        self.entry(name).map(|e| (e.factory)())
    }

    pub fn categories(&self) -> BTreeSet<ToolCategory> {
        self.entries.iter().map(|e| e.category).collect()
    }

    pub fn tools_in(&self, category: ToolCategory) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.name)
            .collect()
    }

    pub fn category_of(&self, name: &str) -> Result<ToolCategory, RegistryError> {
        self.entry(name).map(|e| e.category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Result<&Entry, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_available())
            .finish()
    }
}
