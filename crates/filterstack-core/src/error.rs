use std::path::PathBuf;

use thiserror::Error;

use crate::raster::PixelLayout;

/// Raster construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("expected {expected} bytes for {width}x{height} {layout:?}, got {found}")]
    DataLength {
        width: u32,
        height: u32,
        layout: PixelLayout,
        expected: usize,
        found: usize,
    },
}

/// A tool rejected a proposed parameter update. Nothing was applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    #[error("parameter `{name}` expects {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("parameter `{name}` = {value} is outside {min}..={max}")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("parameter `{name}` must be odd, got {value}")]
    NotOdd { name: String, value: i64 },

    #[error("parameter `{name}` must be one of {options:?}, got `{value}`")]
    InvalidChoice {
        name: String,
        value: String,
        options: Vec<String>,
    },

    #[error("cannot parse `{text}` as {expected} for parameter `{name}`")]
    Unparseable {
        name: String,
        text: String,
        expected: &'static str,
    },

    #[error("{0}")]
    Constraint(String),
}

/// A tool could not produce output for the given input and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("input image is empty")]
    EmptyImage,

    #[error("expected a {expected:?} image, got {found:?}")]
    UnsupportedLayout {
        expected: PixelLayout,
        found: PixelLayout,
    },

    #[error("kernel size {kernel} exceeds image dimensions {width}x{height}")]
    KernelTooLarge { kernel: u32, width: u32, height: u32 },

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported image extension: {}", path.display())]
    UnsupportedExtension { path: PathBuf },

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Outcome of a rejected pipeline operation. The pipeline state is
/// unchanged whenever one of these is returned.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no image loaded")]
    NotLoaded,

    #[error("step index {index} out of bounds for {len} steps")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("step {index} ({tool}) failed")]
    StepFailed {
        index: usize,
        tool: String,
        #[source]
        source: ProcessingError,
    },

    #[error("invalid parameters for step {index} ({tool})")]
    InvalidParameters {
        index: usize,
        tool: String,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl PipelineError {
    /// Index and name of the step that caused the failure, if any.
    pub fn offending_step(&self) -> Option<(usize, &str)> {
        match self {
            Self::StepFailed { index, tool, .. } | Self::InvalidParameters { index, tool, .. } => {
                Some((*index, tool.as_str()))
            }
            _ => None,
        }
    }
}
