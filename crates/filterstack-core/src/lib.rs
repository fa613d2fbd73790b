//! Non-destructive image editing core: an ordered stack of configurable
//! tools applied to an immutable original.

pub mod codec;
pub mod color;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod raster;

pub use codec::{FileCodec, ImageCodec};
pub use error::{CodecError, PipelineError, ProcessingError, RegistryError, ValidationError};
pub use params::{ParamKind, ParamMap, ParamSpec, ParamValue};
pub use pipeline::registry::{ToolCategory, ToolRegistry};
pub use pipeline::tool::Tool;
pub use pipeline::{PipelineState, ProcessingPipeline, StepSummary};
pub use raster::{PixelLayout, RasterImage};
