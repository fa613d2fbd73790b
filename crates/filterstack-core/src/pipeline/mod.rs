pub mod registry;
pub mod tool;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::ImageCodec;
use crate::error::PipelineError;
use crate::params::ParamMap;
use crate::raster::RasterImage;
use registry::ToolRegistry;
use tool::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    /// No image loaded.
    Empty,
    /// Image loaded, no steps.
    Loaded,
    /// Image loaded with at least one step.
    Edited,
}

/// Listing entry for one step of the stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub index: usize,
    pub name: String,
    pub parameters: ParamMap,
}

/// Ordered stack of tools applied to an immutable original.
///
/// ```text
/// original -> step 0 -> step 1 -> ... -> processed
/// ```
///
/// Every mutation recomputes the whole chain from the original on a
/// candidate step list and only commits when all steps succeed, so
/// `processed` always equals the fold of `steps` over `original`.
#[derive(Debug, Default)]
pub struct ProcessingPipeline {
    original: Option<Arc<RasterImage>>,
    steps: Vec<Box<dyn Tool>>,
    processed: Option<Arc<RasterImage>>,
}

impl ProcessingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PipelineState {
        match (&self.original, self.steps.is_empty()) {
            (None, _) => PipelineState::Empty,
            (Some(_), true) => PipelineState::Loaded,
            (Some(_), false) => PipelineState::Edited,
        }
    }

    /// Replace the original and drop every step.
    pub fn load(&mut self, image: RasterImage) {
        info!(
            width = image.width(),
            height = image.height(),
            layout = ?image.layout(),
            dropped_steps = self.steps.len(),
            "image loaded"
        );
        let image = Arc::new(image);
        self.steps.clear();
        self.processed = Some(Arc::clone(&image));
        self.original = Some(image);
    }

    pub fn load_path(&mut self, codec: &dyn ImageCodec, path: &Path) -> Result<(), PipelineError> {
        let image = codec.decode(path)?;
        self.load(image);
        Ok(())
    }

    pub fn add_step(&mut self, tool: Box<dyn Tool>) -> Result<(), PipelineError> {
        let original = self.require_original()?;
        let processed = recompute(
            original,
            self.steps.iter().map(|s| s.as_ref()).chain([tool.as_ref()]),
        )?;
        self.steps.push(tool);
        self.commit("add_step", processed);
        Ok(())
    }

    /// Instantiate `name` from the registry with default parameters and
    /// append it.
    pub fn add_named_step(
        &mut self,
        registry: &ToolRegistry,
        name: &str,
    ) -> Result<(), PipelineError> {
        let tool = registry.create(name)?;
        self.add_step(tool)
    }

    pub fn remove_step(&mut self, index: usize) -> Result<(), PipelineError> {
        let original = self.require_original()?;
        self.check_index(index)?;
        let processed = recompute(
            original,
            self.steps
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != index)
                .map(|(_, s)| s.as_ref()),
        )?;
        self.steps.remove(index);
        self.commit("remove_step", processed);
        Ok(())
    }

    /// Move the step at `from` so that it ends up at position `to`.
    pub fn move_step(&mut self, from: usize, to: usize) -> Result<(), PipelineError> {
        let original = self.require_original()?;
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let mut order: Vec<usize> = (0..self.steps.len()).collect();
        let moved = order.remove(from);
        order.insert(to, moved);

        let processed = recompute(original, order.iter().map(|&i| self.steps[i].as_ref()))?;
        let tool = self.steps.remove(from);
        self.steps.insert(to, tool);
        self.commit("move_step", processed);
        Ok(())
    }

    /// Validate `params` against a copy of the step's tool, recompute with
    /// the copy in place, and only then replace the live tool.
    pub fn update_step_parameters(
        &mut self,
        index: usize,
        params: &ParamMap,
    ) -> Result<(), PipelineError> {
        let original = self.require_original()?;
        self.check_index(index)?;

        let mut candidate = self.steps[index].clone();
        if let Err(source) = candidate.update_parameters(params) {
            warn!(
                step = index,
                tool = candidate.name(),
                error = %source,
                "parameter update rejected"
            );
            return Err(PipelineError::InvalidParameters {
                index,
                tool: candidate.name().to_string(),
                source,
            });
        }

        let processed = recompute(
            original,
            self.steps.iter().enumerate().map(|(i, s)| {
                if i == index {
                    candidate.as_ref()
                } else {
                    s.as_ref()
                }
            }),
        )?;
        self.steps[index] = candidate;
        self.commit("update_step_parameters", processed);
        Ok(())
    }

    /// Drop every step and show the original again.
    pub fn clear(&mut self) {
        if self.steps.is_empty() {
            return;
        }
        self.steps.clear();
        self.processed = self.original.clone();
        info!(operation = "clear", "pipeline cleared");
    }

    /// The current result, without recomputation.
    pub fn get_processed(&self) -> Option<Arc<RasterImage>> {
        self.processed.clone()
    }

    pub fn original(&self) -> Option<Arc<RasterImage>> {
        self.original.clone()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&dyn Tool> {
        self.steps.get(index).map(|s| s.as_ref())
    }

    pub fn steps(&self) -> Vec<StepSummary> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, s)| StepSummary {
                index,
                name: s.name().to_string(),
                parameters: s.get_parameters(),
            })
            .collect()
    }

    pub fn save_processed(&self, codec: &dyn ImageCodec, path: &Path) -> Result<(), PipelineError> {
        let processed = self.processed.as_ref().ok_or(PipelineError::NotLoaded)?;
        codec.encode(processed, path)?;
        info!(path = %path.display(), "processed image saved");
        Ok(())
    }

    fn require_original(&self) -> Result<Arc<RasterImage>, PipelineError> {
        self.original.clone().ok_or(PipelineError::NotLoaded)
    }

    fn check_index(&self, index: usize) -> Result<(), PipelineError> {
        if index < self.steps.len() {
            Ok(())
        } else {
            Err(PipelineError::IndexOutOfBounds {
                index,
                len: self.steps.len(),
            })
        }
    }

    fn commit(&mut self, operation: &'static str, processed: Arc<RasterImage>) {
        info!(
            operation,
            steps = self.steps.len(),
            width = processed.width(),
            height = processed.height(),
            "pipeline updated"
        );
        self.processed = Some(processed);
    }
}

/// Fold `steps` over `original`. The first failing step aborts the fold.
fn recompute<'a>(
    original: Arc<RasterImage>,
    steps: impl IntoIterator<Item = &'a dyn Tool>,
) -> Result<Arc<RasterImage>, PipelineError> {
    let mut current: Option<RasterImage> = None;
    for (index, step) in steps.into_iter().enumerate() {
        debug!(step = index, tool = step.name(), "applying");
        let input = current.as_ref().unwrap_or(&*original);
        match step.apply(input) {
            Ok(next) => current = Some(next),
            Err(source) => {
                warn!(
                    step = index,
                    tool = step.name(),
                    error = %source,
                    "step failed, rolling back"
                );
                return Err(PipelineError::StepFailed {
                    index,
                    tool: step.name().to_string(),
                    source,
                });
            }
        }
    }
    Ok(current.map(Arc::new).unwrap_or(original))
}
