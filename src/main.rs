mod step_spec;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use argh::FromArgs;
use filterstack_core::{
    FileCodec, ParamSpec, PipelineError, ProcessingPipeline, ToolCategory, ToolRegistry,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use step_spec::StepSpec;

#[derive(FromArgs)]
/// Apply a stack of image processing tools to an image.
struct Args {
    /// input image (png, jpg, bmp, tiff)
    #[argh(positional)]
    input: Option<PathBuf>,

    /// where to write the processed image
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// a step to append, as `Name` or `Name:key=value,...`; repeatable
    #[argh(option, short = 's')]
    step: Vec<String>,

    /// print the available tools and their parameters as JSON
    #[argh(switch)]
    list_tools: bool,
}

#[derive(Serialize)]
struct ToolListing {
    name: &'static str,
    category: ToolCategory,
    label: &'static str,
    parameters: Vec<ParamSpec>,
    options: std::collections::BTreeMap<String, Vec<String>>,
}

fn list_tools(registry: &ToolRegistry) -> Result<String> {
    let mut listing = Vec::new();
    for name in registry.list_available() {
        let tool = registry.create(name)?;
        let category = registry.category_of(name)?;
        listing.push(ToolListing {
            name,
            category,
            label: category.label(),
            parameters: tool.parameter_specs(),
            options: tool.get_valid_options(),
        });
    }
    serde_json::to_string_pretty(&listing).context("failed to serialize tool listing")
}

/// Create, configure and append every step. A tool receives its requested
/// values before it joins the stack, so overridden defaults never run.
fn build(
    pipeline: &mut ProcessingPipeline,
    registry: &ToolRegistry,
    steps: &[StepSpec],
) -> Result<()> {
    for step in steps {
        let index = pipeline.len();
        let mut tool = registry
            .create(&step.name)
            .with_context(|| format!("failed to add step `{}`", step.name))?;
        let values = step
            .resolve(tool.as_ref())
            .with_context(|| format!("invalid parameters for step {index} ({})", step.name))?;
        tool.update_parameters(&values)
            .map_err(|source| PipelineError::InvalidParameters {
                index,
                tool: step.name.clone(),
                source,
            })?;
        pipeline
            .add_step(tool)
            .with_context(|| format!("failed to add step `{}`", step.name))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Args = argh::from_env();
    let registry = ToolRegistry::with_builtins();

    if args.list_tools {
        println!("{}", list_tools(&registry)?);
        return Ok(());
    }

    let Some(input) = args.input else {
        bail!("no input image given (see --help)");
    };
    let Some(output) = args.output else {
        bail!("no output path given, pass -o <path>");
    };
    let steps = args
        .step
        .iter()
        .map(|s| StepSpec::parse(s))
        .collect::<Result<Vec<_>>>()?;

    let codec = FileCodec;
    let mut pipeline = ProcessingPipeline::new();
    pipeline
        .load_path(&codec, &input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    build(&mut pipeline, &registry, &steps)?;
    pipeline
        .save_processed(&codec, &output)
        .with_context(|| format!("failed to save {}", output.display()))?;

    info!(
        steps = pipeline.len(),
        output = %output.display(),
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filterstack_core::{
        ImageCodec, ParamValue, PixelLayout, ProcessingError, RasterImage, ValidationError,
    };

    fn specs(items: &[&str]) -> Vec<StepSpec> {
        items.iter().map(|s| StepSpec::parse(s).unwrap()).collect()
    }

    #[test]
    fn listing_covers_every_tool() {
        let registry = ToolRegistry::with_builtins();
        let json: serde_json::Value = serde_json::from_str(&list_tools(&registry).unwrap()).unwrap();
        let tools = json.as_array().unwrap();
        assert_eq!(tools.len(), registry.len());

        let canny = tools
            .iter()
            .find(|t| t["name"] == "CannyEdgeDetection")
            .unwrap();
        assert_eq!(canny["label"], "Edge Detection");
        let aperture = canny["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "aperture_size")
            .unwrap();
        assert_eq!(aperture["kind"]["type"], "int");
        assert_eq!(aperture["kind"]["odd"], true);

        let flip = tools.iter().find(|t| t["name"] == "FlippingMirroring").unwrap();
        assert_eq!(
            flip["options"]["direction"],
            serde_json::json!(["horizontal", "vertical", "both"])
        );
    }

    #[test]
    fn build_configures_steps() {
        let registry = ToolRegistry::with_builtins();
        let mut pipeline = ProcessingPipeline::new();
        pipeline.load(RasterImage::filled(8, 8, PixelLayout::Rgb, 100));
        build(
            &mut pipeline,
            &registry,
            &specs(&["BrightnessAdjustment:brightness=20", "InvertColors"]),
        )
        .unwrap();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(
            pipeline.step(0).unwrap().get_parameters()["brightness"],
            ParamValue::Float(20.0)
        );
        assert!(pipeline.get_processed().unwrap().data().iter().all(|&v| v == 135));
    }

    #[test]
    fn build_reports_the_failing_step() {
        let registry = ToolRegistry::with_builtins();
        let mut pipeline = ProcessingPipeline::new();
        pipeline.load(RasterImage::filled(3, 3, PixelLayout::Rgb, 100));
        let err = build(
            &mut pipeline,
            &registry,
            &specs(&["InvertColors", "GaussianBlur:kernel_size=11"]),
        )
        .unwrap_err();
        let cause = err.downcast_ref::<PipelineError>().unwrap();
        assert_eq!(cause.offending_step(), Some((1, "GaussianBlur")));
        match cause {
            PipelineError::StepFailed { source, .. } => assert!(
                matches!(source, ProcessingError::KernelTooLarge { kernel: 11, .. }),
                "{source}"
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn requested_parameters_apply_before_the_first_run() {
        // The default 5x5 kernel would not fit a 4x4 image.
        let registry = ToolRegistry::with_builtins();
        let mut pipeline = ProcessingPipeline::new();
        pipeline.load(RasterImage::filled(4, 4, PixelLayout::Rgb, 100));
        build(&mut pipeline, &registry, &specs(&["GaussianBlur:kernel_size=3"])).unwrap();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(
            pipeline.step(0).unwrap().get_parameters()["kernel_size"],
            ParamValue::Int(3)
        );
        assert!(pipeline.get_processed().unwrap().data().iter().all(|&v| v == 100));
    }

    #[test]
    fn build_reports_rejected_parameter_combinations() {
        let registry = ToolRegistry::with_builtins();
        let mut pipeline = ProcessingPipeline::new();
        pipeline.load(RasterImage::filled(8, 8, PixelLayout::Rgb, 100));
        let err = build(
            &mut pipeline,
            &registry,
            &specs(&["InvertColors", "SobelFilter:dx=0,dy=0"]),
        )
        .unwrap_err();
        let cause = err.downcast_ref::<PipelineError>().unwrap();
        assert_eq!(cause.offending_step(), Some((1, "SobelFilter")));
        assert!(matches!(
            cause,
            PipelineError::InvalidParameters {
                source: ValidationError::Constraint(_),
                ..
            }
        ));
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn build_rejects_unknown_tools() {
        let registry = ToolRegistry::with_builtins();
        let mut pipeline = ProcessingPipeline::new();
        pipeline.load(RasterImage::filled(3, 3, PixelLayout::Rgb, 100));
        let err = build(&mut pipeline, &registry, &specs(&["Sharpen"])).unwrap_err();
        assert!(format!("{err:#}").contains("unknown tool: Sharpen"));
        assert!(pipeline.is_empty());
    }

    #[test]
    fn end_to_end_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        FileCodec
            .encode(&RasterImage::filled(10, 10, PixelLayout::Rgb, 200), &input)
            .unwrap();

        let registry = ToolRegistry::with_builtins();
        let mut pipeline = ProcessingPipeline::new();
        pipeline.load_path(&FileCodec, &input).unwrap();
        build(&mut pipeline, &registry, &specs(&["GrayscaleConversion", "SimpleThreshold"]))
            .unwrap();
        pipeline.save_processed(&FileCodec, &output).unwrap();

        let saved = FileCodec.decode(&output).unwrap();
        assert!(saved.data().iter().all(|&v| v == 255));
    }
}
