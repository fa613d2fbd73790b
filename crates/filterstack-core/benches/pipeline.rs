//! Run with: cargo bench -p filterstack-core

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use filterstack_core::{
    ParamMap, ParamValue, PixelLayout, ProcessingPipeline, RasterImage, ToolRegistry,
};

fn test_image(width: u32, height: u32) -> RasterImage {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width) as u8);
            data.push((y * 255 / height) as u8);
            data.push(((x + y) * 127 / (width + height)) as u8);
        }
    }
    RasterImage::new(width, height, PixelLayout::Rgb, data).expect("valid test image")
}

fn bench_tools(c: &mut Criterion) {
    let registry = ToolRegistry::with_builtins();
    let mut group = c.benchmark_group("tools");
    let image = test_image(512, 512);
    group.throughput(Throughput::Elements(image.pixel_count() as u64));

    for name in [
        "BrightnessAdjustment",
        "GaussianBlur",
        "MedianBlur",
        "BilateralFilter",
        "CannyEdgeDetection",
        "Dilation",
        "VibranceAdjustment",
        "AdaptiveThreshold",
    ] {
        let tool = registry.create(name).expect("builtin tool");
        group.bench_with_input(BenchmarkId::new("apply", name), &image, |b, img| {
            b.iter(|| tool.apply(black_box(img)))
        });
    }
    group.finish();
}

fn bench_recompute(c: &mut Criterion) {
    let registry = ToolRegistry::with_builtins();
    let mut group = c.benchmark_group("recompute");

    for size in [256u32, 512, 1024] {
        let mut pipeline = ProcessingPipeline::new();
        pipeline.load(test_image(size, size));
        for name in ["BrightnessAdjustment", "GaussianBlur", "SaturationAdjustment"] {
            pipeline.add_named_step(&registry, name).expect("step applies");
        }

        group.throughput(Throughput::Elements(u64::from(size * size)));
        group.bench_function(BenchmarkId::new("update_step", format!("{size}x{size}")), |b| {
            let mut toggle = false;
            b.iter(|| {
                toggle = !toggle;
                let value = if toggle { 10.0 } else { -10.0 };
                let update: ParamMap =
                    [("brightness".to_string(), ParamValue::Float(value))].into();
                pipeline
                    .update_step_parameters(0, black_box(&update))
                    .expect("update applies");
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tools, bench_recompute);
criterion_main!(benches);
