use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fingerprint_registration::config::{Config, OverlapConfig};
use fingerprint_registration::*;
use image::{DynamicImage, GrayImage, Luma};

/// Ridge-like stripes inside an elliptical print on a white background
fn synthetic_print(width: u32, height: u32, period: u32) -> GrayImage {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (rx, ry) = (width as f64 * 0.4, height as f64 * 0.45);
    GrayImage::from_fn(width, height, |x, y| {
        let nx = (x as f64 - cx) / rx;
        let ny = (y as f64 - cy) / ry;
        let inside = nx * nx + ny * ny <= 1.0;
        if inside && (x + y) % period < period / 2 {
            Luma([30])
        } else {
            Luma([235])
        }
    })
}

fn bench_overlap(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlap");
    let raster = NativeRaster::new();
    for size in [256u32, 512] {
        let image = synthetic_print(size, size, 8);
        for kernel in [0u8, 1, 3] {
            let engine = OverlapEngine::new(OverlapConfig {
                kernel: StructuringElement::new(KernelShape::Rect, kernel),
            });
            group.bench_with_input(
                BenchmarkId::new(format!("{size}px"), kernel),
                &image,
                |b, image| b.iter(|| black_box(engine.compute(&raster, image, image).unwrap())),
            );
        }
    }
    group.finish();
}

fn bench_full_registration(c: &mut Criterion) {
    let moving = DynamicImage::ImageLuma8(synthetic_print(400, 500, 8));
    let fixed = DynamicImage::ImageLuma8(synthetic_print(420, 520, 8));
    let points = ControlPoints::from_coordinates(&[120, 150, 140, 160, 280, 350, 290, 370]).unwrap();
    let config = Config::default();

    c.bench_function("register_400x500", |b| {
        b.iter(|| {
            let input = RegistrationInput::new(moving.clone(), fixed.clone(), points);
            let mut registrator = Registrator::new(input, &config);
            black_box(registrator.perform_registration().map(|m| m.region_of_interest.rect).ok());
        })
    });
}

criterion_group!(benches, bench_overlap, bench_full_registration);
criterion_main!(benches);
