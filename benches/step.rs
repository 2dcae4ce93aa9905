//! Benchmarks for the particle step and kernel generation.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use etherial::{
    forces::Interaction, kernel, shape, ControlInputs, CpuEngine, Gesture, PositionFormat, Vec3,
};

fn bench_cpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_step");

    for count in [1024, 4096, 8192] {
        group.bench_with_input(BenchmarkId::new("quiet", count), &count, |b, &count| {
            let mut engine = CpuEngine::new(count);
            let inputs = ControlInputs::default();
            b.iter(|| engine.step(black_box(&inputs)));
        });

        group.bench_with_input(BenchmarkId::new("grabbed", count), &count, |b, &count| {
            let mut engine = CpuEngine::new(count);
            let inputs = ControlInputs {
                interactions: vec![Interaction {
                    position: Vec3::new(10.0, 0.0, 0.0),
                    gesture: Gesture::Fist,
                    pinch: true,
                    tension: 0.5,
                }],
                ..ControlInputs::default()
            };
            b.iter(|| engine.step(black_box(&inputs)));
        });
    }

    group.finish();
}

fn bench_shape_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("shape_targets");

    for kind in [
        shape::Shape::Sphere,
        shape::Shape::Hearts,
        shape::Shape::Galaxy,
        shape::Shape::Tornado,
    ] {
        group.bench_function(format!("{kind:?}").to_lowercase(), |b| {
            b.iter(|| {
                for slot in 0..4096u32 {
                    black_box(shape::procedural_target(&kind, slot));
                }
            })
        });
    }

    group.finish();
}

fn bench_kernel_codegen(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_codegen");

    group.bench_function("f32", |b| {
        b.iter(|| black_box(kernel::generate_kernel(PositionFormat::F32)))
    });
    group.bench_function("f16", |b| {
        b.iter(|| black_box(kernel::generate_kernel(PositionFormat::F16)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_cpu_step,
    bench_shape_targets,
    bench_kernel_codegen,
);
criterion_main!(benches);
