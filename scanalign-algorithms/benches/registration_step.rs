//! Benchmarks for the pieces of a registration step
//!
//! Index construction, subsampling and a full point-to-plane step on a
//! synthetic wavy surface of increasing size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scanalign_algorithms::{
    subsample, ClosestPointIndex, RegistrationConfig, RegistrationMode, RegistrationSession,
};
use scanalign_core::{Point3f, RigidTransform, Vector3f};

/// Generate a height field `z = 0.3 sin(x) cos(y)` on an `n x n` grid with its normals
fn generate_surface(n: usize) -> (Vec<Point3f>, Vec<Vector3f>) {
    let step = 0.1;
    let mut points = Vec::with_capacity(n * n);
    let mut normals = Vec::with_capacity(n * n);

    for i in 0..n * n {
        let x = (i % n) as f32 * step;
        let y = (i / n) as f32 * step;
        points.push(Point3f::new(x, y, 0.3 * x.sin() * y.cos()));
        // gradient of the height field
        let dx = 0.3 * x.cos() * y.cos();
        let dy = -0.3 * x.sin() * y.sin();
        normals.push(Vector3f::new(-dx, -dy, 1.0).normalize());
    }

    (points, normals)
}

fn benchmark_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("closest_point_index");

    for n in [50, 100, 200] {
        let (points, _) = generate_surface(n);
        group.throughput(Throughput::Elements(points.len() as u64));
        group.bench_with_input(BenchmarkId::new("build", points.len()), &points, |b, points| {
            b.iter(|| ClosestPointIndex::build(black_box(points)))
        });

        let index = ClosestPointIndex::build(&points);
        let query = Point3f::new(1.23, 2.34, 0.1);
        group.bench_with_input(BenchmarkId::new("closest_point", points.len()), &index, |b, index| {
            b.iter(|| index.closest_point(black_box(&query)))
        });
    }

    group.finish();
}

fn benchmark_subsample(c: &mut Criterion) {
    let mut group = c.benchmark_group("subsample");

    for n in [50, 100, 200] {
        let (points, _) = generate_surface(n);
        group.throughput(Throughput::Elements(points.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(points.len()), &points, |b, points| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| subsample(black_box(points), 0.8, &mut rng))
        });
    }

    group.finish();
}

fn benchmark_registration_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration_step");
    let offset = RigidTransform::from_axis_angle_translation(
        2.0,
        &Vector3f::new(0.2, 0.3, 1.0),
        Vector3f::new(0.05, -0.02, 0.03),
    );

    for n in [50, 100, 200] {
        let (points, normals) = generate_surface(n);
        let moved = offset.transform_points(&points);

        group.throughput(Throughput::Elements(points.len() as u64));
        group.bench_function(BenchmarkId::from_parameter(points.len()), |b| {
            let mut session = RegistrationSession::new(RegistrationConfig {
                seed: Some(0),
                ..Default::default()
            });
            let reference = session.load_scan(points.clone(), normals.clone()).unwrap();
            let scan = session.load_scan(moved.clone(), normals.clone()).unwrap();

            b.iter(|| {
                session.set_pose(scan, RigidTransform::identity()).unwrap();
                black_box(session.perform_registration_step(scan, reference, RegistrationMode::PointToPlane))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_index_build,
    benchmark_subsample,
    benchmark_registration_step
);
criterion_main!(benches);
