use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use levelcrate_core::phantom::{shell_phantom, sphere_distance};
use levelcrate_core::{BalloonScheme, DistanceMethod, GridGeometry, LevelSetConfig, Point3, Seed, Volume};
use levelcrate_distance::{distance_map, medial_axis};
use levelcrate_evolution::{segment, EvolutionInputs, LevelSet};

fn cube(size: usize) -> GridGeometry {
    GridGeometry::isotropic([size, size, size]).unwrap()
}

fn centre(size: usize) -> Point3<f32> {
    let c = size as f32 / 2.0;
    Point3::new(c, c, c)
}

fn shell_image(size: usize) -> Volume<f32> {
    let radius = size as f32 / 4.0;
    shell_phantom(&cube(size), centre(size), radius, 2.0, [100.0, 250.0, 0.0])
}

fn balloon_config(size: usize, threads: usize) -> LevelSetConfig {
    let c = size as f32 / 2.0;
    LevelSetConfig::new()
        .with_seed(Seed::new(c, c, c, 3.0))
        .with_balloon(BalloonScheme::BrockettMaragos, 1.0)
        .with_thresholds(Some(50.0), Some(200.0))
        .with_converged_threshold(0.0)
        .with_iterations(10)
        .with_threads(threads)
}

fn bench_distance_maps(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_maps");

    for size in [32, 64].iter() {
        let grid = cube(*size);
        let exact = sphere_distance(&grid, centre(*size), *size as f32 / 4.0);
        let skeleton = medial_axis(&grid, exact.as_slice(), 1.0).unwrap();

        for method in [
            DistanceMethod::Curves,
            DistanceMethod::FastMarching,
            DistanceMethod::Chamfer,
            DistanceMethod::Shape,
        ] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", method), size),
                &exact,
                |b, exact| {
                    b.iter(|| {
                        let mut field = exact.as_slice().to_vec();
                        black_box(
                            distance_map(method, &grid, &mut field, Some(skeleton.as_slice()), 2.0).unwrap(),
                        );
                        field
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_iterations(c: &mut Criterion) {
    let mut group = c.benchmark_group("evolution_step");
    group.sample_size(20);

    let size = 64;
    let image = shell_image(size);
    let threads = [1, num_cpus::get().max(2)];

    for &count in threads.iter() {
        let config = balloon_config(size, count);
        group.bench_with_input(BenchmarkId::new("threads", count), &config, |b, config| {
            b.iter(|| {
                let mut evolution = LevelSet::init_param(config, EvolutionInputs::new(&image))
                    .and_then(LevelSet::init_evolution)
                    .unwrap();
                for _ in 0..5 {
                    black_box(evolution.iterate().unwrap());
                }
            })
        });
    }

    group.finish();
}

fn bench_full_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");
    group.sample_size(10);

    for size in [32, 48].iter() {
        let image = shell_image(*size);
        let config = balloon_config(*size, 0);
        group.bench_with_input(BenchmarkId::new("balloon", size), &image, |b, image| {
            b.iter(|| black_box(segment(&config, EvolutionInputs::new(image)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_distance_maps, bench_iterations, bench_full_runs);
criterion_main!(benches);
