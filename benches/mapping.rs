use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use voxmap::{Map, MapConfig, OccupancyMap, Point, PointCloud};

fn bench_config() -> MapConfig {
    MapConfig {
        max_range: 10.0,
        map_directory_path: std::env::temp_dir(),
        ..MapConfig::default()
    }
}

/// Synthetic scan: points on a sphere shell around the sensor
fn synthetic_cloud(rng: &mut StdRng, size: usize, radius: f64) -> PointCloud {
    (0..size)
        .map(|_| {
            let dir = Vector3::new(
                rng.random::<f64>() - 0.5,
                rng.random::<f64>() - 0.5,
                rng.random::<f64>() - 0.5,
            )
            .normalize();
            let range = radius * (0.8 + 0.2 * rng.random::<f64>());
            let p = dir * range;
            Point::new(p.x, p.y, p.z)
        })
        .collect()
}

fn bench_insert_point_cloud(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_point_cloud");
    let mut rng = StdRng::seed_from_u64(42);

    for size in [100usize, 1000, 10000] {
        let cloud = synthetic_cloud(&mut rng, size, 5.0);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &cloud, |b, cloud| {
            let mut map: OccupancyMap = Map::new(0.05).unwrap();
            map.set_config(&bench_config()).unwrap();
            b.iter(|| {
                map.insert_point_cloud(black_box(cloud), Vector3::zeros())
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_static_env_insert(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(43);
    let cloud = synthetic_cloud(&mut rng, 10000, 5.0);

    let mut config = bench_config();
    config.static_env = true;

    c.bench_function("insert_point_cloud_static_env_10000", |b| {
        let mut map: OccupancyMap = Map::new(0.05).unwrap();
        map.set_config(&config).unwrap();
        b.iter(|| {
            map.insert_point_cloud(black_box(&cloud), Vector3::zeros())
                .unwrap()
        });
    });
}

fn bench_raytrace(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(44);
    let cloud = synthetic_cloud(&mut rng, 5000, 3.0);

    let mut map: OccupancyMap = Map::new(0.05).unwrap();
    map.set_config(&bench_config()).unwrap();
    // A few observations so the shell becomes active
    for _ in 0..3 {
        map.insert_point_cloud(&cloud, Vector3::zeros()).unwrap();
    }

    let directions: Vec<Vector3<f64>> = (0..64)
        .map(|_| {
            Vector3::new(
                rng.random::<f64>() - 0.5,
                rng.random::<f64>() - 0.5,
                rng.random::<f64>() - 0.5,
            )
            .normalize()
        })
        .collect();

    c.bench_function("raytrace_64_rays", |b| {
        b.iter(|| {
            for dir in &directions {
                black_box(map.raytrace(Vector3::zeros(), black_box(*dir), 10.0));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_insert_point_cloud,
    bench_static_env_insert,
    bench_raytrace
);
criterion_main!(benches);
