use bevy::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use rubble_core::fracture::{cell, sampling, FractureConfig, FractureGenerator};
use rubble_core::impact::{ImpactEvent, ImpactType};
use rubble_core::material::FractureProperties;
use rubble_core::mesh::DestructibleMesh;

fn bench_sampling(c: &mut Criterion) {
    c.bench_function("poisson_samples_64", |b| {
        b.iter(|| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(black_box(42));
            sampling::poisson_samples(Vec3::ZERO, Vec3::ONE, 0.1, 64, &mut rng)
        })
    });

    let impact = ImpactEvent::new(Vec3::splat(0.5), Vec3::NEG_Z, 500.0, ImpactType::Point);
    let glass = FractureProperties::glass();
    c.bench_function("stress_guided_samples_40", |b| {
        b.iter(|| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(black_box(42));
            sampling::stress_guided_samples(Vec3::ZERO, Vec3::ONE, 0.08, 40, &impact, &glass, &mut rng)
        })
    });
}

fn bench_voronoi_cells(c: &mut Criterion) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let seeds = sampling::poisson_samples(Vec3::ZERO, Vec3::ONE, 0.12, 40, &mut rng);

    c.bench_function("voronoi_cells_40", |b| {
        b.iter(|| cell::compute_voronoi_cells(black_box(&seeds), Vec3::ZERO, Vec3::ONE))
    });
}

fn bench_full_fracture(c: &mut Criterion) {
    let config = FractureConfig {
        num_fragments: 20,
        poisson_min_distance: 0.08,
        random_seed: 42,
        material: FractureProperties::glass(),
        ..Default::default()
    };

    c.bench_function("fracture_cube_20_fragments", |b| {
        b.iter_batched(
            || {
                let mut world = World::new();
                let entity = world
                    .spawn((Transform::default(), DestructibleMesh::cuboid(Vec3::ONE)))
                    .id();
                (world, entity)
            },
            |(mut world, entity)| {
                let mut generator = FractureGenerator::default();
                generator.fracture_mesh_at_point(
                    &mut world,
                    entity,
                    black_box(Vec3::ZERO),
                    Vec3::NEG_Z,
                    500.0,
                    &config,
                )
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_sampling, bench_voronoi_cells, bench_full_fracture);
criterion_main!(benches);
