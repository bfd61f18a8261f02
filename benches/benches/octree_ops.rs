// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_octree::{
    Aabb3D, Octree, OctreeConfig, PairCallbacks, PairMask, PairSide, Plane, Vec3,
};

fn gen_grid_boxes(n: usize, cell: f32) -> Vec<Aabb3D> {
    let mut out = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let p = Vec3::new(x as f32, y as f32, z as f32) * cell;
                out.push(Aabb3D::new(p, Vec3::splat(cell * 0.8)));
            }
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f32(&mut self) -> f32 {
        let v = self.next_u64() >> 40;
        (v as f32) / ((1u64 << 24) as f32)
    }
    fn next_vec3(&mut self, extent: f32) -> Vec3 {
        Vec3::new(self.next_f32(), self.next_f32(), self.next_f32()) * extent
    }
}

fn gen_clustered_boxes(n_clusters: usize, per_cluster: usize, spread: f32) -> Vec<Aabb3D> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let centers: Vec<Vec3> = (0..n_clusters).map(|_| rng.next_vec3(1000.0)).collect();
    for c in centers {
        for _ in 0..per_cluster {
            let d = rng.next_vec3(spread) - Vec3::splat(spread * 0.5);
            out.push(Aabb3D::new(c + d, Vec3::splat(2.0)));
        }
    }
    out
}

/// Outward planes of an axis-aligned frustum-like box with slanted sides.
fn view_planes(center: Vec3, half: f32) -> Vec<Plane> {
    let up = Vec3::new(0.0, 1.0, 0.25).normalize();
    let down = Vec3::new(0.0, -1.0, 0.25).normalize();
    vec![
        Plane::from_point_normal(center + Vec3::X * half, Vec3::X),
        Plane::from_point_normal(center - Vec3::X * half, Vec3::NEG_X),
        Plane::from_point_normal(center + Vec3::Y * half, up),
        Plane::from_point_normal(center - Vec3::Y * half, down),
        Plane::from_point_normal(center + Vec3::Z * half, Vec3::Z),
        Plane::from_point_normal(center - Vec3::Z * half, Vec3::NEG_Z),
    ]
}

fn bench_build_and_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_build_query");
    for &n in &[8usize, 16, 24] {
        let boxes = gen_grid_boxes(n, 10.0);
        let query = Aabb3D::new(Vec3::splat(20.0), Vec3::splat(40.0));
        group.throughput(Throughput::Elements((n * n * n) as u64));
        group.bench_function(format!("create_cull_aabb_n{}", n), |b| {
            b.iter_batched(
                Octree::<u32>::new,
                |mut tree| {
                    for (i, r) in boxes.iter().copied().enumerate() {
                        let _ = tree.create_simple(i as u32, r);
                    }
                    let mut hits = Vec::new();
                    let found = tree.cull_aabb(&query, &mut hits, usize::MAX, PairMask::all());
                    black_box(found);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_queries");
    let boxes = gen_clustered_boxes(32, 256, 120.0);
    let mut tree: Octree<u32> = Octree::new();
    for (i, r) in boxes.iter().copied().enumerate() {
        let _ = tree.create_simple(i as u32, r);
    }
    let mut hits = Vec::with_capacity(4096);

    group.bench_function("cull_segment", |b| {
        b.iter(|| {
            hits.clear();
            let found = tree.cull_segment(
                Vec3::ZERO,
                Vec3::splat(1000.0),
                &mut hits,
                usize::MAX,
                PairMask::all(),
            );
            black_box(found);
        })
    });
    let planes = view_planes(Vec3::splat(500.0), 200.0);
    group.bench_function("cull_convex", |b| {
        b.iter(|| {
            hits.clear();
            let found = tree.cull_convex(&planes, &mut hits, usize::MAX, PairMask::all());
            black_box(found);
        })
    });
    group.bench_function("cull_point", |b| {
        b.iter(|| {
            hits.clear();
            let found = tree.cull_point(Vec3::splat(500.0), &mut hits, 64, PairMask::all());
            black_box(found);
        })
    });
    group.finish();
}

fn bench_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_balance");
    let boxes = gen_clustered_boxes(8, 1024, 40.0);
    let query = Aabb3D::new(Vec3::splat(400.0), Vec3::splat(200.0));
    group.throughput(Throughput::Elements(boxes.len() as u64));
    for &balance in &[1.0_f32, 0.9, 0.7] {
        group.bench_function(format!("create_cull_balance_{balance}"), |b| {
            b.iter_batched(
                || {
                    let mut tree: Octree<u32> = Octree::new();
                    tree.set_balance(balance);
                    tree
                },
                |mut tree| {
                    for (i, r) in boxes.iter().copied().enumerate() {
                        let _ = tree.create_simple(i as u32, r);
                    }
                    let mut hits = Vec::new();
                    let found = tree.cull_aabb(&query, &mut hits, usize::MAX, PairMask::all());
                    black_box(found);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_pairing_moves(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_pairing_moves");
    let boxes = gen_clustered_boxes(16, 128, 60.0);
    let config = OctreeConfig {
        pairing: true,
        ..OctreeConfig::default()
    };
    let callbacks = PairCallbacks::new(
        |_a: PairSide<u32>, _b: PairSide<u32>| (),
        |_a: PairSide<u32>, _b: PairSide<u32>, _t: ()| {},
    );
    let mut tree = match Octree::with_handler(config, callbacks) {
        Ok(tree) => tree,
        Err(e) => panic!("default unit size is valid: {e}"),
    };
    let all = PairMask::DEFAULT;
    let ids: Vec<_> = boxes
        .iter()
        .enumerate()
        .filter_map(|(i, r)| tree.create(i as u32, *r, 0, true, all, all).ok())
        .collect();
    let mut rng = Rng::new(0xFACE_FEED_CAFE_BABE);
    group.throughput(Throughput::Elements(ids.len() as u64));

    group.bench_function("jitter_all", |b| {
        b.iter(|| {
            for (id, r) in ids.iter().zip(&boxes) {
                let d = rng.next_vec3(0.5) - Vec3::splat(0.25);
                let _ = tree.move_element(*id, Aabb3D::new(r.position + d, r.size));
            }
            black_box(tree.pair_count());
        })
    });
    group.bench_function("teleport_some", |b| {
        b.iter(|| {
            for id in ids.iter().step_by(16) {
                let p = rng.next_vec3(1000.0);
                let _ = tree.move_element(*id, Aabb3D::new(p, Vec3::splat(2.0)));
            }
            black_box(tree.pair_count());
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_build_and_query,
    bench_queries,
    bench_balance,
    bench_pairing_moves
);
criterion_main!(benches);
