// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_octree::{Aabb3D, Octree, PairMask, Vec3};

use rstar::primitives::Rectangle;
use rstar::{AABB, RTree};

fn gen_grid_boxes(n: usize, cell: f32) -> Vec<Aabb3D> {
    let mut out = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let p = Vec3::new(x as f32, y as f32, z as f32) * cell;
                out.push(Aabb3D::new(p, Vec3::splat(cell)));
            }
        }
    }
    out
}

fn to_rstar_boxes(v: &[Aabb3D]) -> Vec<Rectangle<[f32; 3]>> {
    v.iter()
        .map(|r| {
            let (min, max) = (r.min(), r.max());
            Rectangle::from_corners(min.to_array(), max.to_array())
        })
        .collect()
}

fn bench_rtree_external_compare_f32(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_external_compare_f32");
    for &n in &[16usize, 24] {
        let boxes = gen_grid_boxes(n, 10.0);
        let query = Aabb3D::new(Vec3::splat(40.0), Vec3::splat(80.0));
        group.throughput(Throughput::Elements((n * n * n) as u64));

        group.bench_function(format!("octree_build_query_n{}", n), |b| {
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

        group.bench_function(format!("rstar_build_query_bulk_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_boxes(&boxes),
                |rectangles| {
                    let tree = RTree::bulk_load(rectangles);
                    let aabb = AABB::from_corners(query.min().to_array(), query.max().to_array());
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rtree_external_compare_f32);
criterion_main!(benches);
