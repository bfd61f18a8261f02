// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Octree basics.
//!
//! Fill a tree with a small city of boxes, move one, and run each kind of cull.
//!
//! Run:
//! - `cargo run -p understory_demos --example octree_basics`

use understory_octree::{Aabb3D, Octree, PairMask, Plane, Vec3};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut tree: Octree<&'static str> = Octree::new();
    let names = ["bakery", "library", "station", "tower", "park"];
    let mut ids = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let x = i as f32 * 12.0;
        let height = 4.0 + 6.0 * (i % 3) as f32;
        let bx = Aabb3D::new(Vec3::new(x, 0.0, 0.0), Vec3::new(8.0, height, 8.0));
        match tree.create_simple(*name, bx) {
            Ok(id) => ids.push(id),
            Err(e) => eprintln!("skipping {name}: {e}"),
        }
    }
    println!("{} elements, root {:?}", tree.len(), tree.root_aabb());

    // Move the tower across town.
    if let Some(&tower) = ids.get(3) {
        let far = Aabb3D::new(Vec3::new(200.0, 0.0, 40.0), Vec3::new(8.0, 30.0, 8.0));
        if let Err(e) = tree.move_element(tower, far) {
            eprintln!("move failed: {e}");
        }
        println!("after move, root {:?}", tree.root_aabb());
    }

    let mut hits = Vec::new();
    tree.cull_point(Vec3::new(13.0, 1.0, 1.0), &mut hits, 8, PairMask::all());
    println!("at the library door: {:?}", payloads(&hits));

    hits.clear();
    tree.cull_segment(
        Vec3::new(-5.0, 2.0, 4.0),
        Vec3::new(60.0, 2.0, 4.0),
        &mut hits,
        usize::MAX,
        PairMask::all(),
    );
    println!("along main street: {:?}", payloads(&hits));

    hits.clear();
    let district = Aabb3D::from_min_max(Vec3::new(20.0, 0.0, 0.0), Vec3::new(40.0, 5.0, 10.0));
    tree.cull_aabb(&district, &mut hits, usize::MAX, PairMask::all());
    println!("in the district: {:?}", payloads(&hits));

    // A view box looking down from above, described by outward planes.
    hits.clear();
    let planes = [
        Plane::from_point_normal(Vec3::new(30.0, 0.0, 0.0), Vec3::X),
        Plane::from_point_normal(Vec3::new(-1.0, 0.0, 0.0), Vec3::NEG_X),
        Plane::from_point_normal(Vec3::new(0.0, 12.0, 0.0), Vec3::Y),
        Plane::from_point_normal(Vec3::new(0.0, 9.0, 0.0), Vec3::NEG_Y),
        Plane::from_point_normal(Vec3::new(0.0, 0.0, 10.0), Vec3::Z),
        Plane::from_point_normal(Vec3::new(0.0, 0.0, -1.0), Vec3::NEG_Z),
    ];
    tree.cull_convex(&planes, &mut hits, usize::MAX, PairMask::all());
    println!("visible above nine units: {:?}", payloads(&hits));
}

fn payloads(hits: &[understory_octree::CullHit<&'static str>]) -> Vec<&'static str> {
    hits.iter().map(|h| h.payload).collect()
}
