// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Understory Octree: create, move, erase, and cull.

use understory_octree::{Aabb3D, Octree, PairMask, Vec3};

fn main() {
    let mut tree: Octree<u32> = Octree::new();
    let a = tree
        .create_simple(1, Aabb3D::new(Vec3::ZERO, Vec3::splat(10.0)))
        .unwrap();
    let _b = tree
        .create_simple(2, Aabb3D::new(Vec3::splat(5.0), Vec3::splat(10.0)))
        .unwrap();
    println!("root: {:?}", tree.root_aabb());

    // Move box 1
    tree.move_element(a, Aabb3D::new(Vec3::new(20.0, 0.0, 0.0), Vec3::splat(10.0)))
        .unwrap();

    // Query a point
    let mut hits = Vec::new();
    tree.cull_point(Vec3::splat(6.0), &mut hits, 16, PairMask::all());
    println!("hits at (6,6,6): {:?}", hits);

    tree.erase(a).unwrap();
    println!("{} elements in {} octants", tree.len(), tree.octant_count());
}
