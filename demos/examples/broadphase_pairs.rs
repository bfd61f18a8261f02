// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Broad-phase pairing.
//!
//! Drop a few bodies into a pairing tree and print overlaps as they begin and end.
//!
//! Run:
//! - `cargo run -p understory_demos --example broadphase_pairs`

use std::collections::HashMap;

use understory_octree::{
    Aabb3D, Octree, OctreeConfig, OctreeError, PairHandler, PairMask, PairSide, Vec3,
};

/// Counts contacts per body and hands out a contact number as the pair token.
#[derive(Default)]
struct Contacts {
    next: u32,
    per_body: HashMap<char, u32>,
}

impl PairHandler<char> for Contacts {
    type Token = u32;

    fn pair_begin(&mut self, a: PairSide<char>, b: PairSide<char>) -> u32 {
        self.next += 1;
        *self.per_body.entry(a.payload).or_default() += 1;
        *self.per_body.entry(b.payload).or_default() += 1;
        println!(
            "contact #{} begins: {} touches {}",
            self.next, a.payload, b.payload
        );
        self.next
    }

    fn pair_end(&mut self, a: PairSide<char>, b: PairSide<char>, token: u32) {
        for body in [a.payload, b.payload] {
            if let Some(n) = self.per_body.get_mut(&body) {
                *n -= 1;
            }
        }
        println!("contact #{token} ends: {} leaves {}", a.payload, b.payload);
    }
}

const BODIES: PairMask = PairMask::from_bits_retain(0b01);
const SENSORS: PairMask = PairMask::from_bits_retain(0b10);

fn main() -> Result<(), OctreeError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let config = OctreeConfig {
        pairing: true,
        ..OctreeConfig::default()
    };
    let mut tree = Octree::with_handler(config, Contacts::default())?;
    let cube = |x: f32, y: f32| Aabb3D::new(Vec3::new(x, y, 0.0), Vec3::ONE);

    // Bodies collide with bodies and sensors; sensors only watch bodies.
    let a = tree.create('A', cube(0.0, 0.0), 0, true, BODIES, BODIES | SENSORS)?;
    let b = tree.create('B', cube(3.0, 0.0), 0, true, BODIES, BODIES | SENSORS)?;
    let _gate = tree.create('S', cube(1.5, 0.0), 0, true, SENSORS, BODIES)?;
    let wall = Aabb3D::new(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(1.0, 3.0, 3.0));
    tree.create_simple('W', wall)?;

    println!("-- B slides left");
    for step in 0..4 {
        let x = 3.0 - step as f32 * 0.75;
        tree.move_element(b, cube(x, 0.0))?;
    }

    println!("-- A is pushed into the wall");
    tree.move_element(a, cube(-1.5, 0.0))?;

    println!("-- B is removed");
    tree.erase(b)?;

    println!(
        "{} active contacts, per body {:?}",
        tree.pair_count(),
        tree.handler().per_body
    );
    Ok(())
}
