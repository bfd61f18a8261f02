// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_octree --heading-base-level=0

//! Understory Octree: a dynamic 3D octree with broad-phase pairing.
//!
//! Understory Octree indexes axis-aligned boxes for real-time scenes.
//!
//! - Insert, move, and erase boxes carrying a small copyable payload.
//! - Cull by segment, box, point, or convex shape (for example a view frustum).
//! - Optionally track overlapping pairs and get notified when they begin and end.
//!
//! The root region starts at `[0, unit_size]³` and doubles outward as boxes arrive, and it
//! collapses again when it becomes under-populated. Small moves that stay inside the
//! element's current octants never touch the tree structure.
//!
//! # Example
//!
//! ```rust
//! use understory_octree::{Aabb3D, Octree, PairMask, Vec3};
//!
//! let mut tree: Octree<u32> = Octree::new();
//! let crate_box = tree
//!     .create_simple(1, Aabb3D::new(Vec3::ZERO, Vec3::ONE))
//!     .unwrap();
//! tree.create_simple(2, Aabb3D::new(Vec3::splat(5.0), Vec3::ONE))
//!     .unwrap();
//!
//! let mut hits = Vec::new();
//! let n = tree.cull_point(Vec3::splat(0.5), &mut hits, 16, PairMask::all());
//! assert_eq!(n, 1);
//! assert_eq!(hits[0].id, crate_box);
//!
//! // Cast a segment through both boxes.
//! hits.clear();
//! tree.cull_segment(Vec3::splat(-1.0), Vec3::splat(7.0), &mut hits, 16, PairMask::all());
//! assert_eq!(hits.len(), 2);
//! ```
//!
//! ## Pairing
//!
//! With [`OctreeConfig::pairing`] set, elements created as pairable are tracked against
//! every element they share an octant with. A [`PairHandler`] receives a begin call when
//! two tracked boxes start to overlap (touching counts) and an end call when they separate
//! or one of them is erased. The value returned from begin is handed back on end.
//!
//! ```rust
//! use understory_octree::{Aabb3D, Octree, OctreeConfig, PairHandler, PairMask, PairSide, Vec3};
//!
//! #[derive(Default)]
//! struct Overlaps(Vec<(u32, u32)>);
//!
//! impl PairHandler<u32> for Overlaps {
//!     type Token = usize;
//!
//!     fn pair_begin(&mut self, a: PairSide<u32>, b: PairSide<u32>) -> usize {
//!         self.0.push((a.payload, b.payload));
//!         self.0.len() - 1
//!     }
//!
//!     fn pair_end(&mut self, _a: PairSide<u32>, _b: PairSide<u32>, token: usize) {
//!         self.0.remove(token);
//!     }
//! }
//!
//! let config = OctreeConfig { pairing: true, ..OctreeConfig::default() };
//! let mut tree = Octree::with_handler(config, Overlaps::default()).unwrap();
//! let all = PairMask::DEFAULT;
//! let a = tree.create(1, Aabb3D::new(Vec3::ZERO, Vec3::ONE), 0, true, all, all).unwrap();
//! let b = tree.create(2, Aabb3D::new(Vec3::splat(0.5), Vec3::ONE), 0, true, all, all).unwrap();
//! assert_eq!(tree.handler().0, [(1, 2)]);
//!
//! tree.move_element(b, Aabb3D::new(Vec3::splat(10.0), Vec3::ONE)).unwrap();
//! assert!(tree.handler().0.is_empty());
//! # let _ = a;
//! ```
//!
//! ## Balance
//!
//! [`Octree::set_balance`] trades depth for fan-out. At `1.0` (the default) every element
//! is filed in the smallest octant that still fits it. Lower values let an octant collect
//! members in a flat list before it subdivides, which keeps the tree shallow when many
//! boxes are clustered.
//!
//! ## `no_std`
//!
//! The crate is `no_std` with `alloc`. Disable default features and enable `libm` to
//! build without the standard library.

#![no_std]

extern crate alloc;

pub mod config;
pub mod cull;
pub mod element;
pub mod error;
pub mod pairing;
pub mod types;

mod octant;
mod octree;
mod pool;

pub use config::{BALANCE_LIMIT_SCALE, OctreeConfig};
pub use cull::CullHit;
pub use element::{ElementId, PairMask};
pub use error::OctreeError;
pub use glam::Vec3;
pub use octree::Octree;
pub use pairing::{PairCallbacks, PairHandler, PairSide};
pub use types::{Aabb3D, CMP_EPSILON, Plane, convex_hull_points};
