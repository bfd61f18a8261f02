// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Culling queries: segment, box, convex shape and point.
//!
//! Every query walks the tree from the root, testing members of each visited octant and
//! descending only into children whose region passes the same test. Results are appended
//! to a caller-owned buffer, at most `max` per call.

use alloc::vec::Vec;
use core::mem;

use glam::Vec3;
use tracing::trace;

use crate::element::{ElementId, PairMask};
use crate::octant::CachedMember;
use crate::octree::Octree;
use crate::pairing::PairHandler;
use crate::types::{Aabb3D, Plane, convex_hull_points};

/// One query result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CullHit<P> {
    /// Element id.
    pub id: ElementId,
    /// Payload given at creation.
    pub payload: P,
    /// Sub-index given at creation.
    pub sub_index: u32,
}

impl<P: Copy + PartialEq, H: PairHandler<P>> Octree<P, H> {
    /// Append elements whose box the segment `from..to` touches.
    ///
    /// A zero-length segment matches nothing. Returns the number of hits appended.
    pub fn cull_segment(
        &mut self,
        from: Vec3,
        to: Vec3,
        out: &mut Vec<CullHit<P>>,
        max: usize,
        mask: PairMask,
    ) -> usize {
        if from == to {
            return 0;
        }
        self.cull_with(out, max, mask, |aabb| aabb.intersects_segment(from, to))
    }

    /// Append elements whose box overlaps `aabb`, touching faces included.
    pub fn cull_aabb(
        &mut self,
        aabb: &Aabb3D,
        out: &mut Vec<CullHit<P>>,
        max: usize,
        mask: PairMask,
    ) -> usize {
        self.cull_with(out, max, mask, |b| b.intersects_inclusive(aabb))
    }

    /// Append elements whose box overlaps the convex region bounded by `planes`.
    ///
    /// Plane normals point out of the region. Planes that bound no finite region (fewer
    /// than three, or contradictory ones) match nothing.
    pub fn cull_convex(
        &mut self,
        planes: &[Plane],
        out: &mut Vec<CullHit<P>>,
        max: usize,
        mask: PairMask,
    ) -> usize {
        if planes.is_empty() {
            return 0;
        }
        let points = convex_hull_points(planes);
        if points.is_empty() {
            return 0;
        }
        let inside = |b: &Aabb3D| b.intersects_convex_shape(planes, &points);
        self.cull_with(out, max, mask, inside)
    }

    /// Append elements whose box contains `point`, boundary included.
    pub fn cull_point(
        &mut self,
        point: Vec3,
        out: &mut Vec<CullHit<P>>,
        max: usize,
        mask: PairMask,
    ) -> usize {
        self.cull_with(out, max, mask, |b| b.contains_point(point))
    }

    fn cull_with(
        &mut self,
        out: &mut Vec<CullHit<P>>,
        max: usize,
        mask: PairMask,
        test: impl Fn(&Aabb3D) -> bool,
    ) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        if max == 0 {
            return 0;
        }
        self.pass += 1;
        let pass = self.pass;
        let filter_mask = self.pairing;
        let mut found = 0;
        let mut stack = mem::take(&mut self.scratch);
        stack.clear();
        stack.push(root.get());
        'walk: while let Some(o) = stack.pop() {
            self.refresh_cache(o);
            let mut i = 0;
            while i < self.octants[o].cache.len() {
                let member = self.octants[o].cache[i];
                i += 1;
                let e = &mut self.elements[member.slot];
                if e.last_pass == pass {
                    continue;
                }
                if filter_mask && !member.pairable_type.intersects(mask) {
                    continue;
                }
                e.last_pass = pass;
                if !test(&member.aabb) {
                    continue;
                }
                out.push(CullHit {
                    id: e.id,
                    payload: e.payload,
                    sub_index: e.sub_index,
                });
                found += 1;
                if found >= max {
                    break 'walk;
                }
            }
            let octant = &self.octants[o];
            if octant.children_count == 0 {
                continue;
            }
            for child in octant.children.iter().flatten() {
                if test(&self.octants[child.get()].aabb) {
                    stack.push(child.get());
                }
            }
        }
        self.scratch = stack;
        found
    }

    /// Rebuild an octant's flat member list if membership or a member's box changed.
    fn refresh_cache(&mut self, o: usize) {
        let octant = &mut self.octants[o];
        if !octant.dirty {
            return;
        }
        octant.cache.clear();
        for &slot in octant.elements.iter().chain(&octant.pairable_elements) {
            let e = &self.elements[slot];
            octant.cache.push(CachedMember {
                slot,
                aabb: e.aabb,
                pairable_type: e.pairable_type,
            });
        }
        octant.dirty = false;
        trace!(
            octant = o,
            members = octant.cache.len(),
            "rebuilt member cache"
        );
    }
}
