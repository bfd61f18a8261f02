// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Randomized checks of queries and pairing against brute force.

use std::collections::BTreeSet;

use proptest::prelude::*;
use understory_octree::{
    Aabb3D, CullHit, ElementId, Octree, OctreeConfig, PairHandler, PairMask, PairSide, Plane,
    Vec3,
};

/// Boxes on a half-unit grid so touching faces are exact. About one in ten has no extent.
fn arb_aabb() -> impl Strategy<Value = Aabb3D> {
    (
        prop::array::uniform3(-40_i16..40),
        prop::array::uniform3(0_i16..12),
        prop::bool::weighted(0.1),
    )
        .prop_map(|(pos, size, point)| {
            let half = |v: i16| f32::from(v) * 0.5;
            let position = Vec3::new(half(pos[0]), half(pos[1]), half(pos[2]));
            let size = if point {
                Vec3::ZERO
            } else {
                Vec3::new(half(size[0]), half(size[1]), half(size[2]))
            };
            Aabb3D::new(position, size)
        })
}

/// A point on the same half-unit grid as the boxes.
fn arb_point() -> impl Strategy<Value = Vec3> {
    prop::array::uniform3(-44_i16..44).prop_map(half_units)
}

/// A query box with extent on every axis.
fn arb_solid_aabb() -> impl Strategy<Value = Aabb3D> {
    (
        prop::array::uniform3(-40_i16..40),
        prop::array::uniform3(1_i16..24),
    )
        .prop_map(|(pos, size)| Aabb3D::new(half_units(pos), half_units(size)))
}

fn half_units(v: [i16; 3]) -> Vec3 {
    Vec3::new(f32::from(v[0]), f32::from(v[1]), f32::from(v[2])) * 0.5
}

/// Outward planes of an axis-aligned box.
fn box_planes(aabb: &Aabb3D) -> [Plane; 6] {
    let (min, max) = (aabb.min(), aabb.max());
    [
        Plane::from_point_normal(max, Vec3::X),
        Plane::from_point_normal(max, Vec3::Y),
        Plane::from_point_normal(max, Vec3::Z),
        Plane::from_point_normal(min, Vec3::NEG_X),
        Plane::from_point_normal(min, Vec3::NEG_Y),
        Plane::from_point_normal(min, Vec3::NEG_Z),
    ]
}

fn filled_tree(boxes: &[Aabb3D], balance: f32) -> (Octree<u32>, Vec<ElementId>) {
    let mut tree: Octree<u32> = Octree::new();
    tree.set_balance(balance);
    let mut ids = Vec::new();
    for (i, aabb) in boxes.iter().enumerate() {
        let payload = u32::try_from(i).unwrap();
        ids.push(tree.create_simple(payload, *aabb).unwrap());
    }
    (tree, ids)
}

fn expected_ids(
    boxes: &[Aabb3D],
    ids: &[ElementId],
    hit: impl Fn(&Aabb3D) -> bool,
) -> Vec<ElementId> {
    let mut expected: Vec<ElementId> = boxes
        .iter()
        .zip(ids)
        .filter(|(b, _)| !b.has_no_surface() && hit(b))
        .map(|(_, id)| *id)
        .collect();
    expected.sort_unstable();
    expected
}

fn arb_bits() -> impl Strategy<Value = PairMask> {
    (1_u32..4).prop_map(PairMask::from_bits_retain)
}

#[derive(Clone, Debug)]
enum Op {
    Create {
        aabb: Aabb3D,
        pairable: bool,
        ty: PairMask,
        mask: PairMask,
    },
    Move {
        pick: usize,
        aabb: Aabb3D,
    },
    Erase {
        pick: usize,
    },
    SetPairable {
        pick: usize,
        pairable: bool,
    },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (arb_aabb(), any::<bool>(), arb_bits(), arb_bits())
            .prop_map(|(aabb, pairable, ty, mask)| Op::Create { aabb, pairable, ty, mask }),
        4 => (any::<usize>(), arb_aabb()).prop_map(|(pick, aabb)| Op::Move { pick, aabb }),
        1 => any::<usize>().prop_map(|pick| Op::Erase { pick }),
        1 => (any::<usize>(), any::<bool>())
            .prop_map(|(pick, pairable)| Op::SetPairable { pick, pairable }),
    ]
}

#[derive(Clone, Debug)]
struct Model {
    id: ElementId,
    payload: u32,
    aabb: Aabb3D,
    pairable: bool,
    ty: PairMask,
    mask: PairMask,
}

/// Records the set of begun pairs and any protocol violation.
#[derive(Default, Debug)]
struct ActivePairs {
    active: BTreeSet<(u32, u32)>,
    violations: Vec<String>,
}

impl PairHandler<u32> for ActivePairs {
    type Token = (u32, u32);

    fn pair_begin(&mut self, a: PairSide<u32>, b: PairSide<u32>) -> (u32, u32) {
        let key = (a.id.get(), b.id.get());
        if a.id >= b.id {
            self.violations
                .push(format!("begin with unordered sides {key:?}"));
        }
        if !self.active.insert(key) {
            self.violations.push(format!("begin twice for {key:?}"));
        }
        key
    }

    fn pair_end(&mut self, a: PairSide<u32>, b: PairSide<u32>, token: (u32, u32)) {
        let key = (a.id.get(), b.id.get());
        if token != key {
            self.violations
                .push(format!("end for {key:?} got token {token:?}"));
        }
        if !self.active.remove(&key) {
            self.violations
                .push(format!("end without begin for {key:?}"));
        }
    }
}

fn expected_pairs(live: &[Model]) -> BTreeSet<(u32, u32)> {
    let mut out = BTreeSet::new();
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            let filed = !a.aabb.has_no_surface() && !b.aabb.has_no_surface();
            let tracked = a.pairable || b.pairable;
            let compatible = a.ty.intersects(b.mask) || b.ty.intersects(a.mask);
            if filed
                && tracked
                && compatible
                && a.payload != b.payload
                && a.aabb.intersects_inclusive(&b.aabb)
            {
                let (lo, hi) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };
                out.insert((lo.get(), hi.get()));
            }
        }
    }
    out
}

fn sorted_ids(hits: &[CullHit<u32>]) -> Vec<ElementId> {
    let mut ids: Vec<_> = hits.iter().map(|h| h.id).collect();
    ids.sort_unstable();
    ids
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cull_aabb_and_point_match_brute_force(
        boxes in prop::collection::vec(arb_aabb(), 1..80),
        queries in prop::collection::vec(arb_aabb(), 1..8),
        balance in prop_oneof![Just(1.0_f32), 0.0_f32..1.0],
    ) {
        let (mut tree, ids) = filled_tree(&boxes, balance);
        let mut hits = Vec::new();
        for q in &queries {
            hits.clear();
            let n = tree.cull_aabb(q, &mut hits, usize::MAX, PairMask::all());
            prop_assert_eq!(n, hits.len());
            let expected = expected_ids(&boxes, &ids, |b| b.intersects_inclusive(q));
            prop_assert_eq!(sorted_ids(&hits), expected);

            let point = q.position;
            hits.clear();
            tree.cull_point(point, &mut hits, usize::MAX, PairMask::all());
            let expected = expected_ids(&boxes, &ids, |b| b.contains_point(point));
            prop_assert_eq!(sorted_ids(&hits), expected);
        }
    }

    #[test]
    fn cull_segment_matches_brute_force(
        boxes in prop::collection::vec(arb_aabb(), 1..80),
        segments in prop::collection::vec((arb_point(), arb_point()), 1..8),
        balance in prop_oneof![Just(1.0_f32), 0.0_f32..1.0],
    ) {
        let (mut tree, ids) = filled_tree(&boxes, balance);
        let mut hits = Vec::new();
        for (from, to) in segments {
            hits.clear();
            let n = tree.cull_segment(from, to, &mut hits, usize::MAX, PairMask::all());
            prop_assert_eq!(n, hits.len());
            let expected = if from == to {
                Vec::new()
            } else {
                expected_ids(&boxes, &ids, |b| b.intersects_segment(from, to))
            };
            prop_assert_eq!(sorted_ids(&hits), expected);
        }
    }

    #[test]
    fn cull_convex_on_a_box_matches_overlap(
        boxes in prop::collection::vec(arb_aabb(), 1..80),
        queries in prop::collection::vec(arb_solid_aabb(), 1..8),
        balance in prop_oneof![Just(1.0_f32), 0.0_f32..1.0],
    ) {
        let (mut tree, ids) = filled_tree(&boxes, balance);
        let mut hits = Vec::new();
        for q in &queries {
            hits.clear();
            let n = tree.cull_convex(&box_planes(q), &mut hits, usize::MAX, PairMask::all());
            prop_assert_eq!(n, hits.len());
            let expected = expected_ids(&boxes, &ids, |b| b.intersects_inclusive(q));
            prop_assert_eq!(sorted_ids(&hits), expected);
        }
    }

    #[test]
    fn cull_is_capped(
        boxes in prop::collection::vec(arb_aabb(), 1..60),
        max in 0_usize..20,
    ) {
        let mut tree: Octree<u32> = Octree::new();
        for (i, aabb) in boxes.iter().enumerate() {
            tree.create_simple(u32::try_from(i).unwrap(), *aabb).unwrap();
        }
        let everything = Aabb3D::from_min_max(Vec3::splat(-50.0), Vec3::splat(50.0));
        let qualifying = boxes.iter().filter(|b| !b.has_no_surface()).count();
        let mut hits = Vec::new();
        let n = tree.cull_aabb(&everything, &mut hits, max, PairMask::all());
        prop_assert_eq!(n, qualifying.min(max));
        prop_assert_eq!(hits.len(), n);
    }

    #[test]
    fn pairs_track_overlaps_under_random_edits(
        ops in prop::collection::vec(arb_op(), 1..60),
        balance in prop_oneof![Just(1.0_f32), 0.5_f32..1.0],
    ) {
        let config = OctreeConfig { pairing: true, balance, ..OctreeConfig::default() };
        let mut tree = Octree::with_handler(config, ActivePairs::default()).unwrap();
        let mut live: Vec<Model> = Vec::new();
        let mut created = 0_u32;

        for op in ops {
            match op {
                Op::Create { aabb, pairable, ty, mask } => {
                    // A few payloads repeat, which suppresses those pairs.
                    let payload = created % 13;
                    created += 1;
                    let id = tree.create(payload, aabb, 0, pairable, ty, mask).unwrap();
                    live.push(Model { id, payload, aabb, pairable, ty, mask });
                }
                Op::Move { pick, aabb } => {
                    if live.is_empty() {
                        continue;
                    }
                    let n = live.len();
                    let m = &mut live[pick % n];
                    tree.move_element(m.id, aabb).unwrap();
                    m.aabb = aabb;
                }
                Op::Erase { pick } => {
                    if live.is_empty() {
                        continue;
                    }
                    let m = live.swap_remove(pick % live.len());
                    tree.erase(m.id).unwrap();
                }
                Op::SetPairable { pick, pairable } => {
                    if live.is_empty() {
                        continue;
                    }
                    let n = live.len();
                    let m = &mut live[pick % n];
                    tree.set_pairable(m.id, pairable, m.ty, m.mask).unwrap();
                    m.pairable = pairable;
                }
            }
            let handler = tree.handler();
            prop_assert!(handler.violations.is_empty(), "{:?}", handler.violations);
            let expected = expected_pairs(&live);
            prop_assert_eq!(&handler.active, &expected);
            prop_assert_eq!(tree.pair_count(), expected.len());
            prop_assert!(tree.tracked_pair_count() >= tree.pair_count());
        }

        for m in live.drain(..) {
            tree.erase(m.id).unwrap();
        }
        prop_assert!(tree.handler().active.is_empty());
        prop_assert_eq!(tree.tracked_pair_count(), 0);
        prop_assert_eq!(tree.octant_count(), 0);
    }

    #[test]
    fn repeated_moves_to_the_same_box_are_silent(
        boxes in prop::collection::vec(arb_aabb(), 2..30),
        pick in any::<usize>(),
    ) {
        let config = OctreeConfig { pairing: true, ..OctreeConfig::default() };
        let mut tree = Octree::with_handler(config, ActivePairs::default()).unwrap();
        let mut ids = Vec::new();
        for (i, aabb) in boxes.iter().enumerate() {
            let all = PairMask::DEFAULT;
            ids.push(tree.create(u32::try_from(i).unwrap(), *aabb, 0, true, all, all).unwrap());
        }
        let i = pick % ids.len();
        tree.move_element(ids[i], boxes[i]).unwrap();
        let active = tree.handler().active.clone();
        let octants = tree.octant_count();
        for _ in 0..3 {
            tree.move_element(ids[i], boxes[i]).unwrap();
        }
        prop_assert_eq!(&tree.handler().active, &active);
        prop_assert_eq!(tree.octant_count(), octants);
        prop_assert!(tree.handler().violations.is_empty());
    }
}
