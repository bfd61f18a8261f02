// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Broad-phase pairing: reference-counted overlap records and begin/end notification.
//!
//! Two elements become a tracked pair while they share an octant (directly, or through an
//! octant and its subtree). Each shared octant contributes one reference. A tracked pair
//! reports [`PairHandler::pair_begin`] when the two boxes start to overlap and
//! [`PairHandler::pair_end`] when they stop overlapping or stop being tracked.

use core::fmt;
use core::mem;

use tracing::{trace, warn};

use crate::element::ElementId;
use crate::octree::Octree;

/// Undirected key for a pair of elements: the smaller id sits in the high half.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PairKey(u64);

impl PairKey {
    pub(crate) fn new(a: ElementId, b: ElementId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self((u64::from(lo.0) << 32) | u64::from(hi.0))
    }
}

#[derive(Debug)]
pub(crate) struct PairData<T> {
    /// Slot of the element with the smaller id.
    pub(crate) a: usize,
    pub(crate) b: usize,
    pub(crate) refcount: u32,
    pub(crate) intersecting: bool,
    pub(crate) token: Option<T>,
}

/// One side of a pair as seen by a [`PairHandler`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PairSide<P> {
    /// Element id.
    pub id: ElementId,
    /// Payload given at creation.
    pub payload: P,
    /// Sub-index given at creation.
    pub sub_index: u32,
}

/// Receives pair transitions from an [`Octree`] with pairing enabled.
///
/// The `a` side always carries the smaller [`ElementId`].
pub trait PairHandler<P> {
    /// Value produced when a pair begins and handed back when it ends.
    type Token;

    /// Two tracked elements started to overlap.
    fn pair_begin(&mut self, a: PairSide<P>, b: PairSide<P>) -> Self::Token;

    /// Two elements stopped overlapping, or one of them left the tree.
    fn pair_end(&mut self, a: PairSide<P>, b: PairSide<P>, token: Self::Token);
}

/// Ignores every transition.
impl<P> PairHandler<P> for () {
    type Token = ();

    fn pair_begin(&mut self, _a: PairSide<P>, _b: PairSide<P>) -> Self::Token {}

    fn pair_end(&mut self, _a: PairSide<P>, _b: PairSide<P>, _token: Self::Token) {}
}

/// A [`PairHandler`] built from two closures.
///
/// ```rust
/// use understory_octree::{Aabb3D, Octree, OctreeConfig, PairCallbacks, PairMask, Vec3};
///
/// let config = OctreeConfig { pairing: true, ..OctreeConfig::default() };
/// let callbacks = PairCallbacks::new(|_a, _b| 1_u32, |_a, _b, _token: u32| {});
/// let mut tree = Octree::with_handler(config, callbacks).unwrap();
/// let bx = Aabb3D::new(Vec3::ZERO, Vec3::ONE);
/// tree.create(1_u8, bx, 0, true, PairMask::DEFAULT, PairMask::DEFAULT).unwrap();
/// tree.create(2_u8, bx, 0, true, PairMask::DEFAULT, PairMask::DEFAULT).unwrap();
/// assert_eq!(tree.pair_count(), 1);
/// ```
pub struct PairCallbacks<B, E> {
    /// Called on begin; its result is stored with the pair.
    pub begin: B,
    /// Called on end with the stored value.
    pub end: E,
}

impl<B, E> PairCallbacks<B, E> {
    /// Wrap a begin and an end closure.
    pub const fn new(begin: B, end: E) -> Self {
        Self { begin, end }
    }
}

impl<B, E> fmt::Debug for PairCallbacks<B, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairCallbacks").finish_non_exhaustive()
    }
}

impl<P, T, B, E> PairHandler<P> for PairCallbacks<B, E>
where
    B: FnMut(PairSide<P>, PairSide<P>) -> T,
    E: FnMut(PairSide<P>, PairSide<P>, T),
{
    type Token = T;

    fn pair_begin(&mut self, a: PairSide<P>, b: PairSide<P>) -> T {
        (self.begin)(a, b)
    }

    fn pair_end(&mut self, a: PairSide<P>, b: PairSide<P>, token: T) {
        (self.end)(a, b, token);
    }
}

/// Direction of a pairing walk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Link {
    Reference,
    Unreference,
}

impl<P: Copy + PartialEq, H: PairHandler<P>> Octree<P, H> {
    pub(crate) fn link(&mut self, x: usize, y: usize, link: Link) {
        match link {
            Link::Reference => self.pair_reference(x, y),
            Link::Unreference => self.pair_unreference(x, y),
        }
    }

    /// Add one reference to the pair `(x, y)`, creating the record if needed.
    pub(crate) fn pair_reference(&mut self, x: usize, y: usize) {
        if x == y {
            return;
        }
        let ex = &self.elements[x];
        let ey = &self.elements[y];
        if !self.pair_shared_payloads && ex.payload == ey.payload {
            return;
        }
        if !ex.masks_compatible(ey) {
            return;
        }
        let (ix, iy) = (ex.id, ey.id);
        let key = PairKey::new(ix, iy);
        if let Some(pair) = self.pairs.get_mut(&key) {
            pair.refcount += 1;
            return;
        }
        let (a, b) = if ix < iy { (x, y) } else { (y, x) };
        self.pairs.insert(
            key,
            PairData {
                a,
                b,
                refcount: 1,
                intersecting: false,
                token: None,
            },
        );
        self.elements[x].pairs.push(key);
        self.elements[y].pairs.push(key);
    }

    /// Drop one reference to the pair `(x, y)`. Pairs that were never referenced are ignored.
    pub(crate) fn pair_unreference(&mut self, x: usize, y: usize) {
        if x == y {
            return;
        }
        let key = PairKey::new(self.elements[x].id, self.elements[y].id);
        let Some(pair) = self.pairs.get_mut(&key) else {
            return;
        };
        debug_assert!(pair.refcount > 0, "tracked pair with zero references");
        pair.refcount -= 1;
        if pair.refcount == 0 {
            self.release_pair(key);
        }
    }

    /// Remove a pair record, ending it first if it was intersecting.
    fn release_pair(&mut self, key: PairKey) {
        let Some(pair) = self.pairs.remove(&key) else {
            return;
        };
        if pair.intersecting {
            self.pair_count -= 1;
            let a = self.elements[pair.a].side();
            let b = self.elements[pair.b].side();
            trace!(a = %a.id, b = %b.id, "pair end on release");
            if let Some(token) = pair.token {
                self.handler.pair_end(a, b, token);
            }
        }
        for slot in [pair.a, pair.b] {
            let pairs = &mut self.elements[slot].pairs;
            if let Some(pos) = pairs.iter().position(|k| *k == key) {
                pairs.swap_remove(pos);
            }
        }
    }

    /// Release every pair the element still belongs to.
    ///
    /// Unfiling an element drops every reference it holds, so its pair list is empty by
    /// the time this runs and debug builds assert as much. A leftover pair means the
    /// reference counts drifted; release builds end such pairs here and log a warning so
    /// no record points at a freed slot.
    pub(crate) fn release_element_pairs(&mut self, slot: usize) {
        let leftover = self.elements[slot].pairs.len();
        if leftover == 0 {
            return;
        }
        warn!(
            id = %self.elements[slot].id,
            leftover, "element left the tree with tracked pairs"
        );
        while let Some(&key) = self.elements[slot].pairs.last() {
            self.release_pair(key);
        }
    }

    /// Recompute the overlap state of a pair and report a transition.
    pub(crate) fn pair_check(&mut self, key: PairKey) {
        let Some(pair) = self.pairs.get_mut(&key) else {
            return;
        };
        let ea = &self.elements[pair.a];
        let eb = &self.elements[pair.b];
        let intersecting = ea.aabb.intersects_inclusive(&eb.aabb);
        if intersecting == pair.intersecting {
            return;
        }
        pair.intersecting = intersecting;
        let (a, b) = (ea.side(), eb.side());
        if intersecting {
            trace!(a = %a.id, b = %b.id, "pair begin");
            pair.token = Some(self.handler.pair_begin(a, b));
            self.pair_count += 1;
        } else {
            trace!(a = %a.id, b = %b.id, "pair end");
            if let Some(token) = pair.token.take() {
                self.handler.pair_end(a, b, token);
            }
            self.pair_count -= 1;
        }
    }

    /// Re-check every pair of an element after its box changed.
    pub(crate) fn element_check_pairs(&mut self, slot: usize) {
        let mut i = 0;
        while i < self.elements[slot].pairs.len() {
            let key = self.elements[slot].pairs[i];
            self.pair_check(key);
            i += 1;
        }
    }

    /// Link the element against the members of one octant.
    ///
    /// Pairable members always count; plain members only when the element itself is pairable.
    pub(crate) fn link_against_octant(&mut self, slot: usize, octant: usize, link: Link) {
        let mut i = 0;
        while i < self.octants[octant].pairable_elements.len() {
            let other = self.octants[octant].pairable_elements[i];
            self.link(slot, other, link);
            i += 1;
        }
        if self.elements[slot].pairable {
            let mut i = 0;
            while i < self.octants[octant].elements.len() {
                let other = self.octants[octant].elements[i];
                self.link(slot, other, link);
                i += 1;
            }
        }
    }

    /// Link the element against every member below `octant`, once per member.
    ///
    /// The caller bumps the pass first; members are stamped as they are visited.
    pub(crate) fn walk_subtree_pairs(&mut self, slot: usize, octant: usize, link: Link) {
        let pass = self.pass;
        let pairable = self.elements[slot].pairable;
        let mut stack = mem::take(&mut self.scratch);
        stack.clear();
        let children = self.octants[octant].children;
        stack.extend(children.iter().flatten().map(|c| c.get()));
        while let Some(o) = stack.pop() {
            let mut i = 0;
            while i < self.octants[o].pairable_elements.len() {
                let other = self.octants[o].pairable_elements[i];
                if self.elements[other].last_pass != pass {
                    self.elements[other].last_pass = pass;
                    self.link(slot, other, link);
                }
                i += 1;
            }
            if pairable {
                let mut i = 0;
                while i < self.octants[o].elements.len() {
                    let other = self.octants[o].elements[i];
                    if self.elements[other].last_pass != pass {
                        self.elements[other].last_pass = pass;
                        self.link(slot, other, link);
                    }
                    i += 1;
                }
            }
            let octant = &self.octants[o];
            if octant.children_count > 0 {
                stack.extend(octant.children.iter().flatten().map(|c| c.get()));
            }
        }
        self.scratch = stack;
    }
}
