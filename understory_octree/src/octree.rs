// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree: root growth and collapse, element lifecycle, filing and removal.

use alloc::vec::Vec;
use core::fmt;
use core::mem;

use glam::Vec3;
use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::config::{OctreeConfig, clamp_balance, elements_limit_for_balance};
use crate::element::{Element, ElementId, MemberList, OctantOwner, PairMask};
use crate::error::OctreeError;
use crate::octant::{ALL_POSITIVE, Octant, OctantIdx};
use crate::pairing::{Link, PairData, PairHandler, PairKey};
use crate::pool::Pool;
use crate::types::Aabb3D;

/// An octant's side is divided by this before comparing it to an element's size.
const OCTREE_DIVISOR: f32 = 4.0;

/// Padding applied to the element size so boxes near a boundary do not oscillate.
const ELEMENT_SIZE_PADDING: f32 = 1.01;

/// The root stops growing once its side exceeds this.
const OCTREE_SIZE_LIMIT: f32 = 1e15;

/// Dynamic octree over 3D boxes with optional broad-phase pairing.
///
/// `P` is a small copyable payload returned by queries and pair callbacks. `H` receives
/// pair transitions when pairing is enabled; the default `()` ignores them.
///
/// Elements with no extent on any axis are recorded but not filed: they are never
/// returned by queries and never pair.
pub struct Octree<P, H: PairHandler<P> = ()> {
    pub(crate) elements: Pool<Element<P>>,
    pub(crate) ids: HashMap<ElementId, usize>,
    pub(crate) octants: Pool<Octant>,
    pub(crate) root: Option<OctantIdx>,
    pub(crate) pairs: HashMap<PairKey, PairData<H::Token>>,
    pub(crate) handler: H,
    /// Stamp for one logical traversal; bumped before each walk that deduplicates.
    pub(crate) pass: u64,
    next_id: u32,
    unit_size: f32,
    pub(crate) pairing: bool,
    pub(crate) pair_shared_payloads: bool,
    balance: f32,
    octant_elements_limit: usize,
    /// Tracked pairs whose boxes currently overlap.
    pub(crate) pair_count: usize,
    /// Traversal stack reused by culls and subtree walks.
    pub(crate) scratch: Vec<usize>,
}

impl<P: fmt::Debug, H: PairHandler<P>> fmt::Debug for Octree<P, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Octree")
            .field("elements", &self.elements.len())
            .field("octants", &self.octants.len())
            .field("root", &self.root.map(|r| self.octants[r.get()].aabb))
            .field("tracked_pairs", &self.pairs.len())
            .field("pair_count", &self.pair_count)
            .field("pairing", &self.pairing)
            .field("balance", &self.balance)
            .field("pass", &self.pass)
            .finish_non_exhaustive()
    }
}

impl<P: Copy + PartialEq> Default for Octree<P, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy + PartialEq> Octree<P, ()> {
    /// Create an empty tree with the default configuration and no pairing.
    pub fn new() -> Self {
        Self::from_parts(OctreeConfig::default(), ())
    }

    /// Create an empty tree from a configuration.
    pub fn with_config(config: OctreeConfig) -> Result<Self, OctreeError> {
        Self::with_handler(config, ())
    }
}

impl<P: Copy + PartialEq, H: PairHandler<P>> Octree<P, H> {
    /// Largest coordinate magnitude accepted in a bounding box.
    pub const COORDINATE_LIMIT: f32 = 1e15;

    /// Create an empty tree that reports pair transitions to `handler`.
    pub fn with_handler(config: OctreeConfig, handler: H) -> Result<Self, OctreeError> {
        config.validate()?;
        Ok(Self::from_parts(config, handler))
    }

    fn from_parts(config: OctreeConfig, handler: H) -> Self {
        let balance = clamp_balance(config.balance);
        Self {
            elements: Pool::new(),
            ids: HashMap::new(),
            octants: Pool::new(),
            root: None,
            pairs: HashMap::new(),
            handler,
            pass: 1,
            next_id: 1,
            unit_size: config.unit_size,
            pairing: config.pairing,
            pair_shared_payloads: config.pair_shared_payloads,
            balance,
            octant_elements_limit: elements_limit_for_balance(balance),
            pair_count: 0,
            scratch: Vec::new(),
        }
    }

    /// Reserve room for `additional` more elements.
    pub fn reserve(&mut self, additional: usize) {
        self.elements.reserve(additional);
        self.ids.reserve(additional);
    }

    /// Insert an element and return its id.
    ///
    /// If pairing is enabled, pairs the element forms and that already overlap are
    /// reported before this returns.
    pub fn create(
        &mut self,
        payload: P,
        aabb: Aabb3D,
        sub_index: u32,
        pairable: bool,
        pairable_type: PairMask,
        pairable_mask: PairMask,
    ) -> Result<ElementId, OctreeError> {
        Self::check_bounds(&aabb)?;
        let next_id = self
            .next_id
            .checked_add(1)
            .ok_or(OctreeError::IdsExhausted)?;
        let root = if aabb.has_no_surface() {
            None
        } else {
            Some(self.grow_root_or_optimize(&aabb)?)
        };

        let id = ElementId(self.next_id);
        self.next_id = next_id;
        let slot = self.elements.insert(Element::new(
            id,
            payload,
            aabb,
            sub_index,
            pairable,
            pairable_type,
            pairable_mask,
        ));
        self.ids.insert(id, slot);

        if let Some(root) = root {
            self.insert_element(slot, root);
            if self.pairing {
                self.element_check_pairs(slot);
            }
        }
        Ok(id)
    }

    /// Insert a non-pairable element with sub-index 0.
    ///
    /// The element's type is [`PairMask::DEFAULT`] and its mask is empty, so it is seen by
    /// default-masked queries and by pairable elements whose mask includes the default bit.
    pub fn create_simple(&mut self, payload: P, aabb: Aabb3D) -> Result<ElementId, OctreeError> {
        self.create(
            payload,
            aabb,
            0,
            false,
            PairMask::DEFAULT,
            PairMask::empty(),
        )
    }

    /// Update the box of an element, re-filing it when it leaves its current octants.
    pub fn move_element(&mut self, id: ElementId, aabb: Aabb3D) -> Result<(), OctreeError> {
        let slot = self.slot_of(id)?;
        Self::check_bounds(&aabb)?;
        let old = self.elements[slot].aabb;
        let old_has_surface = !old.has_no_surface();
        let new_has_surface = !aabb.has_no_surface();

        if old_has_surface != new_has_surface {
            if old_has_surface {
                self.remove_element(slot);
                let e = &mut self.elements[slot];
                e.aabb = aabb;
                e.container_aabb = Aabb3D::ZERO;
                self.optimize();
            } else {
                let root = self.grow_root_or_optimize(&aabb)?;
                let e = &mut self.elements[slot];
                e.aabb = aabb;
                e.common_parent = None;
                self.insert_element(slot, root);
                if self.pairing {
                    self.element_check_pairs(slot);
                }
            }
            return Ok(());
        }

        if !old_has_surface {
            self.elements[slot].aabb = aabb;
            return Ok(());
        }

        if self.elements[slot].container_aabb.encloses(&aabb) {
            self.elements[slot].aabb = aabb;
            for owner in &self.elements[slot].owners {
                self.octants[owner.octant.get()].dirty = true;
            }
            if self.pairing {
                self.element_check_pairs(slot);
            }
            return Ok(());
        }

        let combined = old.merge(&aabb);
        let root = self.grow_root_or_optimize(&combined)?;

        // Climb to the lowest octant that encloses the new box; re-filing starts there.
        let mut common = self.elements[slot]
            .common_parent
            .map_or(root, OctantIdx::get);
        while !self.octants[common].aabb.encloses(&aabb) {
            match self.octants[common].parent {
                Some(parent) => common = parent.get(),
                None => break,
            }
        }

        let old_owners = mem::take(&mut self.elements[slot].owners);
        let e = &mut self.elements[slot];
        e.common_parent = None;
        e.aabb = aabb;
        self.insert_element(slot, common);

        self.pass += 1;
        let limit = self.octants[common].parent.map(OctantIdx::get);
        let mut survivors: SmallVec<[usize; 2]> = SmallVec::new();
        for owner in &old_owners {
            let o = owner.octant.get();
            self.detach_member(slot, *owner);
            if !self.remove_element_from_octant(slot, o, limit) {
                survivors.push(o);
            }
        }

        if self.pairing {
            for o in survivors {
                self.pass += 1;
                self.walk_subtree_pairs(slot, o, Link::Unreference);
            }
            self.element_check_pairs(slot);
        }
        self.optimize();
        Ok(())
    }

    /// Remove an element. Its intersecting pairs end first.
    pub fn erase(&mut self, id: ElementId) -> Result<(), OctreeError> {
        let slot = self.slot_of(id)?;
        if self.elements[slot].is_filed() {
            self.remove_element(slot);
        }
        self.ids.remove(&id);
        self.elements.remove(slot);
        self.optimize();
        Ok(())
    }

    /// Change the pairing attributes of an element.
    ///
    /// Nothing happens when the attributes are unchanged. Otherwise the element is
    /// re-filed: its pairs are torn down (ending the intersecting ones) and rebuilt.
    pub fn set_pairable(
        &mut self,
        id: ElementId,
        pairable: bool,
        pairable_type: PairMask,
        pairable_mask: PairMask,
    ) -> Result<(), OctreeError> {
        let slot = self.slot_of(id)?;
        let e = &self.elements[slot];
        if e.pairable == pairable
            && e.pairable_type == pairable_type
            && e.pairable_mask == pairable_mask
        {
            return Ok(());
        }
        let filed = e.is_filed();
        let aabb = e.aabb;
        if filed {
            self.remove_element(slot);
        }
        let e = &mut self.elements[slot];
        e.pairable = pairable;
        e.pairable_type = pairable_type;
        e.pairable_mask = pairable_mask;
        e.common_parent = None;
        if filed {
            let root = self.grow_root_or_optimize(&aabb)?;
            self.insert_element(slot, root);
            if self.pairing {
                self.element_check_pairs(slot);
            }
        }
        self.optimize();
        Ok(())
    }

    /// Set the balance in `[0, 1]`, clamping out-of-range values.
    ///
    /// Lower values let octants hold more members before subdividing. Only later
    /// insertions see the new setting.
    pub fn set_balance(&mut self, balance: f32) {
        self.balance = clamp_balance(balance);
        self.octant_elements_limit = elements_limit_for_balance(self.balance);
        debug!(
            balance = self.balance,
            limit = self.octant_elements_limit,
            "octree balance changed"
        );
    }

    /// Current balance.
    pub fn balance(&self) -> f32 {
        self.balance
    }

    /// Remove every element, ending all intersecting pairs. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        for (_, pair) in self.pairs.drain() {
            if !pair.intersecting {
                continue;
            }
            if let Some(token) = pair.token {
                let a = self.elements[pair.a].side();
                let b = self.elements[pair.b].side();
                self.handler.pair_end(a, b, token);
            }
        }
        self.pair_count = 0;
        self.elements.clear();
        self.ids.clear();
        self.octants.clear();
        self.root = None;
    }

    /// Payload of an element.
    pub fn get(&self, id: ElementId) -> Option<P> {
        self.element(id).map(|e| e.payload)
    }

    /// Sub-index of an element.
    pub fn sub_index(&self, id: ElementId) -> Option<u32> {
        self.element(id).map(|e| e.sub_index)
    }

    /// Whether an element is pairable.
    pub fn is_pairable(&self, id: ElementId) -> Option<bool> {
        self.element(id).map(|e| e.pairable)
    }

    /// Current box of an element.
    pub fn aabb(&self, id: ElementId) -> Option<Aabb3D> {
        self.element(id).map(|e| e.aabb)
    }

    /// Whether the id refers to a live element.
    pub fn contains(&self, id: ElementId) -> bool {
        self.ids.contains_key(&id)
    }

    /// Number of live elements, filed or not.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// No live elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of octants in the tree.
    pub fn octant_count(&self) -> usize {
        self.octants.len()
    }

    /// Region of the root octant, if any element is filed.
    pub fn root_aabb(&self) -> Option<Aabb3D> {
        self.root.map(|r| self.octants[r.get()].aabb)
    }

    /// Number of tracked pairs that currently overlap.
    pub fn pair_count(&self) -> usize {
        self.pair_count
    }

    /// Number of tracked pairs, overlapping or not.
    pub fn tracked_pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Whether pairing is enabled.
    pub fn is_pairing(&self) -> bool {
        self.pairing
    }

    /// The pair handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The pair handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    fn element(&self, id: ElementId) -> Option<&Element<P>> {
        self.ids.get(&id).and_then(|&slot| self.elements.get(slot))
    }

    fn slot_of(&self, id: ElementId) -> Result<usize, OctreeError> {
        self.ids
            .get(&id)
            .copied()
            .ok_or(OctreeError::UnknownElement(id))
    }

    fn check_bounds(aabb: &Aabb3D) -> Result<(), OctreeError> {
        if aabb.is_within(Self::COORDINATE_LIMIT) {
            Ok(())
        } else {
            warn!(?aabb, "rejected bounding box");
            Err(OctreeError::InvalidBounds)
        }
    }

    fn member_list(&self, slot: usize) -> MemberList {
        if self.pairing && self.elements[slot].pairable {
            MemberList::Pairable
        } else {
            MemberList::Plain
        }
    }

    fn grow_root_or_optimize(&mut self, aabb: &Aabb3D) -> Result<usize, OctreeError> {
        self.ensure_valid_root(aabb)
            .inspect_err(|_| self.optimize())
    }

    /// Create or grow the root until it encloses `aabb`, returning the root.
    fn ensure_valid_root(&mut self, aabb: &Aabb3D) -> Result<usize, OctreeError> {
        let Some(root) = self.root else {
            let mut base = Aabb3D::new(Vec3::ZERO, Vec3::splat(self.unit_size));
            while !base.encloses(aabb) {
                if base.size.x > OCTREE_SIZE_LIMIT {
                    warn!(side = base.size.x, "octree size limit reached");
                    return Err(OctreeError::SizeLimit);
                }
                grow_region(&mut base);
            }
            let root = self.octants.insert(Octant::new(base));
            self.root = Some(OctantIdx::new(root));
            debug!(side = base.size.x, "created root octant");
            return Ok(root);
        };

        let mut root = root.get();
        while !self.octants[root].aabb.encloses(aabb) {
            let mut base = self.octants[root].aabb;
            if base.size.x > OCTREE_SIZE_LIMIT {
                warn!(side = base.size.x, "octree size limit reached");
                return Err(OctreeError::SizeLimit);
            }
            let code = grow_region(&mut base);
            let mut grandparent = Octant::new(base);
            grandparent.children[usize::from(code)] = Some(OctantIdx::new(root));
            grandparent.children_count = 1;
            let gp = self.octants.insert(grandparent);
            let old = &mut self.octants[root];
            old.parent = Some(OctantIdx::new(gp));
            old.parent_index = Some(code);
            root = gp;
            self.root = Some(OctantIdx::new(gp));
            debug!(side = base.size.x, code, "grew root octant");
        }
        Ok(root)
    }

    /// Collapse the root while it has fewer than two children and no members.
    pub(crate) fn optimize(&mut self) {
        while let Some(root) = self.root {
            let octant = &self.octants[root.get()];
            if octant.children_count >= 2 || octant.has_members() {
                break;
            }
            let child = octant.children.iter().flatten().next().copied();
            self.octants.remove(root.get());
            if let Some(child) = child {
                let c = &mut self.octants[child.get()];
                c.parent = None;
                c.parent_index = None;
            }
            self.root = child;
            debug!(remaining = self.octants.len(), "collapsed root octant");
        }
    }

    fn create_child(&mut self, parent: usize, code: u8, region: Aabb3D) -> usize {
        let mut child = Octant::new(region);
        child.parent = Some(OctantIdx::new(parent));
        child.parent_index = Some(code);
        let idx = self.octants.insert(child);
        let p = &mut self.octants[parent];
        p.children[usize::from(code)] = Some(OctantIdx::new(idx));
        p.children_count += 1;
        idx
    }

    /// Detach an octant from its parent (or the root slot) and free it.
    fn release_octant(&mut self, o: usize) {
        let Some(octant) = self.octants.remove(o) else {
            return;
        };
        match (octant.parent, octant.parent_index) {
            (Some(parent), Some(code)) => {
                let p = &mut self.octants[parent.get()];
                p.children[usize::from(code)] = None;
                p.children_count -= 1;
            }
            _ => {
                if self.root == Some(OctantIdx::new(o)) {
                    self.root = None;
                }
            }
        }
    }

    /// File an element under `octant`, subdividing as needed.
    pub(crate) fn insert_element(&mut self, slot: usize, octant: usize) {
        let aabb = self.elements[slot].aabb;
        let element_size = aabb.longest_axis_size() * ELEMENT_SIZE_PADDING;
        let list = self.member_list(slot);
        let can_split = self.octants[octant].members(list).len() >= self.octant_elements_limit;

        if !can_split || self.octants[octant].aabb.size.x / OCTREE_DIVISOR < element_size {
            self.file_into(slot, octant, list);
        } else {
            let candidate = self.elements[slot].common_parent.is_none();
            let mut splits = 0_u8;
            for code in 0..8_u8 {
                let child = match self.octants[octant].children[usize::from(code)] {
                    Some(child) => {
                        if !self.octants[child.get()].aabb.intersects_inclusive(&aabb) {
                            continue;
                        }
                        child.get()
                    }
                    None => {
                        let region = self.octants[octant].child_region(code);
                        if !region.intersects_inclusive(&aabb) {
                            continue;
                        }
                        self.create_child(octant, code, region)
                    }
                };
                self.insert_element(slot, child);
                splits += 1;
            }
            if splits == 0 {
                // Rounding left the box between child regions.
                self.file_into(slot, octant, list);
            } else if candidate && splits > 1 {
                self.elements[slot].common_parent = Some(OctantIdx::new(octant));
            }
        }

        if self.pairing {
            self.link_against_octant(slot, octant, Link::Reference);
        }
    }

    fn file_into(&mut self, slot: usize, octant: usize, list: MemberList) {
        let pos = self.octants[octant].push_member(list, slot);
        let region = self.octants[octant].aabb;
        let e = &mut self.elements[slot];
        e.owners.push(OctantOwner {
            octant: OctantIdx::new(octant),
            list,
            pos,
        });
        if e.common_parent.is_none() {
            e.common_parent = Some(OctantIdx::new(octant));
            e.container_aabb = region;
        } else {
            e.container_aabb.merge_with(&region);
        }
        if self.pairing && self.octants[octant].children_count > 0 {
            // Members below get one reference each.
            self.pass += 1;
            self.walk_subtree_pairs(slot, octant, Link::Reference);
        }
    }

    /// Take an element out of one owner's member list.
    ///
    /// The member moved into the vacated position gets its owner record updated.
    fn detach_member(&mut self, slot: usize, owner: OctantOwner) {
        let o = owner.octant.get();
        let Some(moved) = self.octants[o].remove_member(owner.list, owner.pos, slot) else {
            return;
        };
        for other in &mut self.elements[moved].owners {
            if other.octant == owner.octant && other.list == owner.list {
                other.pos = owner.pos;
            }
        }
    }

    /// Walk upward from an octant the element just left, unpairing it from members along
    /// the way and pruning octants that became empty.
    ///
    /// Stops at `limit`, at an octant already visited this pass that survived, or past the
    /// root. Returns whether `start` was pruned.
    fn remove_element_from_octant(
        &mut self,
        slot: usize,
        start: usize,
        limit: Option<usize>,
    ) -> bool {
        let mut start_removed = false;
        let mut current = Some(start);
        while let Some(o) = current {
            if Some(o) == limit {
                break;
            }
            let mut unpaired = false;
            if self.pairing && self.octants[o].last_pass != self.pass {
                self.link_against_octant(slot, o, Link::Unreference);
                self.octants[o].last_pass = self.pass;
                unpaired = true;
            }
            let parent = self.octants[o].parent.map(OctantIdx::get);
            let removed = self.octants[o].is_empty();
            if removed {
                self.release_octant(o);
                start_removed |= o == start;
            }
            if !removed && !unpaired {
                break;
            }
            current = parent;
        }
        start_removed
    }

    /// Take a filed element out of every owning octant and drop all of its pairs.
    fn remove_element(&mut self, slot: usize) {
        self.pass += 1;
        let owners = mem::take(&mut self.elements[slot].owners);
        let mut survivors: SmallVec<[usize; 2]> = SmallVec::new();
        for owner in &owners {
            let o = owner.octant.get();
            self.detach_member(slot, *owner);
            if !self.remove_element_from_octant(slot, o, None) {
                survivors.push(o);
            }
        }
        if self.pairing {
            for o in survivors {
                self.pass += 1;
                self.walk_subtree_pairs(slot, o, Link::Unreference);
            }
            debug_assert!(
                self.elements[slot].pairs.is_empty(),
                "pairs outlived their shared octants"
            );
            self.release_element_pairs(slot);
        }
        self.elements[slot].common_parent = None;
    }
}

/// Double a region, either in place or after shifting it back by its size.
///
/// Returns the child code the old region takes inside the grown one.
fn grow_region(base: &mut Aabb3D) -> u8 {
    if (base.position.x + base.size.x).abs() <= base.position.x.abs() {
        base.size *= 2.0;
        0
    } else {
        base.position -= base.size;
        base.size *= 2.0;
        ALL_POSITIVE
    }
}
