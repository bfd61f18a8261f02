// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Octant records: nodes of the spatial tree.

use alloc::vec::Vec;

use crate::element::{MemberList, PairMask};
use crate::types::Aabb3D;

/// Child code with every half set to the positive side.
pub(crate) const ALL_POSITIVE: u8 = 0b111;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct OctantIdx(usize);

impl OctantIdx {
    pub(crate) const fn new(i: usize) -> Self {
        Self(i)
    }

    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

/// Flat copy of a member used by queries.
#[derive(Copy, Clone, Debug)]
pub(crate) struct CachedMember {
    pub(crate) slot: usize,
    pub(crate) aabb: Aabb3D,
    pub(crate) pairable_type: PairMask,
}

#[derive(Clone, Debug)]
pub(crate) struct Octant {
    pub(crate) aabb: Aabb3D,
    pub(crate) last_pass: u64,
    pub(crate) parent: Option<OctantIdx>,
    /// Code under which this octant hangs from its parent.
    pub(crate) parent_index: Option<u8>,
    /// Indexed by child code: bit 0 is +X, bit 1 is +Y, bit 2 is +Z.
    pub(crate) children: [Option<OctantIdx>; 8],
    pub(crate) children_count: u8,
    pub(crate) elements: Vec<usize>,
    pub(crate) pairable_elements: Vec<usize>,
    pub(crate) cache: Vec<CachedMember>,
    pub(crate) dirty: bool,
}

impl Octant {
    pub(crate) fn new(aabb: Aabb3D) -> Self {
        Self {
            aabb,
            last_pass: 0,
            parent: None,
            parent_index: None,
            children: [None; 8],
            children_count: 0,
            elements: Vec::new(),
            pairable_elements: Vec::new(),
            cache: Vec::new(),
            dirty: false,
        }
    }

    /// Region of the child with the given code.
    pub(crate) fn child_region(&self, code: u8) -> Aabb3D {
        let size = self.aabb.size * 0.5;
        let mut position = self.aabb.position;
        if code & 1 != 0 {
            position.x += size.x;
        }
        if code & 2 != 0 {
            position.y += size.y;
        }
        if code & 4 != 0 {
            position.z += size.z;
        }
        Aabb3D::new(position, size)
    }

    #[inline]
    pub(crate) fn has_members(&self) -> bool {
        !self.elements.is_empty() || !self.pairable_elements.is_empty()
    }

    /// No children and no members.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.children_count == 0 && !self.has_members()
    }

    pub(crate) fn members(&self, list: MemberList) -> &[usize] {
        match list {
            MemberList::Plain => &self.elements,
            MemberList::Pairable => &self.pairable_elements,
        }
    }

    /// Append a member and return its position in the list.
    pub(crate) fn push_member(&mut self, list: MemberList, slot: usize) -> usize {
        let members = self.members_mut(list);
        members.push(slot);
        let pos = members.len() - 1;
        self.dirty = true;
        pos
    }

    /// Remove the member at `pos`.
    ///
    /// Returns the slot of the member that was moved into `pos` to fill the gap, if any.
    pub(crate) fn remove_member(
        &mut self,
        list: MemberList,
        pos: usize,
        slot: usize,
    ) -> Option<usize> {
        let members = self.members_mut(list);
        debug_assert_eq!(
            members.get(pos).copied(),
            Some(slot),
            "stale member position for slot {slot}"
        );
        members.swap_remove(pos);
        let moved = members.get(pos).copied();
        self.dirty = true;
        moved
    }

    fn members_mut(&mut self, list: MemberList) -> &mut Vec<usize> {
        match list {
            MemberList::Plain => &mut self.elements,
            MemberList::Pairable => &mut self.pairable_elements,
        }
    }
}
