// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element records: one inserted bounding box with its pairing attributes.

use core::fmt;

use smallvec::SmallVec;

use crate::octant::OctantIdx;
use crate::pairing::{PairKey, PairSide};
use crate::types::Aabb3D;

/// Identifier of an element in an [`Octree`](crate::Octree).
///
/// Ids are handed out in increasing order starting at 1 and are never reused by the same
/// tree, even after the element is erased.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    /// The raw id value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags::bitflags! {
    /// Pairing type and mask bits.
    ///
    /// Two elements may pair when `a.type & b.mask` or `b.type & a.mask` is non-empty.
    /// Queries use the same bits to filter results while pairing is enabled.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PairMask: u32 {
        /// The default type bit.
        const DEFAULT = 0b0000_0001;

        // Every bit is available to callers.
        const _ = !0;
    }
}

impl Default for PairMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Which member list of an octant holds an element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum MemberList {
    Plain,
    Pairable,
}

/// One owning octant of an element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct OctantOwner {
    pub(crate) octant: OctantIdx,
    pub(crate) list: MemberList,
    /// Position of the element in that member list.
    pub(crate) pos: usize,
}

#[derive(Clone, Debug)]
pub(crate) struct Element<P> {
    pub(crate) id: ElementId,
    pub(crate) aabb: Aabb3D,
    /// Union of the regions of every owning octant.
    pub(crate) container_aabb: Aabb3D,
    pub(crate) payload: P,
    pub(crate) sub_index: u32,
    pub(crate) pairable: bool,
    pub(crate) pairable_type: PairMask,
    pub(crate) pairable_mask: PairMask,
    pub(crate) last_pass: u64,
    /// Lowest octant covering every owner.
    pub(crate) common_parent: Option<OctantIdx>,
    pub(crate) pairs: SmallVec<[PairKey; 4]>,
    pub(crate) owners: SmallVec<[OctantOwner; 2]>,
}

impl<P: Copy> Element<P> {
    pub(crate) fn new(
        id: ElementId,
        payload: P,
        aabb: Aabb3D,
        sub_index: u32,
        pairable: bool,
        pairable_type: PairMask,
        pairable_mask: PairMask,
    ) -> Self {
        Self {
            id,
            aabb,
            container_aabb: Aabb3D::ZERO,
            payload,
            sub_index,
            pairable,
            pairable_type,
            pairable_mask,
            last_pass: 0,
            common_parent: None,
            pairs: SmallVec::new(),
            owners: SmallVec::new(),
        }
    }

    /// Whether the element is filed in the tree.
    #[inline]
    pub(crate) fn is_filed(&self) -> bool {
        !self.aabb.has_no_surface()
    }

    /// Either side may pair with the other.
    #[inline]
    pub(crate) fn masks_compatible(&self, other: &Self) -> bool {
        self.pairable_type.intersects(other.pairable_mask)
            || other.pairable_type.intersects(self.pairable_mask)
    }

    #[inline]
    pub(crate) fn side(&self) -> PairSide<P> {
        PairSide {
            id: self.id,
            payload: self.payload,
            sub_index: self.sub_index,
        }
    }
}
