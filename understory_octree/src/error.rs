// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for octree operations.

use crate::element::ElementId;

/// Errors reported by [`Octree`](crate::Octree) operations.
///
/// Queries never fail; a degenerate query shape simply matches nothing.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum OctreeError {
    /// The id was never created or has already been erased.
    #[error("element {0} is not present in the octree")]
    UnknownElement(ElementId),
    /// A bounding box contained NaN or coordinates beyond [`Octree::COORDINATE_LIMIT`](crate::Octree::COORDINATE_LIMIT).
    #[error("bounding box is NaN or exceeds the coordinate limit")]
    InvalidBounds,
    /// Growing the root to enclose a box would exceed the size limit.
    #[error("root octant grew past the size limit")]
    SizeLimit,
    /// Every element id has been handed out.
    #[error("element ids exhausted")]
    IdsExhausted,
    /// The configured unit size is not a positive finite number.
    #[error("unit size must be positive and finite, got {0}")]
    InvalidUnitSize(f32),
}
