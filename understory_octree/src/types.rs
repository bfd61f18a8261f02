// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.
//!
//! Only the operations the octree actually relies on are provided here: boundary-inclusive
//! overlap, strict enclosure for root growth, segment and convex-shape tests, and the plane
//! triple intersection used to recover polytope vertices.

use alloc::vec::Vec;
use glam::Vec3;

/// Tolerance used for near-zero determinants and plane-side classification.
pub const CMP_EPSILON: f32 = 1e-5;

/// Axis-aligned bounding box in 3D, stored as an origin corner and a size.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3D {
    /// Minimum corner.
    pub position: Vec3,
    /// Extent along each axis. Expected to be non-negative.
    pub size: Vec3,
}

impl Aabb3D {
    /// The empty box at the origin.
    pub const ZERO: Self = Self::new(Vec3::ZERO, Vec3::ZERO);

    /// Create a box from its minimum corner and size.
    pub const fn new(position: Vec3, size: Vec3) -> Self {
        Self { position, size }
    }

    /// Create a box from its minimum and maximum corners.
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            position: min,
            size: max - min,
        }
    }

    /// Minimum corner.
    #[inline]
    pub fn min(&self) -> Vec3 {
        self.position
    }

    /// Maximum corner.
    #[inline]
    pub fn max(&self) -> Vec3 {
        self.position + self.size
    }

    /// True when the box has no extent on any axis (a point or an inverted box).
    ///
    /// Flat boxes (zero extent on one or two axes) still have a surface and are indexed.
    #[inline]
    pub fn has_no_surface(&self) -> bool {
        self.size.x <= 0.0 && self.size.y <= 0.0 && self.size.z <= 0.0
    }

    /// Length of the longest side.
    #[inline]
    pub fn longest_axis_size(&self) -> f32 {
        self.size.max_element()
    }

    /// Whether `other` lies inside this box.
    ///
    /// The minimum side is inclusive and the maximum side is strict, so a box never
    /// encloses a box sharing its maximum face.
    pub fn encloses(&self, other: &Self) -> bool {
        let src_min = self.min();
        let src_max = self.max();
        let dst_min = other.min();
        let dst_max = other.max();
        src_min.x <= dst_min.x
            && src_max.x > dst_max.x
            && src_min.y <= dst_min.y
            && src_max.y > dst_max.y
            && src_min.z <= dst_min.z
            && src_max.z > dst_max.z
    }

    /// Overlap test where touching faces count as intersecting.
    pub fn intersects_inclusive(&self, other: &Self) -> bool {
        let a_max = self.max();
        let b_max = other.max();
        !(self.position.x > b_max.x
            || a_max.x < other.position.x
            || self.position.y > b_max.y
            || a_max.y < other.position.y
            || self.position.z > b_max.z
            || a_max.z < other.position.z)
    }

    /// Whether the point lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        let max = self.max();
        p.x >= self.position.x
            && p.y >= self.position.y
            && p.z >= self.position.z
            && p.x <= max.x
            && p.y <= max.y
            && p.z <= max.z
    }

    /// Grow this box to also cover `other`.
    pub fn merge_with(&mut self, other: &Self) {
        let min = self.min().min(other.min());
        let max = self.max().max(other.max());
        *self = Self::from_min_max(min, max);
    }

    /// The smallest box covering both boxes.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut out = *self;
        out.merge_with(other);
        out
    }

    /// Slab test of the segment `from..to` against the box, boundary-inclusive.
    pub fn intersects_segment(&self, from: Vec3, to: Vec3) -> bool {
        let mut min = 0.0_f32;
        let mut max = 1.0_f32;
        for axis in 0..3 {
            let seg_from = from[axis];
            let seg_to = to[axis];
            let box_begin = self.position[axis];
            let box_end = box_begin + self.size[axis];
            let (cmin, cmax);
            if seg_from < seg_to {
                if seg_from > box_end || seg_to < box_begin {
                    return false;
                }
                let length = seg_to - seg_from;
                cmin = if seg_from < box_begin {
                    (box_begin - seg_from) / length
                } else {
                    0.0
                };
                cmax = if seg_to > box_end {
                    (box_end - seg_from) / length
                } else {
                    1.0
                };
            } else {
                if seg_to > box_end || seg_from < box_begin {
                    return false;
                }
                let length = seg_to - seg_from;
                cmin = if seg_from > box_end {
                    (box_end - seg_from) / length
                } else {
                    0.0
                };
                cmax = if seg_to < box_begin {
                    (box_begin - seg_from) / length
                } else {
                    1.0
                };
            }
            if cmin > min {
                min = cmin;
            }
            if cmax < max {
                max = cmax;
            }
            if max < min {
                return false;
            }
        }
        true
    }

    /// Test the box against a convex shape given by its bounding planes (normals pointing
    /// outward) and the shape's vertices.
    ///
    /// A box is rejected when it lies fully outside any plane, or when every vertex of the
    /// shape lies beyond the box on one side of one axis. The second test removes the false
    /// positives a plane-only test reports near the shape's edges and corners.
    pub fn intersects_convex_shape(&self, planes: &[Plane], points: &[Vec3]) -> bool {
        let half_extents = self.size * 0.5;
        let center = self.position + half_extents;

        for plane in planes {
            let n = plane.normal;
            let support = Vec3::new(
                if n.x > 0.0 {
                    -half_extents.x
                } else {
                    half_extents.x
                },
                if n.y > 0.0 {
                    -half_extents.y
                } else {
                    half_extents.y
                },
                if n.z > 0.0 {
                    -half_extents.z
                } else {
                    half_extents.z
                },
            ) + center;
            if plane.is_point_over(support) {
                return false;
            }
        }

        for axis in 0..3 {
            let lo = center[axis] - half_extents[axis];
            let hi = center[axis] + half_extents[axis];
            if points.iter().all(|p| p[axis] > hi) || points.iter().all(|p| p[axis] < lo) {
                return false;
            }
        }
        true
    }

    /// True when every component is a number and lies within `limit` in magnitude.
    pub(crate) fn is_within(&self, limit: f32) -> bool {
        let ok = |v: Vec3| !v.is_nan() && v.abs().max_element() <= limit;
        ok(self.position) && ok(self.size)
    }
}

/// A plane `normal · p = d`. Points with `normal · p > d` are "over" (outside) the plane.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Plane {
    /// Plane normal. Convex shapes use outward-facing normals.
    pub normal: Vec3,
    /// Distance from the origin along the normal.
    pub d: f32,
}

impl Plane {
    /// Create a plane from a normal and a distance.
    pub const fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Create the plane through `point` with the given normal.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        Self {
            normal,
            d: normal.dot(point),
        }
    }

    /// Signed distance of `p` from the plane (for unit normals).
    #[inline]
    pub fn distance_to(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.d
    }

    /// Whether `p` lies on the outer side of the plane.
    #[inline]
    pub fn is_point_over(&self, p: Vec3) -> bool {
        self.normal.dot(p) > self.d
    }

    /// The unique point shared by three planes, or `None` when two or more of them are
    /// (nearly) parallel.
    pub fn intersect_3(&self, b: &Self, c: &Self) -> Option<Vec3> {
        let n0 = self.normal;
        let n1 = b.normal;
        let n2 = c.normal;
        let denom = n0.cross(n1).dot(n2);
        if denom.abs() < CMP_EPSILON {
            return None;
        }
        let numerator = n1.cross(n2) * self.d + n2.cross(n0) * b.d + n0.cross(n1) * c.d;
        Some(numerator / denom)
    }
}

/// Vertices of the convex polytope bounded by `planes`.
///
/// Every triple of planes with a unique intersection point contributes that point unless
/// some other plane excludes it. An empty result means the planes bound no finite region
/// (fewer than three usable planes, or contradictory half-spaces).
pub fn convex_hull_points(planes: &[Plane]) -> Vec<Vec3> {
    let mut points = Vec::new();
    let n = planes.len();
    for i in (0..n).rev() {
        for j in (0..i).rev() {
            for k in (0..j).rev() {
                let Some(point) = planes[i].intersect_3(&planes[j], &planes[k]) else {
                    continue;
                };
                let excluded = planes.iter().enumerate().any(|(m, plane)| {
                    m != i && m != j && m != k && plane.distance_to(point) > CMP_EPSILON
                });
                if !excluded {
                    points.push(point);
                }
            }
        }
    }
    points
}

#[cfg(test)]
pub(crate) fn unit_cube_planes(half: f32) -> Vec<Plane> {
    alloc::vec![
        Plane::new(Vec3::X, half),
        Plane::new(Vec3::NEG_X, half),
        Plane::new(Vec3::Y, half),
        Plane::new(Vec3::NEG_Y, half),
        Plane::new(Vec3::Z, half),
        Plane::new(Vec3::NEG_Z, half),
    ]
}
