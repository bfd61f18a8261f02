// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Construction-time settings for an [`Octree`](crate::Octree).

use crate::error::OctreeError;

/// Scale of the balance curve: the element limit reached at `balance == 0`.
pub const BALANCE_LIMIT_SCALE: f32 = 262_144.0;

/// Settings used to build an octree.
///
/// ```rust
/// use understory_octree::{Octree, OctreeConfig};
///
/// let config = OctreeConfig {
///     pairing: true,
///     unit_size: 4.0,
///     ..OctreeConfig::default()
/// };
/// let tree: Octree<u32> = Octree::with_config(config).unwrap();
/// assert!(tree.is_pairing());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OctreeConfig {
    /// Side length of the first root octant. The root doubles from here as needed.
    pub unit_size: f32,
    /// Track overlapping element pairs and report transitions to the pair handler.
    pub pairing: bool,
    /// Tree balance in `[0, 1]`. Lower values keep more elements per octant before
    /// subdividing. `1.0` always subdivides down to the element's size.
    pub balance: f32,
    /// Pair elements even when they carry equal payloads.
    ///
    /// By default two elements with the same payload are treated as parts of one logical
    /// object and are never paired with each other.
    pub pair_shared_payloads: bool,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            unit_size: 1.0,
            pairing: false,
            balance: 1.0,
            pair_shared_payloads: false,
        }
    }
}

impl OctreeConfig {
    /// Check the settings. Balance is clamped rather than rejected.
    pub fn validate(&self) -> Result<(), OctreeError> {
        if !self.unit_size.is_finite() || self.unit_size <= 0.0 {
            return Err(OctreeError::InvalidUnitSize(self.unit_size));
        }
        Ok(())
    }
}

/// Clamp a balance value into `[0, 1]`. NaN maps to `1.0`.
pub(crate) fn clamp_balance(balance: f32) -> f32 {
    if balance.is_nan() {
        1.0
    } else {
        balance.clamp(0.0, 1.0)
    }
}

/// Per-octant element count below which an octant keeps filing instead of subdividing.
///
/// The curve is `(1 - balance)^4` scaled by [`BALANCE_LIMIT_SCALE`]: monotonic and flat near
/// `balance == 1`, so small departures from a fully subdivided tree stay cheap.
pub(crate) fn elements_limit_for_balance(balance: f32) -> usize {
    let v = 1.0 - clamp_balance(balance);
    let v2 = v * v;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The product is in [0, BALANCE_LIMIT_SCALE]; truncation toward zero is intended."
    )]
    let limit = (v2 * v2 * BALANCE_LIMIT_SCALE) as usize;
    limit
}
