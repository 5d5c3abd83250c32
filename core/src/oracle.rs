//! Storage-free mine placement.
//!
//! Whether a tile holds a mine is a pure function of its coordinates and the game seed, so the field never has to
//! be generated or stored ahead of time. Only integer arithmetic goes into the hash, which keeps a persisted game
//! meaningful across restarts and platforms.

use serde::{Deserialize, Serialize};

use crate::*;

/// Fraction of tiles that hold a mine.
pub const MINE_DENSITY: f64 = 0.15;

/// Sparsest field accepted. Below roughly 0.11 the zero tiles of a field form an unbounded cluster and a single
/// reveal would never stop flooding.
pub const MIN_MINE_DENSITY: f64 = 0.13;

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// SplitMix64 finalizer.
const fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

const fn tile_hash((x, y): Coord2, seed: Seed) -> u64 {
    let key = ((x as u32 as u64) << 32) | (y as u32 as u64);
    mix(seed ^ mix(key ^ GOLDEN_GAMMA))
}

/// Maps the hash into `[0, 1)` using its top 53 bits.
fn unit_interval(hash: u64) -> f64 {
    (hash >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldOracle {
    density: f64,
}

impl Default for FieldOracle {
    fn default() -> Self {
        Self {
            density: MINE_DENSITY,
        }
    }
}

impl FieldOracle {
    /// Oracle placing mines on `density` of the tiles, clamped to `[MIN_MINE_DENSITY, 1.0]`.
    pub fn new(density: f64) -> Self {
        if density.is_nan() {
            log::warn!("Mine density is NaN, using default {MINE_DENSITY}");
            return Self::default();
        }
        if density < MIN_MINE_DENSITY {
            log::warn!("Mine density {density} would flood without end, using {MIN_MINE_DENSITY}");
        }
        Self {
            density: density.clamp(MIN_MINE_DENSITY, 1.0),
        }
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn is_mine(&self, coords: Coord2, seed: Seed) -> bool {
        unit_interval(tile_hash(coords, seed)) < self.density
    }

    /// Mined neighbor count, or [`MINE`] when the tile itself is mined.
    pub fn mine_count(&self, coords: Coord2, seed: Seed) -> MineCount {
        if self.is_mine(coords, seed) {
            return MINE;
        }
        // at most 8 neighbors
        neighbors(coords)
            .filter(|&pos| self.is_mine(pos, seed))
            .count() as MineCount
    }

    pub fn cell(&self, coords: Coord2, seed: Seed) -> FieldCell {
        FieldCell::from_count(self.mine_count(coords, seed))
    }
}
