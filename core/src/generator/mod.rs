use serde::{Deserialize, Serialize};

use crate::*;
pub use random::*;

mod random;

/// Candidates sampled per guarantee level before relaxing to the next one.
pub const MAX_SEED_ATTEMPTS: usize = 1000;

/// Guarantee the chosen seed gives the starting tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartTile {
    Random,
    SimpleSafe,
    AlwaysZero,
}

impl StartTile {
    pub fn is_met(self, oracle: &FieldOracle, start: Coord2, seed: Seed) -> bool {
        match self {
            Self::Random => true,
            Self::SimpleSafe => !oracle.is_mine(start, seed),
            Self::AlwaysZero => oracle.mine_count(start, seed) == 0,
        }
    }

    /// Next weaker guarantee, once candidates for this one ran out.
    const fn relaxed(self) -> Option<Self> {
        match self {
            Self::AlwaysZero => Some(Self::SimpleSafe),
            Self::SimpleSafe => Some(Self::Random),
            Self::Random => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedChoice {
    pub seed: Seed,
    /// Guarantee actually met, which is weaker than requested only on a pathological density.
    pub start_tile: StartTile,
}
