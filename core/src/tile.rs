use serde::{Deserialize, Serialize};

use crate::{MINE, MineCount};

/// What the oracle knows about a single tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldCell {
    Mine,
    Clear(u8),
}

impl FieldCell {
    /// Decodes the sentinel encoding. Anything above [`MINE`] is a bug in the caller.
    pub fn from_count(count: MineCount) -> Self {
        assert!(count <= MINE, "mine count out of range: {count}");
        if count == MINE {
            Self::Mine
        } else {
            Self::Clear(count)
        }
    }

    pub const fn count(self) -> MineCount {
        match self {
            Self::Mine => MINE,
            Self::Clear(count) => count,
        }
    }

    pub const fn is_mine(self) -> bool {
        matches!(self, Self::Mine)
    }

    /// Zero tiles keep the flood going, numbered ones stop it.
    pub const fn is_opening(self) -> bool {
        matches!(self, Self::Clear(0))
    }
}
