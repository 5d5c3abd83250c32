//! Durable record of revealed tiles.
//!
//! Every backend answers rectangle queries through [`SpatialIndex`], which keeps tiles grouped by row. A lexicographic
//! scan over a combined `(x, y)` key only matches a rectangle when the rectangle spans whole rows of the key order,
//! so the index narrows each axis separately instead.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::*;
pub use file::*;
pub use memory::*;

mod file;
mod memory;

pub trait RevealStore: Send + Sync {
    /// Inserts a tile, returning whether it was new. Re-inserting a present tile changes nothing.
    fn put(&self, coords: Coord2) -> StoreResult<bool>;

    /// Inserts several tiles, returning how many were new.
    fn put_many(&self, tiles: &[Coord2]) -> StoreResult<usize> {
        let mut added = 0;
        for &coords in tiles {
            if self.put(coords)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Every revealed tile, in no particular order.
    fn get_all(&self) -> StoreResult<Vec<Coord2>>;

    /// Every revealed tile inside `rect`.
    fn get_range(&self, rect: TileRect) -> StoreResult<Vec<Coord2>>;

    fn len(&self) -> StoreResult<usize>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every tile. Readers see either the full old contents or the empty store, never a mix.
    fn clear(&self) -> StoreResult<()>;
}

impl<T: RevealStore + ?Sized> RevealStore for Arc<T> {
    fn put(&self, coords: Coord2) -> StoreResult<bool> {
        (**self).put(coords)
    }

    fn put_many(&self, tiles: &[Coord2]) -> StoreResult<usize> {
        (**self).put_many(tiles)
    }

    fn get_all(&self) -> StoreResult<Vec<Coord2>> {
        (**self).get_all()
    }

    fn get_range(&self, rect: TileRect) -> StoreResult<Vec<Coord2>> {
        (**self).get_range(rect)
    }

    fn len(&self) -> StoreResult<usize> {
        (**self).len()
    }

    fn clear(&self) -> StoreResult<()> {
        (**self).clear()
    }
}

/// Two-dimensional index: rows keyed by `y`, each an ordered set of `x`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpatialIndex {
    rows: BTreeMap<Coord, BTreeSet<Coord>>,
    len: usize,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, (x, y): Coord2) -> bool {
        let added = self.rows.entry(y).or_default().insert(x);
        if added {
            self.len += 1;
        }
        added
    }

    pub fn contains(&self, (x, y): Coord2) -> bool {
        self.rows.get(&y).is_some_and(|row| row.contains(&x))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = Coord2> + '_ {
        self.rows
            .iter()
            .flat_map(|(&y, row)| row.iter().map(move |&x| (x, y)))
    }

    /// Tiles inside `rect`, visiting only the rows it covers and only the columns it covers within each row.
    pub fn range(&self, rect: TileRect) -> impl Iterator<Item = Coord2> + '_ {
        // BTreeMap::range panics on inverted bounds
        let rows = (!rect.is_empty()).then(|| self.rows.range(rect.min_y..rect.max_y));
        rows.into_iter().flatten().flat_map(move |(&y, row)| {
            row.range(rect.min_x..rect.max_x).map(move |&x| (x, y))
        })
    }
}

impl FromIterator<Coord2> for SpatialIndex {
    fn from_iter<I: IntoIterator<Item = Coord2>>(iter: I) -> Self {
        let mut index = Self::new();
        for coords in iter {
            index.insert(coords);
        }
        index
    }
}
