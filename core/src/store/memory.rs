use std::sync::RwLock;

use super::*;

/// Volatile store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryRevealStore {
    index: RwLock<SpatialIndex>,
}

impl MemoryRevealStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevealStore for MemoryRevealStore {
    fn put(&self, coords: Coord2) -> StoreResult<bool> {
        let mut index = self.index.write().map_err(|_| StoreError::Poisoned)?;
        Ok(index.insert(coords))
    }

    fn put_many(&self, tiles: &[Coord2]) -> StoreResult<usize> {
        let mut index = self.index.write().map_err(|_| StoreError::Poisoned)?;
        Ok(tiles.iter().filter(|&&coords| index.insert(coords)).count())
    }

    fn get_all(&self) -> StoreResult<Vec<Coord2>> {
        let index = self.index.read().map_err(|_| StoreError::Poisoned)?;
        Ok(index.iter().collect())
    }

    fn get_range(&self, rect: TileRect) -> StoreResult<Vec<Coord2>> {
        let index = self.index.read().map_err(|_| StoreError::Poisoned)?;
        Ok(index.range(rect).collect())
    }

    fn len(&self) -> StoreResult<usize> {
        let index = self.index.read().map_err(|_| StoreError::Poisoned)?;
        Ok(index.len())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut index = self.index.write().map_err(|_| StoreError::Poisoned)?;
        index.clear();
        Ok(())
    }
}
