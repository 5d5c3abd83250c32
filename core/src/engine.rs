use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealOutcome {
    /// The request was ignored, the game is already over.
    NoChange,
    Revealed,
    HitMine,
}

impl RevealOutcome {
    pub const fn has_update(self) -> bool {
        use RevealOutcome::*;
        match self {
            NoChange => false,
            Revealed => true,
            HitMine => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealReport {
    pub outcome: RevealOutcome,
    /// Tiles the traversal accepted, including ones that were already revealed before.
    pub revealed: usize,
    /// Tiles that were not in the store yet.
    pub added: usize,
}

impl RevealReport {
    pub const fn no_change() -> Self {
        Self {
            outcome: RevealOutcome::NoChange,
            revealed: 0,
            added: 0,
        }
    }
}

/// How a traversal hands accepted tiles to the store.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// One write per tile, signalled as it happens, so a renderer can show the cascade growing.
    #[default]
    Incremental,
    /// Buffer up to this many tiles per write.
    Batched(usize),
}

/// Shared count of tile writes, bumped after every successful store write. Observers compare it against the value they
/// last rendered to learn that the revealed region changed.
#[derive(Clone, Debug, Default)]
pub struct RevealCounter(Arc<AtomicU64>);

impl RevealCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn add(&self, count: usize) {
        self.0.fetch_add(count as u64, Ordering::AcqRel);
    }
}

/// Breadth-first reveal over the oracle's answers, stopping at numbered tiles.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FloodRevealEngine {
    oracle: FieldOracle,
    write_mode: WriteMode,
}

impl FloodRevealEngine {
    pub fn new(oracle: FieldOracle, write_mode: WriteMode) -> Self {
        Self { oracle, write_mode }
    }

    pub fn oracle(&self) -> &FieldOracle {
        &self.oracle
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Reveals the region around `start`: the connected zero tiles reachable from it plus the ring of numbered tiles
    /// bordering them. Hitting a mine ends the traversal before anything else is written.
    pub fn reveal<S: RevealStore + ?Sized>(
        &self,
        start: Coord2,
        seed: Seed,
        store: &S,
        counter: &RevealCounter,
    ) -> StoreResult<RevealReport> {
        let mut visited = HashSet::new();
        let mut to_visit = VecDeque::from([start]);
        let mut batch = Batch::new(self.write_mode, store, counter);
        let mut revealed = 0;

        while let Some(visit_coords) = to_visit.pop_front() {
            if !visited.insert(visit_coords) {
                continue;
            }

            let cell = self.oracle.cell(visit_coords, seed);
            if cell.is_mine() {
                // neighbors are only queued around zero tiles, so only the start can be a mine
                assert_eq!(visit_coords, start, "flood reached a mine past the start");
                log::debug!("Mine at {visit_coords:?}");
                return Ok(RevealReport {
                    outcome: RevealOutcome::HitMine,
                    revealed: 0,
                    added: 0,
                });
            }

            log::trace!("Reveal {visit_coords:?} ({})", cell.count());
            batch.push(visit_coords)?;
            revealed += 1;

            if cell.is_opening() {
                to_visit.extend(neighbors(visit_coords).filter(|pos| !visited.contains(pos)));
            }
        }

        let added = batch.finish()?;
        log::debug!("Revealed {revealed} tiles from {start:?}, {added} new");
        Ok(RevealReport {
            outcome: RevealOutcome::Revealed,
            revealed,
            added,
        })
    }
}

struct Batch<'a, S: RevealStore + ?Sized> {
    store: &'a S,
    counter: &'a RevealCounter,
    capacity: usize,
    pending: Vec<Coord2>,
    added: usize,
}

impl<'a, S: RevealStore + ?Sized> Batch<'a, S> {
    fn new(write_mode: WriteMode, store: &'a S, counter: &'a RevealCounter) -> Self {
        let capacity = match write_mode {
            WriteMode::Incremental => 1,
            WriteMode::Batched(size) => size.max(1),
        };
        Self {
            store,
            counter,
            capacity,
            pending: Vec::with_capacity(capacity),
            added: 0,
        }
    }

    fn push(&mut self, coords: Coord2) -> StoreResult<()> {
        if self.capacity == 1 {
            if self.store.put(coords)? {
                self.added += 1;
            }
            self.counter.add(1);
            return Ok(());
        }

        self.pending.push(coords);
        if self.pending.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> StoreResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.added += self.store.put_many(&self.pending)?;
        self.counter.add(self.pending.len());
        self.pending.clear();
        Ok(())
    }

    fn finish(mut self) -> StoreResult<usize> {
        self.flush()?;
        Ok(self.added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Zero-count tiles reachable from `start` plus their numbered border, computed independently of the engine.
    fn expected_region(oracle: &FieldOracle, start: Coord2, seed: Seed) -> HashSet<Coord2> {
        let mut region = HashSet::new();
        let mut stack = vec![start];
        while let Some(pos) = stack.pop() {
            if !region.insert(pos) {
                continue;
            }
            if oracle.mine_count(pos, seed) == 0 {
                stack.extend(neighbors(pos));
            }
        }
        region
    }

    #[test]
    fn reveal_floods_zero_region() {
        let engine = FloodRevealEngine::default();
        let store = MemoryRevealStore::new();
        let counter = RevealCounter::new();

        let report = engine.reveal((5, 5), 42, &store, &counter).unwrap();

        let stored: HashSet<_> = store.get_all().unwrap().into_iter().collect();
        assert_eq!(report.outcome, RevealOutcome::Revealed);
        assert_eq!(stored, expected_region(engine.oracle(), (5, 5), 42));
        assert_eq!(report.revealed, 27);
        assert_eq!(report.added, 27);
        assert_eq!(counter.get(), 27);
    }

    #[test]
    fn reveal_hits_mine_without_writing() {
        let engine = FloodRevealEngine::default();
        let store = MemoryRevealStore::new();
        let counter = RevealCounter::new();

        let report = engine.reveal((0, 0), 7, &store, &counter).unwrap();

        assert_eq!(report.outcome, RevealOutcome::HitMine);
        assert!(store.is_empty().unwrap());
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn numbered_tile_reveals_only_itself() {
        let engine = FloodRevealEngine::default();
        let store = MemoryRevealStore::new();
        let counter = RevealCounter::new();
        let start = TileRect::new(-50, 50, -50, 50)
            .iter()
            .find(|&pos| matches!(engine.oracle().cell(pos, 11), FieldCell::Clear(1..)))
            .unwrap();

        let report = engine.reveal(start, 11, &store, &counter).unwrap();

        assert_eq!(report.revealed, 1);
        assert_eq!(store.get_all().unwrap(), vec![start]);
    }

    #[test]
    fn repeated_reveal_adds_nothing() {
        let engine = FloodRevealEngine::default();
        let store = MemoryRevealStore::new();
        let counter = RevealCounter::new();

        engine.reveal((5, 5), 42, &store, &counter).unwrap();
        let report = engine.reveal((5, 5), 42, &store, &counter).unwrap();

        assert_eq!(report.outcome, RevealOutcome::Revealed);
        assert_eq!(report.added, 0);
        assert_eq!(store.len().unwrap(), 27);
    }

    #[test]
    fn batched_writes_reach_the_same_region() {
        let incremental = MemoryRevealStore::new();
        let batched = MemoryRevealStore::new();
        let counter = RevealCounter::new();

        FloodRevealEngine::default()
            .reveal((5, 5), 42, &incremental, &counter)
            .unwrap();
        let report = FloodRevealEngine::new(FieldOracle::default(), WriteMode::Batched(4))
            .reveal((5, 5), 42, &batched, &counter)
            .unwrap();

        let mut left = incremental.get_all().unwrap();
        let mut right = batched.get_all().unwrap();
        left.sort_unstable();
        right.sort_unstable();
        assert_eq!(left, right);
        assert_eq!(report.added, 27);
        assert_eq!(counter.get(), 54);
    }

    #[test]
    fn mine_free_request_still_floods_a_bounded_region() {
        let oracle = FieldOracle::new(0.0);
        let engine = FloodRevealEngine::new(oracle, WriteMode::Batched(256));
        let store = MemoryRevealStore::new();
        let start = TileRect::new(-20, 20, -20, 20)
            .iter()
            .find(|&pos| oracle.mine_count(pos, 5) == 0)
            .unwrap();

        let report = engine.reveal(start, 5, &store, &RevealCounter::new()).unwrap();

        assert_eq!(oracle.density(), MIN_MINE_DENSITY);
        assert!(report.revealed >= 9);
        assert_eq!(store.len().unwrap(), report.added);
    }

    #[test]
    fn dense_field_never_reveals_mines() {
        let oracle = FieldOracle::new(0.3);
        let engine = FloodRevealEngine::new(oracle, WriteMode::Incremental);
        let store = MemoryRevealStore::new();
        let counter = RevealCounter::new();
        let start = TileRect::new(-20, 20, -20, 20)
            .iter()
            .find(|&pos| oracle.mine_count(pos, 8) == 0)
            .unwrap();

        engine.reveal(start, 8, &store, &counter).unwrap();

        for pos in store.get_all().unwrap() {
            assert!(!oracle.is_mine(pos, 8));
        }
    }
}
