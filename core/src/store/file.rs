use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use super::*;

/// First line of a cleared journal. A fresh random generation tells other handles their index is stale.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    generation: u64,
}

#[derive(Debug)]
struct Journal {
    index: SpatialIndex,
    file: File,
    generation: u64,
    /// Bytes of the file reflected in `index`, always ending on a line boundary.
    synced_len: u64,
    synced_lines: usize,
}

/// Store backed by a journal file: an optional generation header, then one `[x,y]` JSON array per line.
///
/// Several stores, in this process or in others, may share one journal. Every operation holds an advisory lock on
/// the file and first catches up with lines the others appended. Clearing truncates the file in place under the
/// exclusive lock and writes a new generation, so every other handle drops its index and replays from the start.
#[derive(Debug)]
pub struct FileRevealStore {
    path: PathBuf,
    journal: RwLock<Journal>,
}

impl FileRevealStore {
    /// Opens the journal at `path`, creating it (and its parent directories) when missing.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let mut journal = Journal {
            index: SpatialIndex::new(),
            file,
            generation: 0,
            synced_len: 0,
            synced_lines: 0,
        };
        journal.locked(true, |journal| {
            journal.sync()?;
            journal.truncate_unsynced()
        })?;
        log::debug!("Opened {} with {} tiles", path.display(), journal.index.len());

        Ok(Self {
            path,
            journal: RwLock::new(journal),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn exclusive<T>(&self, f: impl FnOnce(&mut Journal) -> StoreResult<T>) -> StoreResult<T> {
        let mut journal = self.journal.write().map_err(|_| StoreError::Poisoned)?;
        journal.locked(true, f)
    }

    /// Catches up with other writers, then hands out the index for reading.
    fn synced(&self) -> StoreResult<RwLockReadGuard<'_, Journal>> {
        {
            let mut journal = self.journal.write().map_err(|_| StoreError::Poisoned)?;
            journal.locked(false, Journal::sync)?;
        }
        self.journal.read().map_err(|_| StoreError::Poisoned)
    }
}

impl Journal {
    fn locked<T>(&mut self, exclusive: bool, f: impl FnOnce(&mut Self) -> StoreResult<T>) -> StoreResult<T> {
        if exclusive {
            self.file.lock()?;
        } else {
            self.file.lock_shared()?;
        }
        let result = f(self);
        self.file.unlock()?;
        result
    }

    /// Applies whatever complete lines were appended since the last sync, or replays everything after a clear.
    fn sync(&mut self) -> StoreResult<()> {
        let len = self.file.metadata()?.len();
        let generation = read_generation(&self.file)?;
        if generation != self.generation || len < self.synced_len {
            log::debug!("Journal generation {} -> {generation}, replaying", self.generation);
            self.index.clear();
            self.generation = generation;
            self.synced_len = 0;
            self.synced_lines = 0;
        }
        if len == self.synced_len {
            return Ok(());
        }

        let tail = read_from(&self.file, self.synced_len)?;
        let replayed = replay(&tail, self.synced_lines)?;
        for coords in replayed.tiles {
            self.index.insert(coords);
        }
        self.synced_len += replayed.consumed as u64;
        self.synced_lines += replayed.lines;
        Ok(())
    }

    /// Cuts off a torn line left by a crashed or failed append. Needs the exclusive lock.
    fn truncate_unsynced(&mut self) -> StoreResult<()> {
        let len = self.file.metadata()?.len();
        if len > self.synced_len {
            log::warn!("Dropping {} bytes of torn journal entry", len - self.synced_len);
            self.file.set_len(self.synced_len)?;
        }
        Ok(())
    }

    fn append(&mut self, tiles: &[Coord2]) -> StoreResult<usize> {
        self.sync()?;

        let mut fresh = SpatialIndex::new();
        let mut lines = String::new();
        for &coords in tiles {
            if !self.index.contains(coords) && fresh.insert(coords) {
                encode(&mut lines, coords)?;
            }
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        self.truncate_unsynced()?;
        if let Err(err) = self.file.write_all(lines.as_bytes()) {
            // a fragment left here would be glued to the next entry
            if let Err(undo) = self.file.set_len(self.synced_len) {
                log::error!("Could not roll back failed append: {undo}");
            }
            return Err(err.into());
        }
        self.synced_len += lines.len() as u64;
        self.synced_lines += fresh.len();
        for coords in fresh.iter() {
            self.index.insert(coords);
        }
        Ok(fresh.len())
    }

    fn reset(&mut self) -> StoreResult<()> {
        let generation = rand::random();
        let mut header = serde_json::to_string(&Header { generation })?;
        header.push('\n');

        self.file.set_len(0)?;
        self.file.write_all(header.as_bytes())?;
        self.file.sync_all()?;

        self.index.clear();
        self.generation = generation;
        self.synced_len = header.len() as u64;
        self.synced_lines = 1;
        Ok(())
    }
}

/// Complete lines parsed from a stretch of journal text.
#[derive(Debug, Default)]
struct Replay {
    tiles: Vec<Coord2>,
    /// Bytes up to the end of the last complete line.
    consumed: usize,
    lines: usize,
}

/// Parses journal text that starts at line `first_line` of the file. An unterminated last line is left unconsumed,
/// any other line that is neither a tile nor the header on the first line is corrupt.
fn replay(content: &str, first_line: usize) -> StoreResult<Replay> {
    let mut replay = Replay::default();
    for segment in content.split_inclusive('\n') {
        if !segment.ends_with('\n') {
            break;
        }
        let number = first_line + replay.lines;
        let line = segment.trim();
        if !line.is_empty() {
            if let Ok(coords) = serde_json::from_str::<Coord2>(line) {
                replay.tiles.push(coords);
            } else if number != 0 || serde_json::from_str::<Header>(line).is_err() {
                return Err(StoreError::Corrupt { line: number + 1 });
            }
        }
        replay.consumed += segment.len();
        replay.lines += 1;
    }
    Ok(replay)
}

/// Generation in the header, 0 for a journal that was never cleared.
fn read_generation(file: &File) -> StoreResult<u64> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(0))?;
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if !line.ends_with('\n') {
        return Ok(0);
    }
    Ok(serde_json::from_str::<Header>(line.trim()).map_or(0, |header| header.generation))
}

fn read_from(mut file: &File, offset: u64) -> StoreResult<String> {
    file.seek(SeekFrom::Start(offset))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

fn encode(buf: &mut String, coords: Coord2) -> StoreResult<()> {
    buf.push_str(&serde_json::to_string(&coords)?);
    buf.push('\n');
    Ok(())
}

impl RevealStore for FileRevealStore {
    fn put(&self, coords: Coord2) -> StoreResult<bool> {
        self.exclusive(|journal| Ok(journal.append(&[coords])? == 1))
    }

    fn put_many(&self, tiles: &[Coord2]) -> StoreResult<usize> {
        self.exclusive(|journal| journal.append(tiles))
    }

    fn get_all(&self) -> StoreResult<Vec<Coord2>> {
        Ok(self.synced()?.index.iter().collect())
    }

    fn get_range(&self, rect: TileRect) -> StoreResult<Vec<Coord2>> {
        Ok(self.synced()?.index.range(rect).collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.synced()?.index.len())
    }

    fn clear(&self) -> StoreResult<()> {
        self.exclusive(Journal::reset)?;
        log::debug!("Cleared {}", self.path.display());
        Ok(())
    }
}
