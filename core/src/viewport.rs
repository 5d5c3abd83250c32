use hashbrown::HashMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use web_time::{Duration, Instant};

use crate::*;

/// Default edge length of one tile in pixels.
pub const CELL_SIZE: f64 = 16.0;

/// How often [`ViewportWindow::tick`] checks storage for a seed changed by another process.
pub const SEED_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Tiles queried beyond each edge of the screen, so tiles panning into view are already known.
const VIEW_PADDING: f64 = 1.0;

/// Widest window in tiles along either axis, padding included. A larger screen only shows its top left part.
pub const MAX_VIEW_SPAN: usize = 1024;

/// Camera rectangle in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(offset: CameraOffset, width: f64, height: f64) -> Self {
        Self {
            offset_x: offset.x,
            offset_y: offset.y,
            width,
            height,
        }
    }

    /// Whether the screen size is known yet. NaN counts as unknown.
    pub fn has_size(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Tiles covering the visible area plus one tile of padding on every side, at most [`MAX_VIEW_SPAN`] per axis,
    /// or `None` when any input is not a usable number.
    pub fn tile_bounds(&self, cell_size: f64) -> Option<TileRect> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return None;
        }
        let (min_x, max_x) = axis_bounds(self.offset_x, self.width, cell_size)?;
        let (min_y, max_y) = axis_bounds(self.offset_y, self.height, cell_size)?;
        Some(TileRect::new(min_x, max_x, min_y, max_y))
    }

    /// Tile under a point on the screen, `floor((screen + offset) / cell_size)` on each axis.
    pub fn tile_at_screen(&self, screen_x: f64, screen_y: f64, cell_size: f64) -> Option<Coord2> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return None;
        }
        let x = to_coord(((screen_x + self.offset_x) / cell_size).floor())?;
        let y = to_coord(((screen_y + self.offset_y) / cell_size).floor())?;
        Some((x, y))
    }
}

fn axis_bounds(offset: f64, extent: f64, cell_size: f64) -> Option<(Coord, Coord)> {
    if !(extent.is_finite() && extent >= 0.0) {
        return None;
    }
    // a partially visible tile on both ends means up to ceil(extent) + 1 tiles
    let first = (offset / cell_size).floor();
    let visible = ((extent / cell_size).ceil() + 1.0).min(MAX_VIEW_SPAN as f64 - 2.0 * VIEW_PADDING);
    let min = to_coord(first - VIEW_PADDING)?;
    let max = to_coord(first + visible + VIEW_PADDING)?;
    Some((min, max))
}

fn to_coord(value: f64) -> Option<Coord> {
    (value.is_finite() && value >= f64::from(Coord::MIN) && value <= f64::from(Coord::MAX))
        .then_some(value as Coord)
}

/// Rate limit for the cross-process seed check.
#[derive(Copy, Clone, Debug)]
pub struct SeedPoller {
    interval: Duration,
    last_poll: Option<Instant>,
}

impl SeedPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_poll: None,
        }
    }

    /// Whether a poll is due at `now`, recording it if so.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last_poll {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_poll = Some(now);
                true
            }
        }
    }
}

impl Default for SeedPoller {
    fn default() -> Self {
        Self::new(SEED_POLL_INTERVAL)
    }
}

/// Inputs the current tile map was computed from.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Snapshot {
    viewport: Viewport,
    seed: Option<Seed>,
    reveal_count: u64,
}

/// The revealed tiles around the camera, kept current for a renderer.
///
/// The map is recomputed when the camera moves, the seed changes, the reveal counter moves or the screen size first
/// becomes known. A failed store query keeps the previous map and is retried on the next refresh.
#[derive(Debug)]
pub struct ViewportWindow {
    cell_size: f64,
    size: (f64, f64),
    tiles: HashMap<Coord2, MineCount>,
    bounds: Option<TileRect>,
    seen: Option<Snapshot>,
    stale: bool,
    poller: SeedPoller,
}

impl Default for ViewportWindow {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

impl ViewportWindow {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            size: (0.0, 0.0),
            tiles: HashMap::new(),
            bounds: None,
            seen: None,
            stale: false,
            poller: SeedPoller::default(),
        }
    }

    pub fn with_poller(self, poller: SeedPoller) -> Self {
        Self { poller, ..self }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.size = (width, height);
    }

    pub fn viewport<S: RevealStore, C: ConfigStore>(&self, session: &GameSession<S, C>) -> Viewport {
        Viewport::new(session.camera_offset(), self.size.0, self.size.1)
    }

    /// Forces the next refresh to query the store.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Re-queries the store if anything the map depends on changed. Returns whether the map was replaced.
    pub fn refresh<S: RevealStore, C: ConfigStore>(&mut self, session: &GameSession<S, C>) -> bool {
        let viewport = self.viewport(session);
        if !viewport.has_size() {
            return false;
        }

        let snapshot = Snapshot {
            viewport,
            seed: session.seed(),
            reveal_count: session.reveal_count(),
        };
        if !self.stale && self.seen == Some(snapshot) {
            return false;
        }

        let bounds = match viewport.tile_bounds(self.cell_size) {
            Some(bounds) => bounds,
            None => {
                log::warn!("Unusable viewport {viewport:?}, keeping previous bounds");
                self.bounds.unwrap_or(TileRect::new(0, 0, 0, 0))
            }
        };

        match session.store().get_range(bounds) {
            Ok(revealed) => {
                self.tiles = revealed
                    .into_iter()
                    .filter_map(|coords| classify(session, coords))
                    .collect();
                self.bounds = Some(bounds);
                self.seen = Some(snapshot);
                self.stale = false;
                log::trace!("Viewport {bounds:?} holds {} revealed tiles", self.tiles.len());
                true
            }
            Err(err) => {
                log::error!("Could not load revealed tiles in {bounds:?}: {err}");
                self.stale = true;
                false
            }
        }
    }

    /// Periodic driver: checks for a seed changed by another process at most once per poll interval, then refreshes.
    pub fn tick<S: RevealStore, C: ConfigStore>(
        &mut self,
        now: Instant,
        session: &mut GameSession<S, C>,
    ) -> bool {
        if self.poller.due(now) {
            match session.sync_external() {
                Ok(true) => self.invalidate(),
                Ok(false) => {}
                Err(err) => log::error!("Could not check for an external seed change: {err}"),
            }
        }
        self.refresh(session)
    }

    pub fn bounds(&self) -> Option<TileRect> {
        self.bounds
    }

    /// Mine count of a revealed tile, `None` while it is hidden or outside the window.
    pub fn tile(&self, coords: Coord2) -> Option<MineCount> {
        self.tiles.get(&coords).copied()
    }

    pub fn is_revealed(&self, coords: Coord2) -> bool {
        self.tiles.contains_key(&coords)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord2, MineCount)> + '_ {
        self.tiles.iter().map(|(&coords, &count)| (coords, count))
    }

    /// Dense copy of the window indexed `[x - min_x, y - min_y]`, hidden tiles are `None`.
    pub fn grid(&self) -> Array2<Option<MineCount>> {
        let Some(bounds) = self.bounds else {
            return Array2::from_elem((0, 0), None);
        };
        let mut grid = Array2::from_elem((bounds.width(), bounds.height()), None);
        for (&(x, y), &count) in &self.tiles {
            let ix = (i64::from(x) - i64::from(bounds.min_x)) as usize;
            let iy = (i64::from(y) - i64::from(bounds.min_y)) as usize;
            grid[(ix, iy)] = Some(count);
        }
        grid
    }
}

/// Pairs a stored tile with its count. A stored tile the current seed calls a mine means the store and the seed
/// disagree, which happens briefly while another process resets the shared storage.
fn classify<S: RevealStore, C: ConfigStore>(
    session: &GameSession<S, C>,
    coords: Coord2,
) -> Option<(Coord2, MineCount)> {
    match session.mine_count(coords) {
        Some(MINE) => {
            log::error!("Stored tile {coords:?} is a mine under the current seed, skipping");
            None
        }
        Some(count) => Some((coords, count)),
        None => {
            log::warn!("Stored tile {coords:?} without a seed, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_pad_every_edge() {
        let viewport = Viewport::new(CameraOffset::new(0.0, 0.0), 160.0, 32.0);

        let bounds = viewport.tile_bounds(16.0).unwrap();

        assert_eq!(bounds, TileRect::new(-1, 12, -1, 4));
    }

    #[test]
    fn bounds_follow_negative_offsets() {
        let viewport = Viewport::new(CameraOffset::new(-20.0, 8.0), 16.0, 16.0);

        let bounds = viewport.tile_bounds(16.0).unwrap();

        // visible x tiles are -2 and -1, visible y tiles are 0 and 1
        assert_eq!(bounds, TileRect::new(-3, 1, -1, 3));
    }

    #[test]
    fn bounds_reject_bad_numbers() {
        let camera = CameraOffset::new(0.0, 0.0);

        assert_eq!(Viewport::new(camera, f64::INFINITY, 10.0).tile_bounds(16.0), None);
        assert_eq!(Viewport::new(camera, 10.0, f64::NAN).tile_bounds(16.0), None);
        assert_eq!(Viewport::new(CameraOffset::new(1e300, 0.0), 10.0, 10.0).tile_bounds(16.0), None);
        assert_eq!(Viewport::new(camera, 10.0, 10.0).tile_bounds(0.0), None);
        assert_eq!(Viewport::new(camera, -10.0, 10.0).tile_bounds(16.0), None);
    }

    #[test]
    fn huge_screens_are_capped() {
        let viewport = Viewport::new(CameraOffset::new(-80.0, 48.0), 1e9, 1e9);

        let bounds = viewport.tile_bounds(16.0).unwrap();

        assert_eq!(bounds.width(), MAX_VIEW_SPAN);
        assert_eq!(bounds.height(), MAX_VIEW_SPAN);
        assert_eq!((bounds.min_x, bounds.min_y), (-6, 2));
    }

    #[test]
    fn screen_to_tile() {
        let viewport = Viewport::new(CameraOffset::new(-20.0, 40.0), 100.0, 100.0);

        assert_eq!(viewport.tile_at_screen(0.0, 0.0, 16.0), Some((-2, 2)));
        assert_eq!(viewport.tile_at_screen(20.0, 7.9, 16.0), Some((0, 2)));
        assert_eq!(viewport.tile_at_screen(f64::NAN, 0.0, 16.0), None);
    }

    #[test]
    fn poller_waits_for_interval() {
        let mut poller = SeedPoller::new(Duration::from_secs(1));
        let start = Instant::now();

        assert!(poller.due(start));
        assert!(!poller.due(start + Duration::from_millis(500)));
        assert!(poller.due(start + Duration::from_millis(1000)));
        assert!(!poller.due(start + Duration::from_millis(1500)));
    }
}
