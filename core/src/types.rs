use serde::{Deserialize, Serialize};

/// Single coordinate axis of the unbounded field.
pub type Coord = i32;

/// Two-dimensional tile coordinates `(x, y)`.
pub type Coord2 = (Coord, Coord);

/// Parameter that makes mine placement reproducible for one game.
pub type Seed = u64;

/// Number of mined neighbors (`0..=8`), or [`MINE`] when the tile itself is mined.
pub type MineCount = u8;

/// Sentinel [`MineCount`] for a tile that is itself a mine.
pub const MINE: MineCount = 9;

const DISPLACEMENTS: [(Coord, Coord); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Applies `delta` to `coords`, returning a value only when it stays inside the coordinate range.
fn apply_delta(coords: Coord2, delta: Coord2) -> Option<Coord2> {
    let (x, y) = coords;
    let (dx, dy) = delta;
    Some((x.checked_add(dx)?, y.checked_add(dy)?))
}

/// Iterates the 8 surrounding tiles. The field has no edges, only the ends of the `Coord` range, where
/// neighbors that would overflow are skipped instead of wrapping around.
#[derive(Debug, Clone)]
pub struct NeighborIter {
    center: Coord2,
    index: u8,
}

impl NeighborIter {
    pub fn new(center: Coord2) -> Self {
        Self { center, index: 0 }
    }
}

impl Iterator for NeighborIter {
    type Item = Coord2;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if usize::from(self.index) >= DISPLACEMENTS.len() {
                return None;
            }

            let next_item = apply_delta(self.center, DISPLACEMENTS[self.index as usize]);
            self.index += 1;

            if next_item.is_some() {
                return next_item;
            }
        }
    }
}

pub fn neighbors(center: Coord2) -> NeighborIter {
    NeighborIter::new(center)
}

/// Axis-aligned tile rectangle, half-open on both axes: `min_x <= x < max_x` and `min_y <= y < max_y`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub min_x: Coord,
    pub max_x: Coord,
    pub min_y: Coord,
    pub max_y: Coord,
}

impl TileRect {
    pub const fn new(min_x: Coord, max_x: Coord, min_y: Coord, max_y: Coord) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    pub const fn contains(&self, (x, y): Coord2) -> bool {
        self.min_x <= x && x < self.max_x && self.min_y <= y && y < self.max_y
    }

    pub fn width(&self) -> usize {
        usize::try_from(i64::from(self.max_x) - i64::from(self.min_x)).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        usize::try_from(i64::from(self.max_y) - i64::from(self.min_y)).unwrap_or(0)
    }

    /// Row-major iteration over every tile inside the rectangle.
    pub fn iter(&self) -> impl Iterator<Item = Coord2> + use<> {
        let Self {
            min_x,
            max_x,
            min_y,
            max_y,
        } = *self;
        (min_y..max_y).flat_map(move |y| (min_x..max_x).map(move |x| (x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_cover_the_surrounding_ring() {
        let found: Vec<_> = neighbors((0, 0)).collect();

        assert_eq!(found.len(), 8);
        assert!(!found.contains(&(0, 0)));
        assert!(found.contains(&(-1, -1)));
        assert!(found.contains(&(1, 1)));
    }

    #[test]
    fn neighbors_skip_overflowing_coordinates() {
        let found: Vec<_> = neighbors((Coord::MAX, Coord::MIN)).collect();

        assert_eq!(found.len(), 3);
        assert!(found.contains(&(Coord::MAX - 1, Coord::MIN)));
        assert!(found.contains(&(Coord::MAX, Coord::MIN + 1)));
        assert!(found.contains(&(Coord::MAX - 1, Coord::MIN + 1)));
    }

    #[test]
    fn rect_is_half_open() {
        let rect = TileRect::new(-2, 3, 0, 2);

        assert!(rect.contains((-2, 0)));
        assert!(rect.contains((2, 1)));
        assert!(!rect.contains((3, 1)));
        assert!(!rect.contains((0, 2)));
        assert_eq!(rect.width(), 5);
        assert_eq!(rect.height(), 2);
        assert_eq!(rect.iter().count(), 10);
    }

    #[test]
    fn inverted_rect_is_empty() {
        let rect = TileRect::new(4, 1, 0, 5);

        assert!(rect.is_empty());
        assert_eq!(rect.width(), 0);
        assert_eq!(rect.iter().count(), 0);
    }
}
