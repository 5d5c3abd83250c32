use infisweep_core::{MINE, MineCount};
use ndarray::{Array2, Axis};

const HIDDEN: char = '#';
const OPENING: char = '.';

fn tile_char(tile: Option<MineCount>) -> char {
    match tile {
        None => HIDDEN,
        Some(0) => OPENING,
        Some(MINE) => '*',
        Some(count) => char::from(b'0' + count),
    }
}

/// Text picture of a grid indexed `[x, y]`, one line per row from the top.
pub fn render(grid: &Array2<Option<MineCount>>) -> String {
    let mut out = String::with_capacity((grid.len_of(Axis(0)) + 1) * grid.len_of(Axis(1)));
    for row in grid.axis_iter(Axis(1)) {
        out.extend(row.iter().map(|&tile| tile_char(tile)));
        out.push('\n');
    }
    out
}
