// The canvas data model.
//
// `Board` is the authoritative grid of `Tile`s: pure data plus validation,
// no locking or I/O of its own. The server owns the one live board (behind
// the hub's lock) and hands out clones as snapshots; clients hold a clone
// and fold `TilePlaced` broadcasts into it. Every cell always holds a tile —
// at construction the whole grid is the default color with no owner, and a
// cell is only ever replaced wholesale by `set_tile`.

use serde::{Deserialize, Serialize};

/// Number of colors in the palette. Valid color indices are `0..PALETTE_SIZE`.
pub const PALETTE_SIZE: u8 = 16;

/// The color every cell starts as.
pub const DEFAULT_COLOR: ColorIndex = ColorIndex(0);

/// Index into the fixed color palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColorIndex(pub u8);

/// One cell's value: position, owner, color, and when it was placed.
/// Immutable once constructed — a cell changes by being replaced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub row: u16,
    pub col: u16,
    /// Username of whoever placed this tile. Empty for never-placed cells.
    pub owner: String,
    pub color: ColorIndex,
    /// Wall-clock placement time, milliseconds since the Unix epoch.
    /// Stamped by the placing client; zero for never-placed cells.
    pub placed_at_ms: u64,
}

/// A square grid of tiles, row-major. `dim` is fixed for the board's life.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    dim: u16,
    cells: Vec<Tile>,
}

impl Board {
    /// Create a `dim` x `dim` board with every cell at the default color.
    pub fn new(dim: u16) -> Self {
        let mut cells = Vec::with_capacity(usize::from(dim) * usize::from(dim));
        for row in 0..dim {
            for col in 0..dim {
                cells.push(Tile {
                    row,
                    col,
                    owner: String::new(),
                    color: DEFAULT_COLOR,
                    placed_at_ms: 0,
                });
            }
        }
        Self { dim, cells }
    }

    pub fn dim(&self) -> u16 {
        self.dim
    }

    /// The tile at `(row, col)`. Panics if out of bounds.
    pub fn get(&self, row: u16, col: u16) -> &Tile {
        &self.cells[self.index(row, col)]
    }

    /// True iff the tile's position is in bounds and its color is in the
    /// palette. Placement requests failing this are protocol violations.
    pub fn is_valid(&self, tile: &Tile) -> bool {
        tile.row < self.dim && tile.col < self.dim && tile.color.0 < PALETTE_SIZE
    }

    /// Overwrite the addressed cell unconditionally. Callers must have
    /// already checked `is_valid`.
    pub fn set_tile(&mut self, tile: Tile) {
        let i = self.index(tile.row, tile.col);
        self.cells[i] = tile;
    }

    /// An independent copy, handed to newly admitted sessions.
    pub fn snapshot(&self) -> Board {
        self.clone()
    }

    fn index(&self, row: u16, col: u16) -> usize {
        usize::from(row) * usize::from(self.dim) + usize::from(col)
    }
}
