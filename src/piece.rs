use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::GameError;
use crate::grid::{Cell, EMPTY};

pub const SHAPE_SIZE: usize = 4;

// ============================================================================
// Types
// ============================================================================

/// Top-left anchor of a shape's 4x4 box in grid coordinates.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// A piece pattern embedded in a 4x4 box. Nonzero cells are filled with that color id.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Shape {
    cells: [[Cell; SHAPE_SIZE]; SHAPE_SIZE],
}

impl Shape {
    pub fn new(cells: [[Cell; SHAPE_SIZE]; SHAPE_SIZE]) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[[Cell; SHAPE_SIZE]; SHAPE_SIZE] {
        &self.cells
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row)?.get(col).copied()
    }

    /// Occupied cells as `(col, row, value)` offsets within the box.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, line)| {
            line.iter()
                .enumerate()
                .filter(|&(_, &value)| value != EMPTY)
                .map(move |(col, &value)| (col, row, value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.occupied().next().is_none()
    }

    /// Clockwise quarter turn of the whole 4x4 box.
    pub fn rotated(&self) -> Self {
        let mut rotated = [[EMPTY; SHAPE_SIZE]; SHAPE_SIZE];
        for (row, line) in self.cells.iter().enumerate() {
            for (col, &value) in line.iter().enumerate() {
                rotated[col][SHAPE_SIZE - 1 - row] = value;
            }
        }
        Self { cells: rotated }
    }

    /// Maps every occupied cell through `f`, leaving empty cells alone.
    pub fn map_colors(&self, mut f: impl FnMut(Cell) -> Cell) -> Self {
        let mut cells = self.cells;
        for value in cells.iter_mut().flatten() {
            if *value != EMPTY {
                *value = f(*value);
            }
        }
        Self { cells }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TetrominoKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl TetrominoKind {
    pub const ALL: [TetrominoKind; 7] = [
        TetrominoKind::I,
        TetrominoKind::O,
        TetrominoKind::T,
        TetrominoKind::S,
        TetrominoKind::Z,
        TetrominoKind::J,
        TetrominoKind::L,
    ];

    fn pattern(self) -> [[u8; SHAPE_SIZE]; SHAPE_SIZE] {
        match self {
            TetrominoKind::I => [[0, 0, 0, 0], [1, 1, 1, 1], [0, 0, 0, 0], [0, 0, 0, 0]],
            TetrominoKind::O => [[0, 1, 1, 0], [0, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
            TetrominoKind::T => [[0, 1, 0, 0], [1, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
            TetrominoKind::S => [[0, 1, 1, 0], [1, 1, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
            TetrominoKind::Z => [[1, 1, 0, 0], [0, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
            TetrominoKind::J => [[1, 0, 0, 0], [1, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
            TetrominoKind::L => [[0, 0, 1, 0], [1, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
        }
    }

    pub fn shape(self, color: Cell) -> Shape {
        Shape::new(self.pattern()).map_colors(|_| color)
    }

    /// Default color for this kind within a palette of `max_colors` entries.
    pub fn color(self, max_colors: u8) -> Cell {
        let index = Self::ALL.iter().position(|&k| k == self).unwrap_or(0) as u8;
        index % max_colors.saturating_sub(1).max(1) + 1
    }
}

// ============================================================================
// Piece Source Trait
// ============================================================================

/// Supplies the next piece. `max_colors` is the palette size of the game asking.
pub trait PieceSource {
    fn next_shape(&mut self, max_colors: u8) -> Shape;
}

/// Uniformly random tetrominoes in random palette colors.
pub struct RandomPieceSource {
    rng: StdRng,
}

impl RandomPieceSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPieceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceSource for RandomPieceSource {
    fn next_shape(&mut self, max_colors: u8) -> Shape {
        let kind = TetrominoKind::ALL[self.rng.gen_range(0..TetrominoKind::ALL.len())];
        let color = self.rng.gen_range(1..max_colors.max(2));
        kind.shape(color)
    }
}

/// Cycles through a fixed list of shapes. Used for tests and replays.
pub struct SequencePieceSource {
    shapes: Vec<Shape>,
    index: usize,
}

impl SequencePieceSource {
    pub fn new(shapes: Vec<Shape>) -> Result<Self, GameError> {
        if shapes.is_empty() {
            return Err(GameError::EmptyPieceSequence);
        }
        Ok(Self { shapes, index: 0 })
    }

    /// Each kind is colored with [`TetrominoKind::color`].
    pub fn from_kinds(kinds: &[TetrominoKind], max_colors: u8) -> Result<Self, GameError> {
        Self::new(
            kinds
                .iter()
                .map(|kind| kind.shape(kind.color(max_colors)))
                .collect(),
        )
    }
}

impl PieceSource for SequencePieceSource {
    fn next_shape(&mut self, _max_colors: u8) -> Shape {
        let shape = self.shapes[self.index % self.shapes.len()];
        self.index += 1;
        shape
    }
}
