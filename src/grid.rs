use crate::error::GameError;

/// `0` is empty, anything else is a palette index.
pub type Cell = u8;

pub const EMPTY: Cell = 0;

/// Fixed-size playfield of locked cells, stored row-major.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![EMPTY; width * height],
        }
    }

    /// Builds a grid from top-to-bottom rows. Every row must have the width of the first.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Self, GameError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 || height == 0 {
            return Err(GameError::InvalidDimensions { width, height });
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(GameError::RaggedGrid {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
            cells.extend(values);
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        if row < self.height && col < self.width {
            Some(self.cells[row * self.width + col])
        } else {
            None
        }
    }

    /// Writes a cell; out-of-range coordinates are ignored and reported as `false`.
    pub fn set(&mut self, row: usize, col: usize, value: Cell) -> bool {
        if row < self.height && col < self.width {
            self.cells[row * self.width + col] = value;
            true
        } else {
            false
        }
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        (row < self.height).then(|| &self.cells[self.span(row)])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> + '_ {
        self.cells.chunks(self.width.max(1))
    }

    /// True iff `(x, y)` lies inside the grid and holds no locked cell.
    pub fn is_free(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        self.get(y as usize, x as usize) == Some(EMPTY)
    }

    pub fn is_row_full(&self, row: usize) -> bool {
        self.row(row)
            .is_some_and(|cells| cells.iter().all(|&c| c != EMPTY))
    }

    pub fn is_row_empty(&self, row: usize) -> bool {
        self.row(row)
            .is_some_and(|cells| cells.iter().all(|&c| c == EMPTY))
    }

    /// Blanks every full row without moving anything. Returns the number of rows blanked.
    pub fn clear_full_rows(&mut self) -> usize {
        let mut cleared = 0;
        for row in 0..self.height {
            if self.is_row_full(row) {
                let span = self.span(row);
                self.cells[span].fill(EMPTY);
                cleared += 1;
            }
        }
        cleared
    }

    /// Lets every non-empty row fall into the empty rows beneath it.
    ///
    /// Rows are visited from the second-to-last upward; each one keeps sinking
    /// while the row below it is empty. Relative order of non-empty rows is
    /// preserved, and running it twice changes nothing.
    pub fn compact_down(&mut self) {
        if self.height < 2 {
            return;
        }
        for row in (0..self.height - 1).rev() {
            if self.is_row_empty(row) {
                continue;
            }
            let mut current = row;
            while current + 1 < self.height && self.is_row_empty(current + 1) {
                let span = self.span(current);
                self.cells.copy_within(span.clone(), span.end);
                self.cells[span].fill(EMPTY);
                current += 1;
            }
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(EMPTY);
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != EMPTY).count()
    }

    fn span(&self, row: usize) -> std::ops::Range<usize> {
        row * self.width..(row + 1) * self.width
    }
}
