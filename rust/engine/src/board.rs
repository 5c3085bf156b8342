use crate::errors::GameError;
use crate::mark::Mark;
use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const CELL_COUNT: usize = 9;

/// A 3x3 board stored row-major; index 0 is the top-left cell.
/// Serializes as a 9-element array of `null`, `"X"` or `"O"`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [Option<Mark>; CELL_COUNT],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from explicit cell contents.
    pub fn from_cells(cells: [Option<Mark>; CELL_COUNT]) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Option<Mark>; CELL_COUNT] {
        &self.cells
    }

    /// Mark at `index`, `None` when the cell is empty or the index is off the board.
    pub fn cell(&self, index: usize) -> Option<Mark> {
        self.cells.get(index).copied().flatten()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn empty_cells(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_none()).count()
    }

    /// Sets an empty cell. Occupied cells are never overwritten.
    pub fn place(&mut self, index: usize, mark: Mark) -> Result<(), GameError> {
        let slot = self
            .cells
            .get_mut(index)
            .ok_or(GameError::CellOutOfRange {
                index: index as i64,
            })?;
        if slot.is_some() {
            return Err(GameError::CellOccupied { index });
        }
        *slot = Some(mark);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.cells = [None; CELL_COUNT];
    }
}
