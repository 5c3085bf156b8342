use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Cell index {index} is outside the board (expected 0..=8)")]
    CellOutOfRange { index: i64 },
    #[error("Cell {index} is already occupied")]
    CellOccupied { index: usize },
}
