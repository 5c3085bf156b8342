use crate::board::{Board, CELL_COUNT};
use crate::errors::GameError;
use crate::mark::{Mark, Winner};

/// The eight lines that decide a round: rows, columns, diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No line is complete and at least one cell is empty.
    InProgress,
    /// A line of three identical marks exists.
    Won(Mark),
    /// Every cell is filled without a winning line.
    Draw,
}

impl Outcome {
    pub fn winner(self) -> Option<Winner> {
        match self {
            Outcome::InProgress => None,
            Outcome::Won(mark) => Some(Winner::from(mark)),
            Outcome::Draw => Some(Winner::Draw),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

/// Evaluates a board for a terminal state.
///
/// Lines are checked in [`WINNING_LINES`] order and the first complete line
/// decides the result. A full board with no complete line is a draw. The
/// function is pure and total: every 9-cell board yields an [`Outcome`].
///
/// # Examples
///
/// ```
/// use tictac_engine::board::Board;
/// use tictac_engine::mark::Mark;
/// use tictac_engine::rules::{evaluate, Outcome};
///
/// let x = Some(Mark::X);
/// let board = Board::from_cells([x, x, x, None, None, None, None, None, None]);
/// assert_eq!(evaluate(&board), Outcome::Won(Mark::X));
/// assert_eq!(evaluate(&Board::new()), Outcome::InProgress);
/// ```
pub fn evaluate(board: &Board) -> Outcome {
    let cells = board.cells();
    for [a, b, c] in WINNING_LINES {
        if let Some(mark) = cells[a] {
            if cells[b] == Some(mark) && cells[c] == Some(mark) {
                return Outcome::Won(mark);
            }
        }
    }

    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::InProgress
    }
}

/// Checks that `index` addresses an empty cell and returns it as a board index.
///
/// # Errors
///
/// - [`GameError::CellOutOfRange`] when `index` is outside `0..=8`
/// - [`GameError::CellOccupied`] when the cell already holds a mark
///
/// ```
/// use tictac_engine::board::Board;
/// use tictac_engine::errors::GameError;
/// use tictac_engine::rules::validate_move;
///
/// let board = Board::new();
/// assert_eq!(validate_move(&board, 4), Ok(4));
/// assert_eq!(
///     validate_move(&board, -1),
///     Err(GameError::CellOutOfRange { index: -1 })
/// );
/// ```
pub fn validate_move(board: &Board, index: i64) -> Result<usize, GameError> {
    let cell = usize::try_from(index)
        .ok()
        .filter(|cell| *cell < CELL_COUNT)
        .ok_or(GameError::CellOutOfRange { index })?;

    if board.cell(cell).is_some() {
        return Err(GameError::CellOccupied { index: cell });
    }
    Ok(cell)
}
