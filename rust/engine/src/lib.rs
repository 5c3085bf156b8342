//! # tictac-engine: Tic-tac-toe Rules Core
//!
//! Pure game logic for a two-player 3x3 board: cell placement, terminal state
//! evaluation, score keeping and a seedable role draw. Nothing in this crate
//! owns shared state or performs I/O; the room server drives it.
//!
//! ## Core Modules
//!
//! - [`mark`] - Player symbols (X, O) and round winners (X, O, DRAW)
//! - [`board`] - The 9-cell board and cell placement
//! - [`rules`] - Move validation and outcome evaluation over the 8 lines
//! - [`score`] - Per-mark round counter
//! - [`draw`] - Random seating of two participants with ChaCha20 RNG
//! - [`errors`] - Error types for illegal moves
//!
//! ## Quick Start
//!
//! ```rust
//! use tictac_engine::board::Board;
//! use tictac_engine::mark::{Mark, Winner};
//! use tictac_engine::rules::{evaluate, validate_move};
//!
//! let mut board = Board::new();
//! for (index, mark) in [(0, Mark::X), (3, Mark::O), (1, Mark::X), (4, Mark::O), (2, Mark::X)] {
//!     let cell = validate_move(&board, index).expect("legal move");
//!     board.place(cell, mark).expect("empty cell");
//! }
//!
//! assert_eq!(evaluate(&board).winner(), Some(Winner::X));
//! ```
//!
//! ## Deterministic Seating
//!
//! ```rust
//! use tictac_engine::draw::RoleDraw;
//!
//! let a = RoleDraw::new_with_seed(42).deal(["alice", "bob"]);
//! let b = RoleDraw::new_with_seed(42).deal(["alice", "bob"]);
//! assert_eq!(a, b);
//! ```

pub mod board;
pub mod draw;
pub mod errors;
pub mod mark;
pub mod rules;
pub mod score;
