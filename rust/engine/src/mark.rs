use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two symbols a participant plays with.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Mark {
    /// Cross
    X,
    /// Nought
    O,
}

impl Mark {
    /// Both marks in seating order.
    pub const ALL: [Mark; 2] = [Mark::X, Mark::O];

    /// The mark that moves after this one.
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => f.write_str("X"),
            Mark::O => f.write_str("O"),
        }
    }
}

/// Terminal result of a round as exposed to clients.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Winner {
    X,
    O,
    #[serde(rename = "DRAW")]
    Draw,
}

impl Winner {
    /// The winning mark, or `None` for a draw.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Winner::X => Some(Mark::X),
            Winner::O => Some(Mark::O),
            Winner::Draw => None,
        }
    }
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::X => f.write_str("X"),
            Winner::O => f.write_str("O"),
            Winner::Draw => f.write_str("DRAW"),
        }
    }
}
