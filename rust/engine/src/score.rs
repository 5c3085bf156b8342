use crate::mark::{Mark, Winner};
use serde::{Deserialize, Serialize};

/// Rounds won per mark. Draws are not counted.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Scoreboard {
    #[serde(rename = "X")]
    x: u32,
    #[serde(rename = "O")]
    o: u32,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wins(&self, mark: Mark) -> u32 {
        match mark {
            Mark::X => self.x,
            Mark::O => self.o,
        }
    }

    /// Credits a decided round; a draw leaves the board untouched.
    pub fn record(&mut self, winner: Winner) {
        match winner.mark() {
            Some(Mark::X) => self.x = self.x.saturating_add(1),
            Some(Mark::O) => self.o = self.o.saturating_add(1),
            None => {}
        }
    }
}
