use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::mark::Mark;

/// Marks dealt to the two participants of a round, plus who moves first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seating<T> {
    pub x: T,
    pub o: T,
    pub first_turn: Mark,
}

impl<T: PartialEq> Seating<T> {
    /// Mark held by `participant`, if seated.
    pub fn mark_of(&self, participant: &T) -> Option<Mark> {
        if self.x == *participant {
            Some(Mark::X)
        } else if self.o == *participant {
            Some(Mark::O)
        } else {
            None
        }
    }

    pub fn holder(&self, mark: Mark) -> &T {
        match mark {
            Mark::X => &self.x,
            Mark::O => &self.o,
        }
    }
}

/// Random role assignment: both participants are shuffled uniformly over
/// {X, O} and the opening mark is an independent coin flip.
#[derive(Debug)]
pub struct RoleDraw {
    rng: ChaCha20Rng,
}

impl RoleDraw {
    /// Deterministic draw, identical seeds deal identical seatings.
    pub fn new_with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha20Rng::from_os_rng(),
        }
    }

    pub fn deal<T>(&mut self, pair: [T; 2]) -> Seating<T> {
        let mut pair = pair;
        pair.shuffle(&mut self.rng);
        let first_turn = if self.rng.random_bool(0.5) {
            Mark::X
        } else {
            Mark::O
        };
        let [x, o] = pair;
        Seating { x, o, first_turn }
    }
}

impl Default for RoleDraw {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_seats_both_participants() {
        let mut draw = RoleDraw::new_with_seed(7);
        let seating = draw.deal(["alice", "bob"]);
        assert_ne!(seating.x, seating.o);
        assert!(["alice", "bob"].contains(&seating.x));
        assert!(["alice", "bob"].contains(&seating.o));
        assert_eq!(seating.mark_of(&seating.x), Some(Mark::X));
        assert_eq!(seating.mark_of(&"carol"), None);
        assert_eq!(*seating.holder(Mark::O), seating.o);
    }
}
