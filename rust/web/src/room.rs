use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tictac_engine::board::Board;
use tictac_engine::draw::{RoleDraw, Seating};
use tictac_engine::errors::GameError;
use tictac_engine::mark::{Mark, Winner};
use tictac_engine::rules::{evaluate, validate_move, Outcome};
use tictac_engine::score::Scoreboard;
use uuid::Uuid;

pub type RoomCode = String;
pub type ConnectionId = Uuid;

/// Seats per room.
pub const MAX_PARTICIPANTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Waiting,
    InProgress,
    Finished,
}

/// In-memory state of one room. Every mutation goes through
/// [`join`](Room::join), [`leave`](Room::leave), [`make_move`](Room::make_move)
/// or [`reset`](Room::reset); a rejected transition leaves the room untouched.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    participants: Vec<Participant>,
    seating: Option<Seating<ConnectionId>>,
    board: Board,
    turn: Option<Mark>,
    winner: Option<Winner>,
    started: bool,
    finished_at: Option<DateTime<Utc>>,
    scores: Scoreboard,
    winning_cells: Vec<usize>,
}

impl Room {
    pub fn new(code: impl Into<RoomCode>) -> Self {
        Self {
            code: code.into(),
            participants: Vec::with_capacity(MAX_PARTICIPANTS),
            seating: None,
            board: Board::new(),
            turn: None,
            winner: None,
            started: false,
            finished_at: None,
            scores: Scoreboard::new(),
            winning_cells: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= MAX_PARTICIPANTS
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.participants
            .iter()
            .any(|p| p.connection_id == connection_id)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Option<Mark> {
        self.turn
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn scores(&self) -> Scoreboard {
        self.scores
    }

    pub fn role_of(&self, connection_id: ConnectionId) -> Option<Mark> {
        self.seating
            .as_ref()
            .and_then(|seating| seating.mark_of(&connection_id))
    }

    pub fn phase(&self) -> RoomPhase {
        if self.winner.is_some() {
            RoomPhase::Finished
        } else if self.started {
            RoomPhase::InProgress
        } else {
            RoomPhase::Waiting
        }
    }

    /// Admits a participant. The second arrival deals roles and starts the round.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        username: impl Into<String>,
        draw: &mut RoleDraw,
    ) -> Result<(), RoomError> {
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }
        if self.contains(connection_id) {
            return Err(RoomError::AlreadyJoined);
        }

        self.participants.push(Participant {
            connection_id,
            username: username.into(),
        });

        if self.participants.len() == MAX_PARTICIPANTS {
            self.deal(draw);
            self.started = true;
        }
        Ok(())
    }

    /// Removes a participant. Any departure stops the round and clears roles;
    /// board, winner and scores are kept for whoever joins next.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Result<Participant, RoomError> {
        let position = self
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)
            .ok_or(RoomError::UnknownParticipant)?;
        let participant = self.participants.remove(position);

        self.seating = None;
        self.started = false;
        self.turn = None;
        Ok(participant)
    }

    /// Applies a move for the participant holding the current turn.
    pub fn make_move(
        &mut self,
        connection_id: ConnectionId,
        index: i64,
        now: DateTime<Utc>,
    ) -> Result<MoveResult, RoomError> {
        if !(0..=8).contains(&index) {
            return Err(GameError::CellOutOfRange { index }.into());
        }
        if !self.started {
            return Err(RoomError::NotStarted);
        }
        if self.winner.is_some() {
            return Err(RoomError::AlreadyFinished);
        }
        let cell = validate_move(&self.board, index)?;

        let mark = self
            .role_of(connection_id)
            .ok_or(RoomError::NotYourTurn)?;
        if Some(mark) != self.turn {
            return Err(RoomError::NotYourTurn);
        }

        self.board.place(cell, mark)?;
        self.turn = Some(mark.opponent());

        let outcome = evaluate(&self.board);
        if let Some(winner) = outcome.winner() {
            self.winner = Some(winner);
            self.finished_at = Some(now);
            self.scores.record(winner);
        }

        Ok(MoveResult {
            cell,
            mark,
            outcome,
        })
    }

    /// Starts a new round after a decided one. Roles are dealt again when both
    /// seats are filled.
    pub fn reset(&mut self, draw: &mut RoleDraw) -> Result<(), RoomError> {
        if self.winner.is_none() {
            return Err(RoomError::NotFinished);
        }

        self.board.clear();
        self.winner = None;
        self.finished_at = None;
        self.winning_cells.clear();

        if self.participants.len() == MAX_PARTICIPANTS {
            self.deal(draw);
            self.started = true;
        } else {
            self.seating = None;
            self.started = false;
            self.turn = None;
        }
        Ok(())
    }

    /// True once a decided round has been idle for longer than `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let (Some(_), Some(finished_at)) = (self.winner, self.finished_at) else {
            return false;
        };
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(finished_at) > ttl
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let players = self
            .seating
            .as_ref()
            .map(|seating| {
                Mark::ALL
                    .into_iter()
                    .filter_map(|mark| {
                        let holder = seating.holder(mark);
                        self.participants
                            .iter()
                            .find(|p| p.connection_id == *holder)
                            .map(|p| (mark, p.username.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        RoomSnapshot {
            room_code: self.code.clone(),
            board: self.board,
            turn: self.turn,
            winner: self.winner,
            started: self.started,
            finished_at: self.finished_at,
            scores: self.scores,
            players,
            winning_cells: self.winning_cells.clone(),
        }
    }

    fn deal(&mut self, draw: &mut RoleDraw) {
        let pair = [
            self.participants[0].connection_id,
            self.participants[1].connection_id,
        ];
        let seating = draw.deal(pair);
        self.turn = Some(seating.first_turn);
        self.seating = Some(seating);
    }

    #[cfg(test)]
    pub(crate) fn force_finished_at(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveResult {
    pub cell: usize,
    pub mark: Mark,
    pub outcome: Outcome,
}

/// Serializable projection of a room sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub board: Board,
    pub turn: Option<Mark>,
    pub winner: Option<Winner>,
    pub started: bool,
    pub finished_at: Option<DateTime<Utc>>,
    pub scores: Scoreboard,
    pub players: BTreeMap<Mark, String>,
    pub winning_cells: Vec<usize>,
}

/// Reasons a transition was refused. None of these reach the client; the
/// session layer drops them after logging.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,
    #[error("Connection already joined this room")]
    AlreadyJoined,
    #[error("Connection is not a participant of this room")]
    UnknownParticipant,
    #[error("Round has not started")]
    NotStarted,
    #[error("Round is already decided")]
    AlreadyFinished,
    #[error("Round is still in progress")]
    NotFinished,
    #[error("Not this participant's turn")]
    NotYourTurn,
    #[error(transparent)]
    IllegalMove(#[from] GameError),
}
