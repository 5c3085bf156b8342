//! Room records that outlive a single connection.
//!
//! The create/join API is the only writer of [`RoomDirectory::create_room`]
//! and [`RoomDirectory::set_opponent`]; the game server only reads records and
//! deletes them once a room empties or a round is decided.

use crate::room::RoomCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_code: RoomCode,
    pub creator: String,
    pub opponent: Option<String>,
}

pub trait RoomDirectory: Send + Sync + std::fmt::Debug {
    fn find_room(&self, room_code: &str) -> Result<Option<RoomRecord>, DirectoryError>;

    /// Registers a room, keeping the existing record if the code is taken.
    fn create_room(&self, room_code: &str, creator: &str) -> Result<RoomRecord, DirectoryError>;

    fn set_opponent(&self, room_code: &str, opponent: &str) -> Result<RoomRecord, DirectoryError>;

    /// Removes a record. Returns whether one existed.
    fn delete_room(&self, room_code: &str) -> Result<bool, DirectoryError>;
}

/// Process-local directory used by the server binary and in tests.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    rooms: RwLock<HashMap<RoomCode, RoomRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RoomDirectory for InMemoryDirectory {
    fn find_room(&self, room_code: &str) -> Result<Option<RoomRecord>, DirectoryError> {
        let rooms = self
            .rooms
            .read()
            .map_err(|_| DirectoryError::StoragePoisoned)?;
        Ok(rooms.get(room_code).cloned())
    }

    fn create_room(&self, room_code: &str, creator: &str) -> Result<RoomRecord, DirectoryError> {
        let room_code = require("room_code", room_code)?;
        let creator = require("username", creator)?;

        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| DirectoryError::StoragePoisoned)?;
        let record = rooms
            .entry(room_code.to_string())
            .or_insert_with(|| RoomRecord {
                room_code: room_code.to_string(),
                creator: creator.to_string(),
                opponent: None,
            });
        Ok(record.clone())
    }

    fn set_opponent(&self, room_code: &str, opponent: &str) -> Result<RoomRecord, DirectoryError> {
        let opponent = require("username", opponent)?;

        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| DirectoryError::StoragePoisoned)?;
        let record = rooms
            .get_mut(room_code)
            .ok_or_else(|| DirectoryError::NotFound(room_code.to_string()))?;
        record.opponent = Some(opponent.to_string());
        Ok(record.clone())
    }

    fn delete_room(&self, room_code: &str) -> Result<bool, DirectoryError> {
        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| DirectoryError::StoragePoisoned)?;
        Ok(rooms.remove(room_code).is_some())
    }
}

fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, DirectoryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DirectoryError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Room not found: {0}")]
    NotFound(RoomCode),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Room directory storage poisoned")]
    StoragePoisoned,
}

impl crate::errors::IntoErrorResponse for DirectoryError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
            DirectoryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DirectoryError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::NotFound(_) => "room_not_found",
            DirectoryError::InvalidInput(_) => "invalid_input",
            DirectoryError::StoragePoisoned => "directory_storage_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            DirectoryError::NotFound(code) => Some(serde_json::json!({ "room_code": code })),
            _ => None,
        }
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        use crate::errors::ErrorSeverity;
        match self {
            DirectoryError::StoragePoisoned => ErrorSeverity::Critical,
            _ => ErrorSeverity::Client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_get_or_create() {
        let directory = InMemoryDirectory::new();
        let first = directory.create_room("ABC1", "alice").expect("create");
        let again = directory.create_room("ABC1", "mallory").expect("create");
        assert_eq!(first, again);
        assert_eq!(again.creator, "alice");
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn set_opponent_requires_existing_room() {
        let directory = InMemoryDirectory::new();
        assert!(matches!(
            directory.set_opponent("nope", "bob"),
            Err(DirectoryError::NotFound(_))
        ));

        directory.create_room("ABC1", "alice").expect("create");
        let record = directory.set_opponent("ABC1", "bob").expect("join");
        assert_eq!(record.opponent.as_deref(), Some("bob"));
    }

    #[test]
    fn blank_names_are_rejected() {
        let directory = InMemoryDirectory::new();
        assert!(matches!(
            directory.create_room("ABC1", "   "),
            Err(DirectoryError::InvalidInput(_))
        ));
        assert!(matches!(
            directory.create_room("", "alice"),
            Err(DirectoryError::InvalidInput(_))
        ));
        assert!(directory.is_empty());
    }

    #[test]
    fn delete_reports_presence() {
        let directory = InMemoryDirectory::new();
        directory.create_room("ABC1", "alice").expect("create");
        assert!(directory.delete_room("ABC1").expect("delete"));
        assert!(!directory.delete_room("ABC1").expect("delete"));
        assert_eq!(directory.find_room("ABC1").expect("find"), None);
    }
}
