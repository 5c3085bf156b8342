use crate::directory::{DirectoryError, RoomDirectory};
use crate::events::{EventBus, EventSubscription};
use crate::protocol::{group_name, ServerMessage};
use crate::room::{ConnectionId, MoveResult, Room, RoomCode, RoomError, RoomSnapshot};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tictac_engine::draw::RoleDraw;
use uuid::Uuid;

/// Grace period after a decided round before an idle room is reclaimed.
pub const DEFAULT_ROOM_TTL: Duration = Duration::from_secs(60);

/// Live rooms keyed by room code.
///
/// Each operation runs under the entry lock of its room code, so transitions
/// and broadcasts on one room are serialized while other rooms proceed
/// independently.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: DashMap<RoomCode, Room>,
    directory: Arc<dyn RoomDirectory>,
    event_bus: Arc<EventBus>,
    draw: Mutex<RoleDraw>,
    room_ttl: Duration,
}

/// A participant admitted to a room, with the queue its socket drains.
#[derive(Debug)]
pub struct Admission {
    pub room_code: RoomCode,
    pub connection_id: ConnectionId,
    pub username: String,
    pub subscription: EventSubscription,
}

impl RoomRegistry {
    pub fn new(directory: Arc<dyn RoomDirectory>, event_bus: Arc<EventBus>) -> Self {
        Self::with_draw(directory, event_bus, RoleDraw::from_entropy(), DEFAULT_ROOM_TTL)
    }

    pub fn with_draw(
        directory: Arc<dyn RoomDirectory>,
        event_bus: Arc<EventBus>,
        draw: RoleDraw,
        room_ttl: Duration,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            directory,
            event_bus,
            draw: Mutex::new(draw),
            room_ttl,
        }
    }

    pub fn directory(&self) -> Arc<dyn RoomDirectory> {
        Arc::clone(&self.directory)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn room_ttl(&self) -> Duration {
        self.room_ttl
    }

    /// Whether the durable directory knows `room_code`.
    pub fn validate_room(&self, room_code: &str) -> Result<bool, RegistryError> {
        Ok(self.directory.find_room(room_code)?.is_some())
    }

    /// Admits `username` into `room_code`, creating the live room on first
    /// arrival. The newcomer receives `init`, then the whole room a snapshot.
    pub fn join(&self, room_code: &str, username: &str) -> Result<Admission, JoinError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(JoinError::MissingUsername);
        }
        if !self.validate_room(room_code)? {
            return Err(JoinError::RoomNotFound(room_code.to_string()));
        }

        let connection_id = Uuid::new_v4();

        let mut room = self
            .rooms
            .entry(room_code.to_string())
            .or_insert_with(|| {
                tracing::debug!(room_code = %room_code, "creating live room");
                Room::new(room_code)
            });

        {
            let mut draw = self
                .draw
                .lock()
                .map_err(|_| RegistryError::StoragePoisoned)?;
            room.join(connection_id, username, &mut draw)
                .map_err(|err| match err {
                    RoomError::RoomFull => JoinError::RoomFull(room_code.to_string()),
                    other => other.into(),
                })?;
        }

        let subscription = self.event_bus.subscribe(room_code, connection_id);
        self.event_bus.send_to(
            room_code,
            connection_id,
            ServerMessage::Init {
                username: username.to_string(),
            },
        );

        tracing::info!(
            room_code = %room_code,
            connection_id = %connection_id,
            username = %username,
            group = %group_name(room_code),
            participants = room.participants().len(),
            started = room.is_started(),
            "participant joined room"
        );

        self.event_bus.broadcast(
            room_code,
            ServerMessage::State {
                state: room.snapshot(),
            },
        );
        drop(room);

        Ok(Admission {
            room_code: room_code.to_string(),
            connection_id,
            username: username.to_string(),
            subscription,
        })
    }

    /// Removes a participant. The last one out tears the room down and
    /// deletes its directory record.
    pub fn leave(&self, room_code: &str, connection_id: ConnectionId) -> Result<(), RegistryError> {
        self.event_bus.unsubscribe(room_code, connection_id);

        match self.rooms.entry(room_code.to_string()) {
            Entry::Occupied(mut entry) => {
                match entry.get_mut().leave(connection_id) {
                    Ok(participant) => tracing::info!(
                        room_code = %room_code,
                        connection_id = %connection_id,
                        username = %participant.username,
                        "participant left room"
                    ),
                    Err(err) => tracing::debug!(
                        room_code = %room_code,
                        connection_id = %connection_id,
                        error = %err,
                        "leave for connection not in room"
                    ),
                }

                if entry.get().is_empty() {
                    entry.remove();
                    self.event_bus.drop_group(room_code);
                    self.directory.delete_room(room_code)?;
                    tracing::info!(
                        room_code = %room_code,
                        group = %group_name(room_code),
                        "room emptied and removed"
                    );
                }
            }
            Entry::Vacant(_) => {
                // live state already reaped; make sure the record goes too
                self.directory.delete_room(room_code)?;
            }
        }
        Ok(())
    }

    /// Applies a move. A decided round deletes the directory record so the
    /// code can no longer be joined.
    pub fn make_move(
        &self,
        room_code: &str,
        connection_id: ConnectionId,
        cell: i64,
    ) -> Result<MoveResult, RegistryError> {
        let Entry::Occupied(mut entry) = self.rooms.entry(room_code.to_string()) else {
            return Err(RegistryError::RoomNotLive(room_code.to_string()));
        };

        let result = entry
            .get_mut()
            .make_move(connection_id, cell, Utc::now())?;

        tracing::debug!(
            room_code = %room_code,
            connection_id = %connection_id,
            cell = result.cell,
            mark = %result.mark,
            "move accepted"
        );

        if let Some(winner) = result.outcome.winner() {
            tracing::info!(room_code = %room_code, winner = %winner, "round decided");
            self.directory.delete_room(room_code)?;
        }

        self.broadcast_entry(entry);
        Ok(result)
    }

    pub fn reset(&self, room_code: &str, connection_id: ConnectionId) -> Result<(), RegistryError> {
        let Entry::Occupied(mut entry) = self.rooms.entry(room_code.to_string()) else {
            return Err(RegistryError::RoomNotLive(room_code.to_string()));
        };
        if !entry.get().contains(connection_id) {
            return Err(RoomError::UnknownParticipant.into());
        }

        {
            let mut draw = self
                .draw
                .lock()
                .map_err(|_| RegistryError::StoragePoisoned)?;
            entry.get_mut().reset(&mut draw)?;
        }

        tracing::info!(
            room_code = %room_code,
            connection_id = %connection_id,
            started = entry.get().is_started(),
            "round reset"
        );

        self.broadcast_entry(entry);
        Ok(())
    }

    /// Pushes the current snapshot to every session in the room, then reaps
    /// the room if its decided round outlived the TTL. Returns the number of
    /// sessions reached.
    pub fn broadcast(&self, room_code: &str) -> usize {
        match self.rooms.entry(room_code.to_string()) {
            Entry::Occupied(entry) => self.broadcast_entry(entry),
            Entry::Vacant(_) => 0,
        }
    }

    /// Current snapshot of a live room. An expired room is evicted instead.
    pub fn snapshot(&self, room_code: &str) -> Option<RoomSnapshot> {
        let Entry::Occupied(entry) = self.rooms.entry(room_code.to_string()) else {
            return None;
        };
        if entry.get().is_expired(Utc::now(), self.room_ttl) {
            self.evict(entry);
            return None;
        }
        Some(entry.get().snapshot())
    }

    /// Evicts every room whose decided round outlived the TTL.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut expired = Vec::new();
        self.rooms.retain(|code, room| {
            if room.is_expired(now, self.room_ttl) {
                expired.push(code.clone());
                false
            } else {
                true
            }
        });

        for code in &expired {
            self.event_bus.drop_group(code);
            tracing::info!(room_code = %code, "expired room swept");
        }
        expired.len()
    }

    pub fn contains(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn active_rooms(&self) -> Vec<RoomCode> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    fn broadcast_entry(
        &self,
        entry: dashmap::mapref::entry::OccupiedEntry<'_, RoomCode, Room>,
    ) -> usize {
        let delivered = self.event_bus.broadcast(
            entry.key(),
            ServerMessage::State {
                state: entry.get().snapshot(),
            },
        );

        if entry.get().is_expired(Utc::now(), self.room_ttl) {
            self.evict(entry);
        }
        delivered
    }

    /// Removes an expired room and releases its fan-out group, the same
    /// end state the periodic sweep leaves behind.
    fn evict(&self, entry: dashmap::mapref::entry::OccupiedEntry<'_, RoomCode, Room>) {
        let (code, _) = entry.remove_entry();
        self.event_bus.drop_group(&code);
        tracing::info!(room_code = %code, "idle finished room evicted");
    }

    #[cfg(test)]
    pub(crate) fn with_room_mut<R>(&self, room_code: &str, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        self.rooms.get_mut(room_code).map(|mut room| f(&mut room))
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Room is not live: {0}")]
    RoomNotLive(RoomCode),
    #[error(transparent)]
    Rejected(#[from] RoomError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("Room registry storage poisoned")]
    StoragePoisoned,
}

/// Reasons a connection is refused before or during admission.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("A username query parameter is required")]
    MissingUsername,
    #[error("Room not found: {0}")]
    RoomNotFound(RoomCode),
    #[error("Room is full: {0}")]
    RoomFull(RoomCode),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<RoomError> for JoinError {
    fn from(err: RoomError) -> Self {
        JoinError::Registry(RegistryError::Rejected(err))
    }
}

impl From<DirectoryError> for JoinError {
    fn from(err: DirectoryError) -> Self {
        JoinError::Registry(RegistryError::Directory(err))
    }
}

impl crate::errors::IntoErrorResponse for JoinError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            JoinError::MissingUsername => StatusCode::BAD_REQUEST,
            JoinError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            JoinError::RoomFull(_) => StatusCode::CONFLICT,
            JoinError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            JoinError::MissingUsername => "missing_username",
            JoinError::RoomNotFound(_) => "room_not_found",
            JoinError::RoomFull(_) => "room_full",
            JoinError::Registry(_) => "room_registry_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            JoinError::RoomNotFound(code) | JoinError::RoomFull(code) => {
                Some(serde_json::json!({ "room_code": code }))
            }
            _ => None,
        }
    }
}
