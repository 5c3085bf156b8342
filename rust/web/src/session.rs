use crate::events::EventSubscription;
use crate::protocol::ClientMessage;
use crate::registry::{JoinError, RegistryError, RoomRegistry};
use crate::room::{ConnectionId, RoomCode};
use std::sync::Arc;
use thiserror::Error;

/// One admitted socket in a room. Dropping the session leaves the room.
#[derive(Debug)]
pub struct GameSession {
    registry: Arc<RoomRegistry>,
    room_code: RoomCode,
    connection_id: ConnectionId,
    username: String,
    left: bool,
}

impl GameSession {
    /// Joins `room_code` and returns the session with the subscription its
    /// writer drains.
    pub fn establish(
        registry: Arc<RoomRegistry>,
        room_code: &str,
        username: &str,
    ) -> Result<(Self, EventSubscription), JoinError> {
        let admission = registry.join(room_code, username)?;
        let session = Self {
            registry,
            room_code: admission.room_code,
            connection_id: admission.connection_id,
            username: admission.username,
            left: false,
        };
        Ok((session, admission.subscription))
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Handles one inbound text frame. Rejections never reach the client;
    /// they are returned so the caller can log them.
    pub fn handle_text(&self, text: &str) -> Result<(), SessionError> {
        let message = ClientMessage::parse(text).ok_or(SessionError::Unrecognized)?;
        match message {
            ClientMessage::Move { cell } => {
                self.registry
                    .make_move(&self.room_code, self.connection_id, cell)?;
            }
            ClientMessage::Reset => {
                self.registry.reset(&self.room_code, self.connection_id)?;
            }
        }
        Ok(())
    }

    /// Leaves the room now instead of on drop.
    pub fn leave(mut self) -> Result<(), RegistryError> {
        self.left = true;
        self.registry.leave(&self.room_code, self.connection_id)
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        if self.left {
            return;
        }
        if let Err(err) = self.registry.leave(&self.room_code, self.connection_id) {
            tracing::warn!(
                room_code = %self.room_code,
                connection_id = %self.connection_id,
                error = %err,
                "failed to leave room on session drop"
            );
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unrecognized client message")]
    Unrecognized,
    #[error(transparent)]
    Rejected(#[from] RegistryError),
}
