//! Wire messages exchanged over a game socket.

use crate::room::RoomSnapshot;
use serde::{Deserialize, Serialize};

/// Longest transport group label.
pub const MAX_GROUP_NAME_LEN: usize = 99;

/// Client → server actions. Any other payload is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Move {
        #[serde(rename = "move")]
        cell: i64,
    },
    Reset,
}

impl ClientMessage {
    /// Parses an inbound text frame, `None` for anything that is not a known action.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Server → client messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after admission so the client knows its name in the room.
    Init { username: String },
    /// Full room snapshot, sent after every accepted transition.
    State { state: RoomSnapshot },
}

/// Transport label for a room code: `room_` followed by the code with every
/// character outside `[A-Za-z0-9._-]` replaced by `_`, capped at
/// [`MAX_GROUP_NAME_LEN`] characters.
///
/// Distinct codes can share a label, so it only appears in logs. Fan-out is
/// keyed by the room code itself.
pub fn group_name(room_code: &str) -> String {
    let cleaned: String = room_code
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut name = format!("room_{cleaned}");
    // only ASCII remains, so byte length equals char count
    name.truncate(MAX_GROUP_NAME_LEN);
    name
}
