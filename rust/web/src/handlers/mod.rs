pub mod health;
pub mod rooms;
pub mod ws;

pub use health::health;
pub use rooms::{CreateRoomRequest, JoinRoomRequest, create_room, join_room, room_state};
