use crate::directory::RoomDirectory;
use crate::errors::{ErrorResponse, IntoErrorResponse};
use crate::registry::RoomRegistry;
use serde::Deserialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub username: String,
    pub room_code: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub username: String,
}

/// `POST /api/rooms`: registers a room code, or returns the existing record
/// when the code is taken.
pub async fn create_room(directory: Arc<dyn RoomDirectory>, request: CreateRoomRequest) -> Response {
    match directory.create_room(&request.room_code, &request.username) {
        Ok(record) => {
            tracing::info!(
                room_code = %record.room_code,
                creator = %record.creator,
                "room registered"
            );
            reply::with_status(reply::json(&record), StatusCode::CREATED).into_response()
        }
        Err(err) => err.into_http_response(),
    }
}

/// `POST /api/rooms/{code}/join`: records the opponent of an existing room.
pub async fn join_room(
    directory: Arc<dyn RoomDirectory>,
    room_code: String,
    request: JoinRoomRequest,
) -> Response {
    match directory.set_opponent(&room_code, &request.username) {
        Ok(record) => reply::with_status(reply::json(&record), StatusCode::OK).into_response(),
        Err(err) => err.into_http_response(),
    }
}

/// `GET /api/rooms/{code}/state`: snapshot of the live room.
pub async fn room_state(registry: Arc<RoomRegistry>, room_code: String) -> Response {
    match registry.snapshot(&room_code) {
        Some(snapshot) => reply::with_status(reply::json(&snapshot), StatusCode::OK).into_response(),
        None => ErrorResponse::with_details(
            "room_not_found",
            format!("No live room for code `{room_code}`"),
            serde_json::json!({ "room_code": room_code }),
        )
        .into_response(StatusCode::NOT_FOUND),
    }
}
