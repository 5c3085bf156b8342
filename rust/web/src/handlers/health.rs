use serde::Serialize;
use warp::reply::Json;

#[derive(Debug, Serialize)]
struct Liveness {
    status: &'static str,
}

/// `GET /health`: process liveness, independent of room state.
pub fn health() -> Json {
    warp::reply::json(&Liveness { status: "ok" })
}
