pub mod config;
pub mod directory;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;

pub use config::{CONFIG_PATH_VAR, Settings, SettingsError};
pub use directory::{DirectoryError, InMemoryDirectory, RoomDirectory, RoomRecord};
pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use events::{EventBus, EventSubscription, Membership};
pub use logging::{LogEntry, LogFormat, TestLogSubscriber, init_logging, init_test_logging};
pub use middleware::{log_response, with_request_logging};
pub use protocol::{ClientMessage, ServerMessage, group_name};
pub use registry::{Admission, JoinError, RegistryError, RoomRegistry};
pub use room::{ConnectionId, MoveResult, Room, RoomCode, RoomError, RoomSnapshot};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
pub use session::{GameSession, SessionError};
