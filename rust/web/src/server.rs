use crate::config::Settings;
use crate::directory::{InMemoryDirectory, RoomDirectory};
use crate::events::EventBus;
use crate::handlers;
use crate::middleware::with_request_logging;
use crate::registry::RoomRegistry;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tictac_engine::draw::RoleDraw;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use warp::filters::BoxedFilter;
use warp::reply::{Reply, Response};
use warp::Filter;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
    room_ttl: Duration,
    sweep_interval: Duration,
    outbound_buffer: usize,
    seed: Option<u64>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let defaults = Settings::default();
        Self {
            host: host.into(),
            port,
            room_ttl: defaults.room_ttl(),
            sweep_interval: defaults.sweep_interval(),
            outbound_buffer: defaults.outbound_buffer,
            seed: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.host.to_string(),
            port: settings.port,
            room_ttl: settings.room_ttl(),
            sweep_interval: settings.sweep_interval(),
            outbound_buffer: settings.outbound_buffer,
            seed: settings.seed,
        }
    }

    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0).with_seed(Some(7))
    }

    pub fn with_room_ttl(mut self, room_ttl: Duration) -> Self {
        self.room_ttl = room_ttl;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn room_ttl(&self) -> Duration {
        self.room_ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServerConfig,
    directory: Arc<dyn RoomDirectory>,
    event_bus: Arc<EventBus>,
    registry: Arc<RoomRegistry>,
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_directory(config, Arc::new(InMemoryDirectory::new()))
    }

    /// Builds the context around an externally owned directory.
    pub fn with_directory(config: ServerConfig, directory: Arc<dyn RoomDirectory>) -> Self {
        let event_bus = Arc::new(EventBus::with_buffer(config.outbound_buffer()));
        let draw = match config.seed() {
            Some(seed) => RoleDraw::new_with_seed(seed),
            None => RoleDraw::from_entropy(),
        };
        let registry = Arc::new(RoomRegistry::with_draw(
            Arc::clone(&directory),
            Arc::clone(&event_bus),
            draw,
            config.room_ttl(),
        ));

        Self {
            config,
            directory,
            event_bus,
            registry,
        }
    }

    pub fn new_for_tests() -> Self {
        Self::new(ServerConfig::for_tests())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn directory(&self) -> Arc<dyn RoomDirectory> {
        Arc::clone(&self.directory)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            context: AppContext::new(config),
        }
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let config = context.config().clone();
        let bind_addr = Self::bind_addr(&config)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let routes = Self::routes(&context);
        let mut server_shutdown = shutdown_rx.clone();
        let shutdown_signal = async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "game server listening");

        let server = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });
        let sweeper = spawn_sweeper(context.registry(), config.sweep_interval(), shutdown_rx);

        Ok(ServerHandle {
            addr,
            shutdown: Some(shutdown_tx),
            server: Some(server),
            sweeper: Some(sweeper),
            context,
        })
    }

    /// Every route the server answers, wrapped in request logging.
    pub fn routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let health = warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(|| handlers::health().into_response());

        let routes = health
            .or(Self::room_routes(context))
            .unify()
            .or(Self::socket_route(context))
            .unify();

        with_request_logging(routes).boxed()
    }

    fn room_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let create = warp::path!("api" / "rooms")
            .and(warp::post())
            .and(Self::with_directory(context.directory()))
            .and(warp::body::json())
            .and_then(
                |directory: Arc<dyn RoomDirectory>,
                 request: handlers::CreateRoomRequest| async move {
                    Ok::<_, Infallible>(handlers::create_room(directory, request).await)
                },
            );

        let join = warp::path!("api" / "rooms" / String / "join")
            .and(warp::post())
            .and(Self::with_directory(context.directory()))
            .and(warp::body::json())
            .and_then(
                |room_code: String,
                 directory: Arc<dyn RoomDirectory>,
                 request: handlers::JoinRoomRequest| async move {
                    Ok::<_, Infallible>(handlers::join_room(directory, room_code, request).await)
                },
            );

        let state = warp::path!("api" / "rooms" / String / "state")
            .and(warp::get())
            .and(Self::with_registry(context.registry()))
            .and_then(|room_code: String, registry: Arc<RoomRegistry>| async move {
                Ok::<_, Infallible>(handlers::room_state(registry, room_code).await)
            });

        create.or(join).unify().or(state).unify().boxed()
    }

    fn socket_route(context: &AppContext) -> BoxedFilter<(Response,)> {
        warp::path!("ws" / "game" / String)
            .and(warp::get())
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::ws())
            .and(Self::with_registry(context.registry()))
            .map(
                |room_code: String,
                 query: HashMap<String, String>,
                 ws: warp::ws::Ws,
                 registry: Arc<RoomRegistry>| {
                    handlers::ws::upgrade(registry, room_code, query, ws)
                },
            )
            .boxed()
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    fn with_directory(
        directory: Arc<dyn RoomDirectory>,
    ) -> impl Filter<Extract = (Arc<dyn RoomDirectory>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&directory))
    }

    fn with_registry(
        registry: Arc<RoomRegistry>,
    ) -> impl Filter<Extract = (Arc<RoomRegistry>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&registry))
    }
}

/// Reaps expired rooms every `period` until shutdown is signalled.
fn spawn_sweeper(
    registry: Arc<RoomRegistry>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let swept = registry.sweep_expired();
                    if swept > 0 {
                        tracing::debug!(swept, remaining = registry.room_count(), "room sweep");
                    }
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
        tracing::debug!("room sweeper stopped");
    })
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<watch::Sender<bool>>,
    server: Option<JoinHandle<Result<(), ServerError>>>,
    sweeper: Option<JoinHandle<()>>,
    context: AppContext,
}

impl ServerHandle {
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }

        if let Some(sweeper) = self.sweeper.take() {
            let _ = sweeper.await;
        }

        if let Some(task) = self.server.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }

        if let Some(task) = self.sweeper.take() {
            task.abort();
        }

        if let Some(task) = self.server.take() {
            task.abort();
        }
    }
}
