//! WebSocket transport layer: shared state, HTTP routes, and per-socket
//! connection handling.

mod connection;
mod routes;

pub use routes::create_router;

use crate::config::Config;
use crate::hub::Hub;
use crate::map::MapConfig;
use crate::metrics::ServerMetrics;
use crate::quiz::QuizService;
use crate::room::runtime::RuntimeDeps;
use crate::room::store::RoomStore;
use std::sync::Arc;

/// Process-wide shared state handed to every request handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub map: Arc<MapConfig>,
    pub hub: Arc<Hub>,
    pub store: Arc<RoomStore>,
    pub quiz: QuizService,
    pub metrics: Arc<ServerMetrics>,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let metrics = Arc::new(ServerMetrics::new());
        let quiz = QuizService::new(config.quiz.clone());
        Arc::new(Self {
            config: Arc::new(config),
            map: Arc::new(MapConfig::default()),
            hub: Arc::new(Hub::new(metrics.clone())),
            store: Arc::new(RoomStore::new()),
            quiz,
            metrics,
        })
    }

    /// Dependency bundle for a new room runtime.
    pub fn runtime_deps(&self) -> RuntimeDeps {
        RuntimeDeps {
            config: self.config.clone(),
            map: self.map.clone(),
            hub: self.hub.clone(),
            store: self.store.clone(),
            quiz: self.quiz.clone(),
            metrics: self.metrics.clone(),
        }
    }
}
