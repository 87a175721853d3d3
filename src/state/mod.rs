//! Session state: the orchestrator, its components and the shared application state.

pub mod admission;
pub mod connections;
pub mod fall_rate;
pub mod game;
pub mod ports;
pub mod scoreboard;
pub mod session;
pub mod state_machine;
#[cfg(test)]
pub mod testing;
pub mod timers;
pub mod trade;
pub mod voting;
pub mod watchdog;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dto::session::SessionSnapshot,
    error::ServiceError,
    services::session_runner::{SessionHandle, spawn_session},
    state::{connections::ConnectionRegistry, session::SessionCommand},
};

/// Application state shared by every handler.
pub type SharedState = Arc<AppState>;

/// Central application state: open sockets and the handle to the session actor.
pub struct AppState {
    connections: Arc<ConnectionRegistry>,
    session: SessionHandle,
}

impl AppState {
    /// Construct the state and spawn the session loop; must run inside a tokio runtime.
    pub fn new(config: AppConfig) -> SharedState {
        let connections = Arc::new(ConnectionRegistry::default());
        let session = spawn_session(config.session, connections.clone());
        Arc::new(Self {
            connections,
            session,
        })
    }

    /// Registry of active sockets keyed by connection id.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Forward a command to the session loop.
    pub fn dispatch(&self, command: SessionCommand) -> Result<(), ServiceError> {
        self.session.dispatch(command)
    }

    /// Latest session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Whether the session loop still accepts commands.
    pub fn is_session_running(&self) -> bool {
        self.session.is_running()
    }
}
