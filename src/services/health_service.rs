//! Health evaluation behind `/healthcheck`.

use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the session loop is still accepting commands.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let connections = state.connections().len();
    if state.is_session_running() {
        HealthResponse::ok(connections)
    } else {
        warn!("session loop stopped (degraded mode)");
        HealthResponse::degraded(connections)
    }
}
