use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check.
pub mod health;
/// Session snapshot.
pub mod session;
/// WebSocket upgrade.
pub mod websocket;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(session::router())
        .merge(websocket::router())
        .merge(docs::router());

    api_router.with_state(state)
}
