//! `GET /session`: the published session snapshot.

use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::session::SessionSnapshot,
    error::{AppError, ServiceError},
    state::SharedState,
};

/// Read-only session endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route("/session", get(get_session))
}

#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses(
        (status = 200, description = "Current session snapshot", body = SessionSnapshot),
        (status = 503, description = "Session loop stopped")
    )
)]
/// Return the phase, seats, scores and voting state of the session.
pub async fn get_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    if !state.is_session_running() {
        return Err(ServiceError::SessionUnavailable.into());
    }
    Ok(Json(state.snapshot()))
}
