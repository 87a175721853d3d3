//! OpenAPI document of the HTTP surface.

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Tetro Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::get_session,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SessionSnapshot,
            crate::dto::ws::InboundMessage,
            crate::dto::ws::OutboundMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Read-only view of the game session"),
        (name = "game", description = "WebSocket protocol for players and spectators"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/healthcheck", "/session", "/ws"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
