/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Tokio timers feeding the session loop.
pub mod scheduler;
/// Session actor task and its handle.
pub mod session_runner;
/// WebSocket connection and message handling service.
pub mod websocket_service;
