//! Library crate for tetro-arena-back, exposing modules for binaries and integration tests.

/// Configuration file loading.
pub mod config;
/// HTTP and WebSocket payloads.
pub mod dto;
/// Error types and their HTTP mapping.
pub mod error;
/// Axum routers.
pub mod routes;
/// Tasks and helpers behind the routes.
pub mod services;
/// Session state and the components it drives.
pub mod state;
