use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// `/healthcheck` response.
pub mod health;
/// `/session` response.
pub mod session;
/// WebSocket messages.
pub mod ws;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
