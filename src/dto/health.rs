use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status (always "ok"; the server holds no external dependencies).
    pub status: String,
    /// Number of players currently waiting to be paired.
    pub queued_players: usize,
    /// Number of matches currently in the active phase.
    pub active_matches: usize,
}

impl HealthResponse {
    /// Create a health response carrying the current matchmaking gauges.
    pub fn ok(queued_players: usize, active_matches: usize) -> Self {
        Self {
            status: "ok".to_string(),
            queued_players,
            active_matches,
        }
    }
}
