use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness together with the current matchmaking gauges.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let matchmaker = state.matchmaker().lock().await;
    HealthResponse::ok(matchmaker.queued_players(), matchmaker.active_matches())
}
