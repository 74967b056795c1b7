//! Service layer over the matchmaking core.
//!
//! Each operation takes the matchmaker lock, applies one mutation, and
//! delivers the resulting events while the lock is still held so clients
//! observe them in mutation order. Deferred transitions are tokio tasks
//! that sleep and then re-enter through the same lock.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    error::MatchmakingError,
    services::websocket_service::send_server_message,
    state::{
        SharedState,
        matchmaker::{Matchmaker, Outbound, Outcome, Timer},
    },
};

/// Current server wall clock in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Enter the waiting queue; pairs a match immediately when enough players wait.
pub async fn join_queue(
    state: &SharedState,
    connection_id: Uuid,
    user_id: &str,
    username: &str,
) {
    let mut matchmaker = state.matchmaker().lock().await;
    match matchmaker.join_queue(user_id, username, connection_id) {
        Ok(outcome) => finish(state, &mut matchmaker, outcome),
        Err(err) => report_error(state, connection_id, &err),
    }
}

/// Leave the waiting queue.
pub async fn leave_queue(state: &SharedState, connection_id: Uuid, user_id: &str) {
    let mut matchmaker = state.matchmaker().lock().await;
    match matchmaker.leave_queue(user_id) {
        Ok(outcome) => finish(state, &mut matchmaker, outcome),
        Err(err) => report_error(state, connection_id, &err),
    }
}

/// Report readiness during the waiting phase of a match.
pub async fn mark_ready(
    state: &SharedState,
    connection_id: Uuid,
    user_id: &str,
    match_id: Uuid,
    now_ms: u64,
) {
    let mut matchmaker = state.matchmaker().lock().await;
    match matchmaker.mark_ready(user_id, match_id, now_ms) {
        Ok(outcome) => finish(state, &mut matchmaker, outcome),
        Err(err) => report_error(state, connection_id, &err),
    }
}

/// Submit one tap for validation and scoring.
pub async fn submit_tap(
    state: &SharedState,
    connection_id: Uuid,
    user_id: &str,
    match_id: Uuid,
    client_timestamp_ms: u64,
    now_ms: u64,
) {
    let mut matchmaker = state.matchmaker().lock().await;
    match matchmaker.submit_tap(user_id, match_id, client_timestamp_ms, now_ms) {
        Ok(outcome) => finish(state, &mut matchmaker, outcome),
        Err(err) => report_error(state, connection_id, &err),
    }
}

/// Clean up after a dropped connection. Safe to call for connections that
/// never joined anything.
pub async fn disconnect(state: &SharedState, connection_id: Uuid, now_ms: u64) {
    let mut matchmaker = state.matchmaker().lock().await;
    let outcome = matchmaker.on_disconnect(connection_id, now_ms);
    finish(state, &mut matchmaker, outcome);
}

/// Answer a caller-facing failure with an `error` event on its connection only.
pub fn report_error(state: &SharedState, connection_id: Uuid, err: &MatchmakingError) {
    if let Some(handle) = state.connections().get(&connection_id) {
        send_server_message(&handle.tx, &ServerMessage::from_error(err));
    }
}

/// Deliver an operation's events and arm its timers, lock still held.
fn finish(state: &SharedState, matchmaker: &mut Matchmaker, outcome: Outcome) {
    deliver(state, outcome.outbound);
    arm_timers(state, matchmaker, outcome.timers);
}

/// Push each outbound event to its target connections, skipping ones that
/// already dropped out of the registry.
fn deliver(state: &SharedState, outbound: Vec<Outbound>) {
    for out in outbound {
        for connection_id in &out.to {
            if let Some(handle) = state.connections().get(connection_id) {
                send_server_message(&handle.tx, &out.message);
            }
        }
    }
}

/// Spawn one sleeping task per timer; the start timer's handle is stored on
/// its match so the all-ready path can abort it.
fn arm_timers(state: &SharedState, matchmaker: &mut Matchmaker, timers: Vec<Timer>) {
    for timer in timers {
        match timer {
            Timer::Start { match_id, delay } => {
                let state = state.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    run_deferred_start(&state, match_id).await;
                });
                matchmaker.set_start_timer(match_id, task.abort_handle());
            }
            Timer::End { match_id, delay } => {
                let state = state.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    run_deferred_end(&state, match_id).await;
                });
            }
            Timer::Cleanup { match_id, delay } => {
                let state = state.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    run_cleanup(&state, match_id).await;
                });
            }
        }
    }
}

async fn run_deferred_start(state: &SharedState, match_id: Uuid) {
    let mut matchmaker = state.matchmaker().lock().await;
    let outcome = matchmaker.start_match(match_id, now_ms());
    finish(state, &mut matchmaker, outcome);
}

async fn run_deferred_end(state: &SharedState, match_id: Uuid) {
    let mut matchmaker = state.matchmaker().lock().await;
    let outcome = matchmaker.end_match(match_id, now_ms());
    finish(state, &mut matchmaker, outcome);
}

async fn run_cleanup(state: &SharedState, match_id: Uuid) {
    let mut matchmaker = state.matchmaker().lock().await;
    let outcome = matchmaker.cleanup_match(match_id);
    finish(state, &mut matchmaker, outcome);
}
