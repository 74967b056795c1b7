//! End-to-end matchmaking flows driven through the service layer with
//! in-memory connections and paused tokio time.

use std::time::Duration;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use tap_rush_back::{
    config::AppConfig,
    dto::ws::{PlayerResult, ServerMessage},
    services::matchmaker_service,
    state::{AppState, ConnectionHandle, SharedState, state_machine::MatchPhase},
};

/// Register an in-memory connection and keep the receiving end of its writer.
fn connect(state: &SharedState) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = Uuid::new_v4();
    state.connections().insert(id, ConnectionHandle { id, tx });
    (id, rx)
}

/// Drain every event currently buffered for a connection.
fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerMessage> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            events.push(serde_json::from_str(&text).expect("valid server event"));
        }
    }
    events
}

fn found_match_id(events: &[ServerMessage]) -> Uuid {
    events
        .iter()
        .find_map(|event| match event {
            ServerMessage::MatchFound { match_id, .. } => Some(*match_id),
            _ => None,
        })
        .expect("match_found event")
}

async fn match_phase(state: &SharedState, match_id: Uuid) -> Option<MatchPhase> {
    state.matchmaker().lock().await.match_phase(match_id)
}

#[tokio::test(start_paused = true)]
async fn happy_match_runs_to_completion() {
    let state = AppState::new(AppConfig::default());
    let (conn_a, mut rx_a) = connect(&state);
    let (conn_b, mut rx_b) = connect(&state);

    matchmaker_service::join_queue(&state, conn_a, "a", "Ada").await;
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerMessage::QueueJoined { position: 1 }]
    );

    matchmaker_service::join_queue(&state, conn_b, "b", "Bea").await;
    let events_b = drain(&mut rx_b);
    assert_eq!(events_b[0], ServerMessage::QueueJoined { position: 2 });
    let match_id = found_match_id(&events_b);
    assert_eq!(found_match_id(&drain(&mut rx_a)), match_id);

    // The deferred start fires once the start delay elapses.
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    let started = drain(&mut rx_a);
    assert!(matches!(
        started.as_slice(),
        [ServerMessage::MatchStarted { duration: 30_000, .. }]
    ));
    drain(&mut rx_b);

    // Ada taps three times, Bea twice, all outside the minimum interval.
    let base = 100_000;
    for offset in [100, 210, 330] {
        let at = base + offset;
        matchmaker_service::submit_tap(&state, conn_a, "a", match_id, at, at).await;
    }
    for offset in [150, 260] {
        let at = base + offset;
        matchmaker_service::submit_tap(&state, conn_b, "b", match_id, at, at).await;
    }

    let events_a = drain(&mut rx_a);
    let tapped = events_a
        .iter()
        .filter(|event| matches!(event, ServerMessage::PlayerTapped { .. }))
        .count();
    assert_eq!(tapped, 5);
    assert!(events_a.contains(&ServerMessage::TapConfirmed { tap_count: 3 }));

    // The duration timer ends the match.
    tokio::time::sleep(Duration::from_millis(30_100)).await;
    let ended = drain(&mut rx_a);
    match ended.last() {
        Some(ServerMessage::MatchEnded {
            results, winner_id, ..
        }) => {
            assert_eq!(winner_id.as_deref(), Some("a"));
            assert_eq!(
                *results,
                vec![
                    PlayerResult {
                        id: "a".into(),
                        username: "Ada".into(),
                        taps: 3,
                        is_winner: true,
                    },
                    PlayerResult {
                        id: "b".into(),
                        username: "Bea".into(),
                        taps: 2,
                        is_winner: false,
                    },
                ]
            );
        }
        other => panic!("expected match_ended, got {other:?}"),
    }

    // Cleanup deletes the match and frees both identities.
    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert_eq!(match_phase(&state, match_id).await, None);
    matchmaker_service::join_queue(&state, conn_a, "a", "Ada").await;
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerMessage::QueueJoined { position: 1 }]
    );
}

#[tokio::test(start_paused = true)]
async fn all_ready_starts_once_and_cancels_the_deferred_start() {
    let state = AppState::new(AppConfig::default());
    let (conn_a, mut rx_a) = connect(&state);
    let (conn_b, mut rx_b) = connect(&state);

    matchmaker_service::join_queue(&state, conn_a, "a", "Ada").await;
    matchmaker_service::join_queue(&state, conn_b, "b", "Bea").await;
    let match_id = found_match_id(&drain(&mut rx_a));
    drain(&mut rx_b);

    matchmaker_service::mark_ready(&state, conn_a, "a", match_id, 500).await;
    assert!(drain(&mut rx_a).is_empty());

    matchmaker_service::mark_ready(&state, conn_b, "b", match_id, 600).await;
    let started = drain(&mut rx_a);
    assert!(matches!(
        started.as_slice(),
        [ServerMessage::MatchStarted { .. }]
    ));

    // Nothing more fires when the original start delay would have elapsed.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(drain(&mut rx_a).is_empty());
    assert!(drain(&mut rx_b).is_empty());
    assert_eq!(match_phase(&state, match_id).await, Some(MatchPhase::Active));
}

#[tokio::test(start_paused = true)]
async fn disconnects_drain_a_match_without_errors() {
    let state = AppState::new(AppConfig::default());
    let (conn_a, mut rx_a) = connect(&state);
    let (conn_b, mut rx_b) = connect(&state);

    matchmaker_service::join_queue(&state, conn_a, "a", "Ada").await;
    matchmaker_service::join_queue(&state, conn_b, "b", "Bea").await;
    let match_id = found_match_id(&drain(&mut rx_a));
    drain(&mut rx_b);

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    drain(&mut rx_a);

    // Bea drops out; Ada is told and the match keeps running.
    state.connections().remove(&conn_b);
    matchmaker_service::disconnect(&state, conn_b, 10_000).await;
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerMessage::PlayerDisconnected {
            player_id: "b".into()
        }]
    );
    assert_eq!(match_phase(&state, match_id).await, Some(MatchPhase::Active));

    // Ada drops out too; the match is abandoned with no winner.
    state.connections().remove(&conn_a);
    matchmaker_service::disconnect(&state, conn_a, 11_000).await;
    assert_eq!(
        match_phase(&state, match_id).await,
        Some(MatchPhase::Finished)
    );
    assert_eq!(
        state.matchmaker().lock().await.match_winner(match_id),
        None
    );

    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert_eq!(match_phase(&state, match_id).await, None);
}

#[tokio::test(start_paused = true)]
async fn failures_are_reported_to_the_offender_only() {
    let state = AppState::new(AppConfig::default());
    let (conn_a, mut rx_a) = connect(&state);
    let (conn_b, mut rx_b) = connect(&state);

    matchmaker_service::join_queue(&state, conn_a, "a", "Ada").await;
    drain(&mut rx_a);

    // Joining twice is answered on the second connection only.
    matchmaker_service::join_queue(&state, conn_b, "a", "Ada").await;
    assert_eq!(
        drain(&mut rx_b),
        vec![ServerMessage::Error {
            message: "already queued".into()
        }]
    );
    assert!(drain(&mut rx_a).is_empty());

    // Tapping into a match that does not exist yet.
    matchmaker_service::submit_tap(&state, conn_a, "a", Uuid::new_v4(), 1_000, 1_000).await;
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerMessage::Error {
            message: "match not found".into()
        }]
    );
}
