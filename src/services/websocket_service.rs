use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::MatchmakingError,
    services::matchmaker_service::{self, now_ms},
    state::{ConnectionHandle, SharedState},
};

/// Handle the full lifecycle for an individual game WebSocket connection.
///
/// The connection is anonymous until its first `join_queue`; the matchmaker
/// maps the connection id back to a player identity from then on, which is
/// what makes the disconnect cleanup at the bottom work.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state.connections().insert(
        connection_id,
        ConnectionHandle {
            id: connection_id,
            tx: outbound_tx.clone(),
        },
    );

    info!(%connection_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                dispatch(&state, connection_id, &outbound_tx, &text).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%connection_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(&connection_id);
    matchmaker_service::disconnect(&state, connection_id, now_ms()).await;
    info!(%connection_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Parse one inbound frame and route it to the matching matchmaker operation.
async fn dispatch(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    raw: &str,
) {
    let message = match ClientMessage::from_json_str(raw) {
        Ok(message) => message,
        Err(err) => {
            warn!(%connection_id, "failed to parse or validate client message");
            send_server_message(outbound_tx, &ServerMessage::from_error(&err));
            return;
        }
    };

    match message {
        ClientMessage::JoinQueue { user_id, username } => {
            matchmaker_service::join_queue(state, connection_id, &user_id, &username).await;
        }
        ClientMessage::LeaveQueue { user_id } => {
            matchmaker_service::leave_queue(state, connection_id, &user_id).await;
        }
        ClientMessage::PlayerReady { user_id, match_id } => {
            matchmaker_service::mark_ready(state, connection_id, &user_id, match_id, now_ms())
                .await;
        }
        ClientMessage::Tap {
            user_id,
            match_id,
            timestamp,
        } => {
            matchmaker_service::submit_tap(
                state,
                connection_id,
                &user_id,
                match_id,
                timestamp,
                now_ms(),
            )
            .await;
        }
        // Parse already rejects unknown types; this arm only keeps the
        // match exhaustive.
        ClientMessage::Unknown => {
            send_server_message(
                outbound_tx,
                &ServerMessage::from_error(&MatchmakingError::BadPayload),
            );
        }
    }
}

/// Serialize an event and push it onto a connection's writer channel.
///
/// Delivery is best-effort: a closed writer means the connection is going
/// away and its disconnect cleanup will run shortly.
pub fn send_server_message(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize server message `{message:?}`");
            return;
        }
    };

    let _ = tx.send(Message::Text(payload.into()));
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
