use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::validation::{validate_user_id, validate_username},
    error::MatchmakingError,
};

/// Messages accepted from game WebSocket clients.
///
/// The `userId` field is trusted as-is; authentication happens upstream.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join_queue", rename_all = "camelCase")]
    JoinQueue { user_id: String, username: String },
    #[serde(rename = "leave_queue", rename_all = "camelCase")]
    LeaveQueue { user_id: String },
    #[serde(rename = "player_ready", rename_all = "camelCase")]
    PlayerReady { user_id: String, match_id: Uuid },
    #[serde(rename = "tap", rename_all = "camelCase")]
    Tap {
        user_id: String,
        match_id: Uuid,
        /// Client wall-clock timestamp in milliseconds, checked against the
        /// server clock but never trusted for scoring.
        timestamp: u64,
    },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a raw text frame and validate its fields in one step.
    ///
    /// Anything that fails to parse, carries an unknown `type`, or holds
    /// malformed identity fields collapses into [`MatchmakingError::BadPayload`].
    pub fn from_json_str(raw: &str) -> Result<Self, MatchmakingError> {
        let message: Self =
            serde_json::from_str(raw).map_err(|_| MatchmakingError::BadPayload)?;
        message.validate_fields()?;
        Ok(message)
    }

    fn validate_fields(&self) -> Result<(), MatchmakingError> {
        let valid = match self {
            Self::JoinQueue { user_id, username } => {
                validate_user_id(user_id).is_ok() && validate_username(username).is_ok()
            }
            Self::LeaveQueue { user_id }
            | Self::PlayerReady { user_id, .. }
            | Self::Tap { user_id, .. } => validate_user_id(user_id).is_ok(),
            Self::Unknown => false,
        };

        if valid {
            Ok(())
        } else {
            Err(MatchmakingError::BadPayload)
        }
    }
}

/// One roster entry shared with every participant when a match is found.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct RosterEntry {
    pub id: String,
    pub username: String,
}

/// Final per-player line of the match results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    pub id: String,
    pub username: String,
    pub taps: u32,
    pub is_winner: bool,
}

/// Events pushed from the server to game clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "queue_joined")]
    QueueJoined { position: usize },
    #[serde(rename = "queue_left")]
    QueueLeft,
    #[serde(rename = "match_found", rename_all = "camelCase")]
    MatchFound {
        match_id: Uuid,
        players: Vec<RosterEntry>,
    },
    #[serde(rename = "match_started", rename_all = "camelCase")]
    MatchStarted {
        match_id: Uuid,
        duration: u64,
        start_time: u64,
    },
    #[serde(rename = "player_tapped", rename_all = "camelCase")]
    PlayerTapped {
        player_id: String,
        username: String,
        tap_count: u32,
    },
    #[serde(rename = "tap_confirmed", rename_all = "camelCase")]
    TapConfirmed { tap_count: u32 },
    #[serde(rename = "player_disconnected", rename_all = "camelCase")]
    PlayerDisconnected { player_id: String },
    #[serde(rename = "match_ended", rename_all = "camelCase")]
    MatchEnded {
        match_id: Uuid,
        results: Vec<PlayerResult>,
        winner_id: Option<String>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    /// Build the `error` event for a caller-facing failure.
    pub fn from_error(err: &MatchmakingError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_queue_frame_parses() {
        let message = ClientMessage::from_json_str(
            r#"{"type":"join_queue","userId":"u-1","username":"Ada"}"#,
        )
        .unwrap();
        match message {
            ClientMessage::JoinQueue { user_id, username } => {
                assert_eq!(user_id, "u-1");
                assert_eq!(username, "Ada");
            }
            other => panic!("expected join_queue, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_is_a_bad_payload() {
        let err = ClientMessage::from_json_str(r#"{"type":"teleport","userId":"u-1"}"#)
            .unwrap_err();
        assert_eq!(err, MatchmakingError::BadPayload);
    }

    #[test]
    fn malformed_json_is_a_bad_payload() {
        let err = ClientMessage::from_json_str("{not json").unwrap_err();
        assert_eq!(err, MatchmakingError::BadPayload);
    }

    #[test]
    fn empty_user_id_is_a_bad_payload() {
        let err = ClientMessage::from_json_str(
            r#"{"type":"join_queue","userId":"","username":"Ada"}"#,
        )
        .unwrap_err();
        assert_eq!(err, MatchmakingError::BadPayload);
    }

    #[test]
    fn outbound_events_use_wire_field_names() {
        let message = ServerMessage::MatchEnded {
            match_id: Uuid::nil(),
            results: vec![PlayerResult {
                id: "u-1".into(),
                username: "Ada".into(),
                taps: 3,
                is_winner: true,
            }],
            winner_id: Some("u-1".into()),
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""type":"match_ended""#));
        assert!(json.contains(r#""matchId""#));
        assert!(json.contains(r#""isWinner":true"#));
        assert!(json.contains(r#""winnerId":"u-1""#));
    }
}
