use indexmap::IndexMap;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::state::state_machine::MatchPhase;

/// Runtime state tracked for one player inside the queue or a match.
///
/// Insertion order into the queue is preserved all the way into the match
/// roster; it decides ties at the end of a match.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable user identity supplied by the authenticated client.
    pub id: String,
    /// Identifier of the player's current socket connection.
    pub connection_id: Uuid,
    /// Display name shown to other players.
    pub username: String,
    /// Count of taps accepted by the server in the current match.
    pub validated_taps: u32,
    /// Server timestamp (ms) of the last accepted tap; 0 before the first.
    pub last_tap_at_ms: u64,
    /// Whether the player reported ready during the waiting phase.
    pub ready: bool,
}

impl Player {
    /// Build a fresh entry for a player joining the queue.
    pub fn new(id: impl Into<String>, username: impl Into<String>, connection_id: Uuid) -> Self {
        Self {
            id: id.into(),
            connection_id,
            username: username.into(),
            validated_taps: 0,
            last_tap_at_ms: 0,
            ready: false,
        }
    }
}

/// One tap-race instance with a fixed roster and a fixed duration.
#[derive(Debug)]
pub struct Match {
    /// Unique identifier, also used as the broadcast room key.
    pub id: Uuid,
    /// Roster keyed by player id, in queue insertion order.
    pub players: IndexMap<String, Player>,
    /// Current lifecycle phase.
    pub phase: MatchPhase,
    /// Server timestamp (ms) of the transition to active.
    pub started_at_ms: Option<u64>,
    /// Server timestamp (ms) of the transition to finished.
    pub ended_at_ms: Option<u64>,
    /// Fixed match length in milliseconds.
    pub duration_ms: u64,
    /// Winning player id, decided when the match finishes.
    pub winner_id: Option<String>,
    /// Handle for the pending deferred start, aborted on an all-ready start.
    pub start_timer: Option<AbortHandle>,
}

impl Match {
    /// Assemble a match in the waiting phase from freshly paired players.
    pub fn new(id: Uuid, players: IndexMap<String, Player>, duration_ms: u64) -> Self {
        Self {
            id,
            players,
            phase: MatchPhase::Waiting,
            started_at_ms: None,
            ended_at_ms: None,
            duration_ms,
            winner_id: None,
            start_timer: None,
        }
    }

    /// Connection ids of everyone currently on the roster.
    ///
    /// This is the broadcast "room" for the match; there is no separate
    /// room registry.
    pub fn roster_connections(&self) -> Vec<Uuid> {
        self.players
            .values()
            .map(|player| player.connection_id)
            .collect()
    }

    /// Whether every player on the roster reported ready.
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|player| player.ready)
    }

    /// Roster ordered by descending tap count, ties kept in insertion order.
    pub fn standings(&self) -> Vec<&Player> {
        let mut ranked: Vec<&Player> = self.players.values().collect();
        ranked.sort_by(|a, b| b.validated_taps.cmp(&a.validated_taps));
        ranked
    }

    /// Pick the winner: strictly greatest tap count, earlier-queued player on
    /// ties, nobody when not a single tap was accepted.
    pub fn decide_winner(&self) -> Option<String> {
        let mut winner: Option<&Player> = None;
        for player in self.players.values() {
            let beats_current = winner
                .map(|current| player.validated_taps > current.validated_taps)
                .unwrap_or(true);
            if beats_current {
                winner = Some(player);
            }
        }

        winner
            .filter(|player| player.validated_taps > 0)
            .map(|player| player.id.clone())
    }

    /// Abort the pending deferred start, if one is still armed.
    pub fn cancel_start_timer(&mut self) {
        if let Some(handle) = self.start_timer.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(taps: &[(&str, u32)]) -> Match {
        let players = taps
            .iter()
            .map(|(id, count)| {
                let mut player = Player::new(*id, format!("name-{id}"), Uuid::new_v4());
                player.validated_taps = *count;
                (player.id.clone(), player)
            })
            .collect();
        Match::new(Uuid::new_v4(), players, 30_000)
    }

    #[test]
    fn winner_is_strictly_greatest() {
        let game = roster(&[("a", 3), ("b", 5)]);
        assert_eq!(game.decide_winner().as_deref(), Some("b"));
    }

    #[test]
    fn tie_goes_to_the_earlier_queued_player() {
        let game = roster(&[("a", 7), ("b", 7)]);
        assert_eq!(game.decide_winner().as_deref(), Some("a"));
    }

    #[test]
    fn no_taps_means_no_winner() {
        let game = roster(&[("a", 0), ("b", 0)]);
        assert_eq!(game.decide_winner(), None);
    }

    #[test]
    fn standings_sort_is_stable() {
        let game = roster(&[("a", 2), ("b", 5), ("c", 2)]);
        let order: Vec<&str> = game
            .standings()
            .iter()
            .map(|player| player.id.as_str())
            .collect();
        assert_eq!(order, ["b", "a", "c"]);
    }

    #[test]
    fn all_ready_requires_a_roster() {
        let mut game = roster(&[("a", 0), ("b", 0)]);
        assert!(!game.all_ready());

        for player in game.players.values_mut() {
            player.ready = true;
        }
        assert!(game.all_ready());

        game.players.clear();
        assert!(!game.all_ready());
    }
}
