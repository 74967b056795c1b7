//! The serialized matchmaking core: queue, live matches, and player indices.
//!
//! Every mutation happens through one of the operation methods below while the
//! caller holds the matchmaker lock, so state changes and the events they
//! produce form a single total order. Operations never perform I/O; they
//! return an [`Outcome`] describing the events to deliver and the timers to
//! arm, which the service layer executes.

use std::{collections::HashMap, time::Duration};

use indexmap::IndexMap;
use tokio::task::AbortHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::ws::{PlayerResult, RosterEntry, ServerMessage},
    error::MatchmakingError,
    state::{
        arena::{Match, Player},
        state_machine::{MatchEvent, MatchPhase},
        tap,
    },
};

/// One outbound event and the connections it targets.
#[derive(Debug)]
pub struct Outbound {
    pub to: Vec<Uuid>,
    pub message: ServerMessage,
}

/// Deferred transition to arm after an operation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Move a waiting match to active after the start delay.
    Start { match_id: Uuid, delay: Duration },
    /// Expire an active match once its duration elapses.
    End { match_id: Uuid, delay: Duration },
    /// Delete a finished match and release its players.
    Cleanup { match_id: Uuid, delay: Duration },
}

/// Events and timers produced by one matchmaker operation.
#[derive(Debug, Default)]
pub struct Outcome {
    pub outbound: Vec<Outbound>,
    pub timers: Vec<Timer>,
}

impl Outcome {
    fn unicast(&mut self, to: Uuid, message: ServerMessage) {
        self.outbound.push(Outbound {
            to: vec![to],
            message,
        });
    }

    fn broadcast(&mut self, to: Vec<Uuid>, message: ServerMessage) {
        self.outbound.push(Outbound { to, message });
    }
}

/// Authoritative owner of the queue, all live matches, and the player indices.
///
/// For every player id, at most one of the queue and `player_to_match`
/// contains it; `connection_to_player` is the gateway side table mapping
/// socket connections back to the identity that joined through them.
pub struct Matchmaker {
    config: AppConfig,
    queue: IndexMap<String, Player>,
    matches: IndexMap<Uuid, Match>,
    player_to_match: HashMap<String, Uuid>,
    connection_to_player: HashMap<Uuid, String>,
}

impl Matchmaker {
    /// Build an empty matchmaker with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            queue: IndexMap::new(),
            matches: IndexMap::new(),
            player_to_match: HashMap::new(),
            connection_to_player: HashMap::new(),
        }
    }

    /// Append a player to the waiting queue, pairing a match when enough
    /// players are available.
    pub fn join_queue(
        &mut self,
        player_id: &str,
        username: &str,
        connection_id: Uuid,
    ) -> Result<Outcome, MatchmakingError> {
        if self.queue.contains_key(player_id) {
            return Err(MatchmakingError::AlreadyQueued);
        }
        if self.player_to_match.contains_key(player_id) {
            return Err(MatchmakingError::AlreadyInMatch);
        }

        let player = Player::new(player_id, username, connection_id);
        self.queue.insert(player_id.to_string(), player);
        self.connection_to_player
            .insert(connection_id, player_id.to_string());

        info!(player_id, position = self.queue.len(), "player joined queue");

        let mut outcome = Outcome::default();
        outcome.unicast(
            connection_id,
            ServerMessage::QueueJoined {
                position: self.queue.len(),
            },
        );
        self.pair_waiting_players(&mut outcome);

        Ok(outcome)
    }

    /// Remove a waiting player from the queue.
    pub fn leave_queue(&mut self, player_id: &str) -> Result<Outcome, MatchmakingError> {
        let player = self
            .queue
            .shift_remove(player_id)
            .ok_or(MatchmakingError::NotQueued)?;
        self.connection_to_player.remove(&player.connection_id);

        info!(player_id, "player left queue");

        let mut outcome = Outcome::default();
        outcome.unicast(player.connection_id, ServerMessage::QueueLeft);
        Ok(outcome)
    }

    /// Flag a player as ready; starts the match early once everyone is.
    pub fn mark_ready(
        &mut self,
        player_id: &str,
        match_id: Uuid,
        now_ms: u64,
    ) -> Result<Outcome, MatchmakingError> {
        let game = self
            .matches
            .get_mut(&match_id)
            .ok_or(MatchmakingError::MatchNotFound)?;
        let player = game
            .players
            .get_mut(player_id)
            .ok_or(MatchmakingError::NotInMatch)?;
        player.ready = true;

        if game.phase == MatchPhase::Waiting && game.all_ready() {
            info!(%match_id, "all players ready, starting early");
            return Ok(self.start_match(match_id, now_ms));
        }

        Ok(Outcome::default())
    }

    /// Validate one tap and, when accepted, count it and notify the match.
    pub fn submit_tap(
        &mut self,
        player_id: &str,
        match_id: Uuid,
        client_timestamp_ms: u64,
        now_ms: u64,
    ) -> Result<Outcome, MatchmakingError> {
        let game = self
            .matches
            .get_mut(&match_id)
            .ok_or(MatchmakingError::MatchNotFound)?;
        if !game.players.contains_key(player_id) {
            return Err(MatchmakingError::NotInMatch);
        }
        if !game.phase.accepts_taps() {
            return Err(MatchmakingError::MatchNotActive);
        }

        let roster = game.roster_connections();
        let player = game
            .players
            .get_mut(player_id)
            .ok_or(MatchmakingError::NotInMatch)?;

        tap::check_tap(
            player.last_tap_at_ms,
            now_ms,
            client_timestamp_ms,
            &self.config,
        )
        .map_err(MatchmakingError::InvalidTap)?;

        player.validated_taps += 1;
        player.last_tap_at_ms = now_ms;

        let mut outcome = Outcome::default();
        outcome.broadcast(
            roster,
            ServerMessage::PlayerTapped {
                player_id: player.id.clone(),
                username: player.username.clone(),
                tap_count: player.validated_taps,
            },
        );
        outcome.unicast(
            player.connection_id,
            ServerMessage::TapConfirmed {
                tap_count: player.validated_taps,
            },
        );
        Ok(outcome)
    }

    /// Idempotent cleanup for a dropped connection: leaves the queue, or
    /// leaves the match roster, abandoning the match once nobody remains.
    pub fn on_disconnect(&mut self, connection_id: Uuid, now_ms: u64) -> Outcome {
        let mut outcome = Outcome::default();

        let Some(player_id) = self.connection_to_player.remove(&connection_id) else {
            return outcome;
        };

        if self.queue.shift_remove(&player_id).is_some() {
            info!(player_id, "queued player disconnected");
            return outcome;
        }

        let Some(match_id) = self.player_to_match.remove(&player_id) else {
            return outcome;
        };
        let Some(game) = self.matches.get_mut(&match_id) else {
            return outcome;
        };

        game.players.shift_remove(&player_id);
        info!(player_id, %match_id, "player disconnected from match");

        if game.phase == MatchPhase::Finished {
            return outcome;
        }

        outcome.broadcast(
            game.roster_connections(),
            ServerMessage::PlayerDisconnected {
                player_id: player_id.clone(),
            },
        );

        if game.players.is_empty() {
            game.cancel_start_timer();
            match game.phase.apply(MatchEvent::Abandon) {
                Ok(next) => game.phase = next,
                Err(err) => {
                    warn!(%match_id, error = %err, "failed to abandon emptied match");
                    return outcome;
                }
            }
            game.ended_at_ms = Some(now_ms);
            game.winner_id = None;
            info!(%match_id, "match abandoned, roster empty");
            outcome.timers.push(Timer::Cleanup {
                match_id,
                delay: self.config.cleanup_delay(),
            });
        }

        outcome
    }

    /// Move a waiting match to active and arm its duration timer.
    ///
    /// Idempotent: invoked both by the deferred start timer and by the
    /// all-ready early start, whichever comes first wins and the loser is a
    /// silent no-op.
    pub fn start_match(&mut self, match_id: Uuid, now_ms: u64) -> Outcome {
        let mut outcome = Outcome::default();

        let Some(game) = self.matches.get_mut(&match_id) else {
            return outcome;
        };
        if game.phase != MatchPhase::Waiting {
            return outcome;
        }

        game.cancel_start_timer();
        let launched = game
            .phase
            .apply(MatchEvent::Begin)
            .and_then(|phase| phase.apply(MatchEvent::Launch));
        match launched {
            Ok(next) => game.phase = next,
            Err(err) => {
                warn!(%match_id, error = %err, "failed to launch match");
                return outcome;
            }
        }
        game.started_at_ms = Some(now_ms);

        info!(%match_id, duration_ms = game.duration_ms, "match started");

        outcome.broadcast(
            game.roster_connections(),
            ServerMessage::MatchStarted {
                match_id,
                duration: game.duration_ms,
                start_time: now_ms,
            },
        );
        outcome.timers.push(Timer::End {
            match_id,
            delay: Duration::from_millis(game.duration_ms),
        });

        outcome
    }

    /// Freeze an active match, decide the winner, and publish the results.
    ///
    /// Idempotent: a duration timer firing after an abandon (or after a
    /// previous end) finds the match past active and does nothing.
    pub fn end_match(&mut self, match_id: Uuid, now_ms: u64) -> Outcome {
        let mut outcome = Outcome::default();

        let Some(game) = self.matches.get_mut(&match_id) else {
            return outcome;
        };
        if game.phase != MatchPhase::Active {
            return outcome;
        }

        match game.phase.apply(MatchEvent::Expire) {
            Ok(next) => game.phase = next,
            Err(err) => {
                warn!(%match_id, error = %err, "failed to expire match");
                return outcome;
            }
        }
        game.ended_at_ms = Some(now_ms);
        game.winner_id = game.decide_winner();

        let winner_id = game.winner_id.clone();
        let results: Vec<PlayerResult> = game
            .standings()
            .into_iter()
            .map(|player| PlayerResult {
                id: player.id.clone(),
                username: player.username.clone(),
                taps: player.validated_taps,
                is_winner: winner_id.as_deref() == Some(player.id.as_str()),
            })
            .collect();

        info!(%match_id, winner = ?winner_id, "match ended");

        outcome.broadcast(
            game.roster_connections(),
            ServerMessage::MatchEnded {
                match_id,
                results,
                winner_id,
            },
        );
        outcome.timers.push(Timer::Cleanup {
            match_id,
            delay: self.config.cleanup_delay(),
        });

        outcome
    }

    /// Delete a finished match and release every index entry of its roster.
    pub fn cleanup_match(&mut self, match_id: Uuid) -> Outcome {
        if let Some(game) = self.matches.shift_remove(&match_id) {
            for player in game.players.values() {
                self.player_to_match.remove(&player.id);
                self.connection_to_player.remove(&player.connection_id);
            }
            info!(%match_id, "match cleaned up");
        }

        Outcome::default()
    }

    /// Store the abort handle of a freshly armed deferred start.
    ///
    /// If the match already moved past waiting (or is gone), the timer task
    /// it belongs to has nothing left to do and is aborted on the spot.
    pub fn set_start_timer(&mut self, match_id: Uuid, handle: AbortHandle) {
        match self.matches.get_mut(&match_id) {
            Some(game) if game.phase == MatchPhase::Waiting => {
                game.start_timer = Some(handle);
            }
            _ => handle.abort(),
        }
    }

    /// Number of players currently waiting to be paired.
    pub fn queued_players(&self) -> usize {
        self.queue.len()
    }

    /// Number of matches currently accepting taps.
    pub fn active_matches(&self) -> usize {
        self.matches
            .values()
            .filter(|game| game.phase == MatchPhase::Active)
            .count()
    }

    /// Phase of a match, if it still exists.
    pub fn match_phase(&self, match_id: Uuid) -> Option<MatchPhase> {
        self.matches.get(&match_id).map(|game| game.phase)
    }

    /// Winner recorded for a match, if it finished and one was decided.
    pub fn match_winner(&self, match_id: Uuid) -> Option<String> {
        self.matches
            .get(&match_id)
            .and_then(|game| game.winner_id.clone())
    }

    /// Drain the front of the queue into new matches while enough players
    /// are waiting, FIFO.
    fn pair_waiting_players(&mut self, outcome: &mut Outcome) {
        let match_size = self.config.match_size();

        while self.queue.len() >= match_size {
            let match_id = Uuid::new_v4();
            let mut players: IndexMap<String, Player> = IndexMap::with_capacity(match_size);
            for _ in 0..match_size {
                let Some((player_id, player)) = self.queue.shift_remove_index(0) else {
                    break;
                };
                self.player_to_match.insert(player_id.clone(), match_id);
                players.insert(player_id, player);
            }

            let roster: Vec<RosterEntry> = players
                .values()
                .map(|player| RosterEntry {
                    id: player.id.clone(),
                    username: player.username.clone(),
                })
                .collect();

            let game = Match::new(match_id, players, self.config.match_duration_ms());

            info!(%match_id, players = roster.len(), "match created");

            // Unicast per participant: the broadcast room only forms once
            // everyone has learned the match id.
            for player in game.players.values() {
                outcome.unicast(
                    player.connection_id,
                    ServerMessage::MatchFound {
                        match_id,
                        players: roster.clone(),
                    },
                );
            }

            outcome.timers.push(Timer::Start {
                match_id,
                delay: self.config.start_delay(),
            });

            self.matches.insert(match_id, game);
        }
    }
}
