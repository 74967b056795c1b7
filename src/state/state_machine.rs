use thiserror::Error;

/// Lifecycle phases a match moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Roster is assembled; the deferred start timer is pending.
    Waiting,
    /// Start has been triggered and the match is about to go live.
    Starting,
    /// Taps are accepted; the duration timer is running.
    Active,
    /// Final scores are fixed; the match awaits cleanup.
    Finished,
}

/// Events that drive a match from one phase to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// The start delay elapsed or every player reported ready.
    Begin,
    /// The match goes live and taps start counting.
    Launch,
    /// The duration timer expired.
    Expire,
    /// Every player disconnected before the match could end normally.
    Abandon,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the match was in when the invalid event was received.
    pub from: MatchPhase,
    /// The event that cannot be applied from this phase.
    pub event: MatchEvent,
}

impl MatchPhase {
    /// Compute the next phase for an event, rejecting transitions that skip
    /// or rewind the lifecycle.
    ///
    /// `Abandon` is accepted from every non-finished phase: a roster can
    /// empty out while waiting for the start timer just as well as mid-game.
    pub fn apply(self, event: MatchEvent) -> Result<Self, InvalidTransition> {
        let next = match (self, event) {
            (Self::Waiting, MatchEvent::Begin) => Self::Starting,
            (Self::Starting, MatchEvent::Launch) => Self::Active,
            (Self::Active, MatchEvent::Expire) => Self::Finished,
            (Self::Waiting | Self::Starting | Self::Active, MatchEvent::Abandon) => Self::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// Whether taps may still be accepted for this match.
    pub fn accepts_taps(self) -> bool {
        self == Self::Active
    }
}
