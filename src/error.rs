use thiserror::Error;

/// Reason a submitted tap failed server-side validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TapRejection {
    /// Client timestamp is too far from the server clock in either direction.
    #[error("clock skew")]
    ClockSkew,
    /// Tap arrived before the per-player minimum interval elapsed.
    #[error("rate limited")]
    RateLimited,
}

/// Errors surfaced to an offending connection as an `error` event.
///
/// These never leave the connection that caused them and never alter
/// match state; the `Display` string becomes the event's `message` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchmakingError {
    #[error("already queued")]
    AlreadyQueued,
    #[error("already in a match")]
    AlreadyInMatch,
    #[error("not queued")]
    NotQueued,
    #[error("match not found")]
    MatchNotFound,
    #[error("not in this match")]
    NotInMatch,
    #[error("match is not active")]
    MatchNotActive,
    #[error("invalid tap: {0}")]
    InvalidTap(#[from] TapRejection),
    #[error("bad payload")]
    BadPayload,
}
