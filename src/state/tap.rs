//! Authoritative tap validation against the server wall clock.

use crate::{config::AppConfig, error::TapRejection};

/// Validate one submitted tap against the player's timing state.
///
/// Rules are evaluated in order: the symmetric clock-skew window first, the
/// per-player minimum interval second. The server clock is the sole authority;
/// on acceptance the caller records `now_ms` (never the client timestamp) as
/// the player's last tap, so a client cannot advance or rewind server state.
pub fn check_tap(
    last_tap_at_ms: u64,
    now_ms: u64,
    client_timestamp_ms: u64,
    config: &AppConfig,
) -> Result<(), TapRejection> {
    if now_ms.abs_diff(client_timestamp_ms) > config.clock_skew_window_ms() {
        return Err(TapRejection::ClockSkew);
    }

    if now_ms.saturating_sub(last_tap_at_ms) < config.min_tap_interval_ms() {
        return Err(TapRejection::RateLimited);
    }

    Ok(())
}
