//! Application-level configuration loading for matchmaking and tap validation.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TAP_RUSH_BACK_CONFIG_PATH";

/// Default number of players paired into a single match.
const DEFAULT_MATCH_SIZE: usize = 2;
/// Default match length in milliseconds.
const DEFAULT_MATCH_DURATION_MS: u64 = 30_000;
/// Default delay between pairing and the match going live, in milliseconds.
const DEFAULT_START_DELAY_MS: u64 = 2_000;
/// Default delay before a finished match is removed, in milliseconds.
const DEFAULT_CLEANUP_DELAY_MS: u64 = 5_000;
/// Default cap on accepted taps per second per player.
const DEFAULT_MAX_TAPS_PER_SECOND: u32 = 10;
/// Default tolerance between client and server clocks, in milliseconds.
const DEFAULT_TAP_CLOCK_SKEW_WINDOW_MS: u64 = 100;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    match_size: usize,
    match_duration_ms: u64,
    start_delay_ms: u64,
    cleanup_delay_ms: u64,
    max_taps_per_second: u32,
    tap_clock_skew_window_ms: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        match_size = config.match_size,
                        match_duration_ms = config.match_duration_ms,
                        "loaded matchmaking configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Number of players drained from the queue into one match.
    pub fn match_size(&self) -> usize {
        self.match_size
    }

    /// Fixed match length in milliseconds.
    pub fn match_duration_ms(&self) -> u64 {
        self.match_duration_ms
    }

    /// Fixed match length as a [`Duration`] for timer arming.
    pub fn match_duration(&self) -> Duration {
        Duration::from_millis(self.match_duration_ms)
    }

    /// Delay between pairing and the match going live.
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Delay before a finished match is deleted.
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    /// Minimum accepted interval between two taps of one player, in milliseconds.
    pub fn min_tap_interval_ms(&self) -> u64 {
        1_000 / u64::from(self.max_taps_per_second)
    }

    /// Maximum tolerated distance between client and server clocks, in milliseconds.
    pub fn clock_skew_window_ms(&self) -> u64 {
        self.tap_clock_skew_window_ms
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            match_size: DEFAULT_MATCH_SIZE,
            match_duration_ms: DEFAULT_MATCH_DURATION_MS,
            start_delay_ms: DEFAULT_START_DELAY_MS,
            cleanup_delay_ms: DEFAULT_CLEANUP_DELAY_MS,
            max_taps_per_second: DEFAULT_MAX_TAPS_PER_SECOND,
            tap_clock_skew_window_ms: DEFAULT_TAP_CLOCK_SKEW_WINDOW_MS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
pub(crate) struct RawConfig {
    pub(crate) match_size: Option<usize>,
    pub(crate) match_duration_ms: Option<u64>,
    pub(crate) start_delay_ms: Option<u64>,
    pub(crate) cleanup_delay_ms: Option<u64>,
    pub(crate) max_taps_per_second: Option<u32>,
    pub(crate) tap_clock_skew_window_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let match_size = value
            .match_size
            .unwrap_or(DEFAULT_MATCH_SIZE)
            .max(DEFAULT_MATCH_SIZE);
        let max_taps_per_second = value
            .max_taps_per_second
            .unwrap_or(DEFAULT_MAX_TAPS_PER_SECOND)
            .max(1);

        Self {
            match_size,
            match_duration_ms: value.match_duration_ms.unwrap_or(DEFAULT_MATCH_DURATION_MS),
            start_delay_ms: value.start_delay_ms.unwrap_or(DEFAULT_START_DELAY_MS),
            cleanup_delay_ms: value.cleanup_delay_ms.unwrap_or(DEFAULT_CLEANUP_DELAY_MS),
            max_taps_per_second,
            tap_clock_skew_window_ms: value
                .tap_clock_skew_window_ms
                .unwrap_or(DEFAULT_TAP_CLOCK_SKEW_WINDOW_MS),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
