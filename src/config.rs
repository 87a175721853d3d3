//! Application-level configuration loading: quorum, timers, fall-rate bounds and scoring.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::MAX_PLAYERS;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TETRO_ARENA_CONFIG_PATH";

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Rules and timings of the game session.
    pub session: SessionConfig,
}

/// Everything the session orchestrator needs to know, with durations already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Players needed to leave the waiting room.
    pub quorum: usize,
    /// Arena inactivity allowed before the match is ended.
    pub watchdog_timeout: Duration,
    /// Delay between game over and the return to the waiting room.
    pub game_over_grace: Duration,
    /// Best final score that promotes game over to the fullscreen scoreboard.
    pub scoreboard_milestone: Option<u64>,
    /// Seed for candidate draws; random when unset.
    pub rng_seed: Option<u64>,
    /// Pool size of the anonymous trade channel.
    pub random_trade_pair_count: u32,
    /// Voting cadence.
    pub voting: VotingConfig,
    /// Fall-rate bounds.
    pub fall_rate: FallRateConfig,
    /// Score scaling and penalty.
    pub scoring: ScoringConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quorum: MAX_PLAYERS as usize,
            watchdog_timeout: Duration::from_secs(5),
            game_over_grace: Duration::from_secs(30),
            scoreboard_milestone: None,
            rng_seed: None,
            random_trade_pair_count: 1,
            voting: VotingConfig::default(),
            fall_rate: FallRateConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Cadence of the audience vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingConfig {
    /// Time between two first rounds.
    pub cycle_period: Duration,
    /// How long each round stays open before the decision.
    pub window: Duration,
    /// Interval between two countdown steps.
    pub tick_interval: Duration,
    /// Countdown value every round starts from.
    pub countdown_start: u32,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            cycle_period: Duration::from_secs(44),
            window: Duration::from_secs(12),
            tick_interval: Duration::from_secs(1),
            countdown_start: 10,
        }
    }
}

/// Bounds of the fall-rate level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallRateConfig {
    /// Level at the start of every match.
    pub base: u32,
    /// Lowest reachable level.
    pub min: u32,
    /// Highest reachable level.
    pub max: u32,
}

impl Default for FallRateConfig {
    fn default() -> Self {
        Self {
            base: 1,
            min: 1,
            max: 10,
        }
    }
}

/// How raw points turn into score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScaling {
    /// Level is ignored.
    Flat,
    /// Raw amount times level.
    Linear,
    /// Raw amount times level squared.
    Quadratic,
}

/// Score rules applied by the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringConfig {
    /// How the level multiplies raw points.
    pub scaling: ScoreScaling,
    /// Raw amount removed by `losePoints`.
    pub penalty: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scaling: ScoreScaling::Linear,
            penalty: 3,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        quorum = app_config.session.quorum,
                        "loaded session config"
                    );
                    app_config
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

    /// Parse a JSON document; absent keys keep their default.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        let raw: RawConfig = serde_json::from_str(contents)?;
        Ok(raw.into())
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    session: RawSession,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSession {
    quorum: Option<usize>,
    watchdog_timeout_ms: Option<u64>,
    game_over_grace_ms: Option<u64>,
    scoreboard_milestone: Option<u64>,
    rng_seed: Option<u64>,
    random_trade_pair_count: Option<u32>,
    voting: RawVoting,
    fall_rate: RawFallRate,
    scoring: RawScoring,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVoting {
    cycle_period_ms: Option<u64>,
    window_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    countdown_start: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFallRate {
    base: Option<u32>,
    min: Option<u32>,
    max: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScoring {
    scaling: Option<ScoreScaling>,
    penalty: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            session: value.session.into(),
        }
    }
}

impl From<RawSession> for SessionConfig {
    fn from(value: RawSession) -> Self {
        let defaults = SessionConfig::default();
        let quorum = value.quorum.unwrap_or(defaults.quorum);
        let quorum = if (1..=MAX_PLAYERS as usize).contains(&quorum) {
            quorum
        } else {
            warn!(quorum, "quorum out of range; clamping");
            quorum.clamp(1, MAX_PLAYERS as usize)
        };

        Self {
            quorum,
            watchdog_timeout: millis_or(value.watchdog_timeout_ms, defaults.watchdog_timeout),
            game_over_grace: millis_or(value.game_over_grace_ms, defaults.game_over_grace),
            scoreboard_milestone: value.scoreboard_milestone,
            rng_seed: value.rng_seed,
            random_trade_pair_count: value
                .random_trade_pair_count
                .unwrap_or(defaults.random_trade_pair_count),
            voting: value.voting.into(),
            fall_rate: value.fall_rate.into(),
            scoring: ScoringConfig {
                scaling: value.scoring.scaling.unwrap_or(defaults.scoring.scaling),
                penalty: value.scoring.penalty.unwrap_or(defaults.scoring.penalty),
            },
        }
    }
}

impl From<RawVoting> for VotingConfig {
    fn from(value: RawVoting) -> Self {
        let defaults = VotingConfig::default();
        Self {
            cycle_period: millis_or(value.cycle_period_ms, defaults.cycle_period),
            window: millis_or(value.window_ms, defaults.window),
            tick_interval: millis_or(value.tick_interval_ms, defaults.tick_interval),
            countdown_start: value.countdown_start.unwrap_or(defaults.countdown_start),
        }
    }
}

impl From<RawFallRate> for FallRateConfig {
    fn from(value: RawFallRate) -> Self {
        let defaults = FallRateConfig::default();
        let min = value.min.unwrap_or(defaults.min);
        let max = value.max.unwrap_or(defaults.max).max(min);
        let requested = value.base.unwrap_or(defaults.base);
        let base = requested.clamp(min, max);
        if base != requested {
            warn!(requested, base, "fall rate base outside bounds; clamping");
        }
        Self { base, min, max }
    }
}

/// Zero durations would spin timers; treat them as unset.
fn millis_or(value: Option<u64>, default: Duration) -> Duration {
    value
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
