use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::Metric;

pub const DEFAULT_LOOKBACK_GAMES: usize = 20;
pub const DEFAULT_BLEND_WEIGHT: f64 = 0.7;
pub const CURRENT_SEASON_WEIGHT: f64 = 2.0;
pub const WEEK_DECAY_FACTOR: f64 = 0.95;
pub const SEASON_DECAY_FACTOR: f64 = 0.7;
pub const LEAGUE_PASS_RATE_FALLBACK: f64 = 0.58;

/// League-wide reference figures used when the matchup model cannot run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeagueReference {
    pub passing_allowed: f64,
    pub rushing_allowed: f64,
    pub receptions_passing_allowed: f64,
    pub total_allowed: f64,
    pub points_allowed: f64,
}

impl Default for LeagueReference {
    fn default() -> Self {
        Self {
            passing_allowed: 220.0,
            rushing_allowed: 120.0,
            receptions_passing_allowed: 250.0,
            total_allowed: 340.0,
            points_allowed: 22.0,
        }
    }
}

impl LeagueReference {
    pub fn for_metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::ReceivingYards | Metric::PassingYards => self.passing_allowed,
            Metric::RushingYards => self.rushing_allowed,
            Metric::Receptions => self.receptions_passing_allowed,
            Metric::TotalYards => self.total_allowed,
            Metric::Touchdowns | Metric::PassingTouchdowns | Metric::Interceptions => {
                self.points_allowed
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    pub current_season_weight: f64,
    pub week_decay: f64,
    pub season_decay: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            current_season_weight: CURRENT_SEASON_WEIGHT,
            week_decay: WEEK_DECAY_FACTOR,
            season_decay: SEASON_DECAY_FACTOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Most recent per-game rows pulled for a player's own history.
    pub lookback_games: usize,
    /// Window for the share estimator.
    pub share_lookback_games: usize,
    /// Weight of the matchup-adjusted projection; history gets the remainder.
    pub blend_weight: f64,
    pub decay: DecayConfig,
    pub league_pass_rate_fallback: f64,
    pub reference: LeagueReference,
    /// Pin the "current season" instead of reading the latest one in the store.
    pub season: Option<i32>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback_games: DEFAULT_LOOKBACK_GAMES,
            share_lookback_games: DEFAULT_LOOKBACK_GAMES,
            blend_weight: DEFAULT_BLEND_WEIGHT,
            decay: DecayConfig::default(),
            league_pass_rate_fallback: LEAGUE_PASS_RATE_FALLBACK,
            reference: LeagueReference::default(),
            season: None,
        }
    }
}

impl ForecastConfig {
    /// Defaults overridden by `FORECAST_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            lookback_games: env_parse("FORECAST_LOOKBACK_GAMES")
                .unwrap_or(d.lookback_games)
                .clamp(1, 200),
            share_lookback_games: env_parse("FORECAST_SHARE_LOOKBACK_GAMES")
                .unwrap_or(d.share_lookback_games)
                .clamp(1, 200),
            blend_weight: env_parse("FORECAST_BLEND_WEIGHT")
                .unwrap_or(d.blend_weight)
                .clamp(0.0, 1.0),
            decay: DecayConfig {
                current_season_weight: env_parse("FORECAST_CURRENT_SEASON_WEIGHT")
                    .unwrap_or(d.decay.current_season_weight)
                    .clamp(0.1, 2.0),
                week_decay: env_parse("FORECAST_WEEK_DECAY")
                    .unwrap_or(d.decay.week_decay)
                    .clamp(0.5, 1.0),
                season_decay: env_parse("FORECAST_SEASON_DECAY")
                    .unwrap_or(d.decay.season_decay)
                    .clamp(0.1, 1.0),
            },
            league_pass_rate_fallback: env_parse("FORECAST_LEAGUE_PASS_RATE")
                .unwrap_or(d.league_pass_rate_fallback)
                .clamp(0.0, 1.0),
            reference: LeagueReference {
                passing_allowed: env_parse("FORECAST_REF_PASSING_ALLOWED")
                    .unwrap_or(d.reference.passing_allowed)
                    .max(1.0),
                rushing_allowed: env_parse("FORECAST_REF_RUSHING_ALLOWED")
                    .unwrap_or(d.reference.rushing_allowed)
                    .max(1.0),
                receptions_passing_allowed: env_parse("FORECAST_REF_RECEPTIONS_ALLOWED")
                    .unwrap_or(d.reference.receptions_passing_allowed)
                    .max(1.0),
                total_allowed: env_parse("FORECAST_REF_TOTAL_ALLOWED")
                    .unwrap_or(d.reference.total_allowed)
                    .max(1.0),
                points_allowed: env_parse("FORECAST_REF_POINTS_ALLOWED")
                    .unwrap_or(d.reference.points_allowed)
                    .max(1.0),
            },
            season: env_parse("FORECAST_SEASON"),
        }
    }

    pub fn league_rush_rate_fallback(&self) -> f64 {
        1.0 - self.league_pass_rate_fallback
    }
}

/// Loads `.env.local` then `.env` if present. Missing files are not an error.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join("gridiron_props"));
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join("gridiron_props"))
}

pub fn db_path_from_env() -> Option<PathBuf> {
    env::var("FORECAST_DB_PATH")
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}
