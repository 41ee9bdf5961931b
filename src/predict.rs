use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ForecastConfig;
use crate::defense::defensive_baseline;
use crate::distribution::{
    at_least_probabilities, consistency_score, exceedance_probabilities, percent,
    poisson_at_least, poisson_exact, round_to, zero_probabilities,
};
use crate::error::ForecastError;
use crate::model::{
    DefenseCategory, GameKey, GameRecord, LeagueTendency, Metric, Player, Role, StatField, Team,
    TeamOffensiveProfile, Tendency,
};
use crate::projection::{BlendInputs, ProjectionPath, blend_projection, touchdown_factor};
use crate::share::{player_share, share_estimate};
use crate::store::StatStore;
use crate::tendency::{league_tendency, offensive_profile};
use crate::weighting::{WeightedStats, time_weights, weighted_stats};

/// Normal-model forecast for a continuous stat (yardage, receptions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkForecast {
    pub metric: Metric,
    /// Benchmark -> P(outcome >= benchmark), percent.
    pub probabilities: BTreeMap<u32, f64>,
    pub projected: f64,
    pub player_avg: f64,
    pub player_std: f64,
    /// Std-dev actually fed to the Normal model, after the floor.
    pub effective_std: f64,
    pub opponent_avg_allowed: Option<f64>,
    pub share: Option<f64>,
    pub tendency_multiplier: Option<f64>,
    pub adjusted_defense: Option<f64>,
    pub consistency: f64,
    pub path: ProjectionPath,
    pub games_used: usize,
}

impl BenchmarkForecast {
    fn empty(metric: Metric, games_used: usize) -> Self {
        Self {
            metric,
            probabilities: zero_probabilities(metric.benchmarks()),
            projected: 0.0,
            player_avg: 0.0,
            player_std: 0.0,
            effective_std: 0.0,
            opponent_avg_allowed: None,
            share: None,
            tendency_multiplier: None,
            adjusted_defense: None,
            consistency: 0.0,
            path: ProjectionPath::NoData,
            games_used,
        }
    }
}

/// Poisson-model forecast for a count stat (touchdowns, interceptions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountForecast {
    pub metric: Metric,
    /// Threshold k -> P(X >= k), percent.
    pub probabilities: BTreeMap<u32, f64>,
    pub at_least_one: f64,
    /// Adjusted per-game rate (the Poisson lambda).
    pub avg_per_game: f64,
    pub player_avg: f64,
    pub opponent_factor: f64,
    pub opponent_points_allowed: Option<f64>,
    pub consistency: f64,
    pub path: ProjectionPath,
    pub games_used: usize,
}

impl CountForecast {
    fn empty(metric: Metric, games_used: usize) -> Self {
        Self {
            metric,
            probabilities: zero_probabilities(metric.benchmarks()),
            at_least_one: 0.0,
            avg_per_game: 0.0,
            player_avg: 0.0,
            opponent_factor: 1.0,
            opponent_points_allowed: None,
            consistency: 0.0,
            path: ProjectionPath::NoData,
            games_used,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptionForecast {
    pub prob_0_ints: f64,
    pub prob_1_int: f64,
    pub prob_2plus_ints: f64,
    pub avg_ints_per_game: f64,
    pub counts: CountForecast,
}

impl InterceptionForecast {
    fn from_counts(counts: CountForecast) -> Self {
        let lambda = counts.avg_per_game;
        // No observed interceptions: report zeros rather than a certain 0.
        let (p0, p1, p2) = if counts.path == ProjectionPath::NoData {
            (0.0, 0.0, 0.0)
        } else {
            (
                percent(poisson_exact(lambda, 0)),
                percent(poisson_exact(lambda, 1)),
                percent(poisson_at_least(lambda, 2)),
            )
        };
        Self {
            prob_0_ints: p0,
            prob_1_int: p1,
            prob_2plus_ints: p2,
            avg_ints_per_game: lambda,
            counts,
        }
    }
}

/// Full role-dispatched payload for one player against one opponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPrediction {
    pub player: Player,
    pub opponent: Team,
    pub role: Role,
    pub season: Option<i32>,
    pub games_used: usize,
    #[serde(rename = "passing_predictions", skip_serializing_if = "Option::is_none")]
    pub passing: Option<BenchmarkForecast>,
    #[serde(rename = "passing_td_prediction", skip_serializing_if = "Option::is_none")]
    pub passing_touchdowns: Option<CountForecast>,
    #[serde(rename = "interception_prediction", skip_serializing_if = "Option::is_none")]
    pub interceptions: Option<InterceptionForecast>,
    #[serde(rename = "receiving_predictions", skip_serializing_if = "Option::is_none")]
    pub receiving: Option<BenchmarkForecast>,
    #[serde(rename = "rushing_predictions", skip_serializing_if = "Option::is_none")]
    pub rushing: Option<BenchmarkForecast>,
    #[serde(rename = "touchdown_prediction", skip_serializing_if = "Option::is_none")]
    pub touchdowns: Option<CountForecast>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub player_id: i64,
    pub opponent: String,
}

#[derive(Debug)]
pub struct SlateEntry {
    pub matchup: Matchup,
    pub outcome: Result<PlayerPrediction, ForecastError>,
}

struct OffenseContext {
    team: Option<TeamOffensiveProfile>,
    league: LeagueTendency,
}

/// Everything one request reads from the store, fetched once per call.
struct MatchupContext {
    player: Player,
    opponent: Team,
    games: Vec<GameRecord>,
    season: Option<i32>,
    offense: Option<OffenseContext>,
}

pub struct Forecaster<S> {
    store: S,
    config: ForecastConfig,
}

impl<S: StatStore> Forecaster<S> {
    pub fn new(store: S, config: ForecastConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn predict_player(
        &self,
        player_id: i64,
        opponent: &str,
    ) -> Result<PlayerPrediction, ForecastError> {
        let ctx = self.load(player_id, opponent, true)?;
        let role = ctx.player.position.role();

        let mut passing = None;
        let mut passing_touchdowns = None;
        let mut interceptions = None;
        let mut receiving = None;
        let mut rushing = None;
        let mut touchdowns = None;

        match role {
            Role::Passer => {
                passing = Some(self.benchmark_forecast(&ctx, Metric::PassingYards)?);
                passing_touchdowns = Some(self.count_forecast(&ctx, Metric::PassingTouchdowns)?);
                interceptions = Some(InterceptionForecast::from_counts(
                    self.count_forecast(&ctx, Metric::Interceptions)?,
                ));
                let scrambles = self.benchmark_forecast(&ctx, Metric::RushingYards)?;
                if scrambles.projected > 0.0 {
                    rushing = Some(scrambles);
                }
            }
            Role::Skill => {
                receiving = Some(self.benchmark_forecast(&ctx, Metric::ReceivingYards)?);
                rushing = Some(self.benchmark_forecast(&ctx, Metric::RushingYards)?);
                touchdowns = Some(self.count_forecast(&ctx, Metric::Touchdowns)?);
            }
        }

        Ok(PlayerPrediction {
            games_used: ctx.games.len(),
            season: ctx.season,
            role,
            player: ctx.player,
            opponent: ctx.opponent,
            passing,
            passing_touchdowns,
            interceptions,
            receiving,
            rushing,
            touchdowns,
        })
    }

    /// Continuous forecast for one yardage metric; receiving yards when
    /// `metric` is `None`.
    pub fn predict_yardage(
        &self,
        player_id: i64,
        opponent: &str,
        metric: Option<Metric>,
    ) -> Result<BenchmarkForecast, ForecastError> {
        let metric = metric.unwrap_or(Metric::ReceivingYards);
        if metric.is_count() {
            return Err(ForecastError::UnsupportedMetric(metric));
        }
        let ctx = self.load(player_id, opponent, true)?;
        self.benchmark_forecast(&ctx, metric)
    }

    pub fn predict_receptions(
        &self,
        player_id: i64,
        opponent: &str,
    ) -> Result<BenchmarkForecast, ForecastError> {
        let ctx = self.load(player_id, opponent, true)?;
        self.benchmark_forecast(&ctx, Metric::Receptions)
    }

    /// Receiving plus rushing touchdowns, modeled as one count.
    pub fn predict_touchdowns(
        &self,
        player_id: i64,
        opponent: &str,
    ) -> Result<CountForecast, ForecastError> {
        let ctx = self.load(player_id, opponent, false)?;
        self.count_forecast(&ctx, Metric::Touchdowns)
    }

    pub fn predict_passing_touchdowns(
        &self,
        player_id: i64,
        opponent: &str,
    ) -> Result<CountForecast, ForecastError> {
        let ctx = self.load(player_id, opponent, false)?;
        self.count_forecast(&ctx, Metric::PassingTouchdowns)
    }

    pub fn predict_interceptions(
        &self,
        player_id: i64,
        opponent: &str,
    ) -> Result<InterceptionForecast, ForecastError> {
        let ctx = self.load(player_id, opponent, false)?;
        Ok(InterceptionForecast::from_counts(
            self.count_forecast(&ctx, Metric::Interceptions)?,
        ))
    }

    fn load(
        &self,
        player_id: i64,
        opponent: &str,
        with_offense: bool,
    ) -> Result<MatchupContext, ForecastError> {
        let player = self
            .store
            .player(player_id)?
            .ok_or(ForecastError::PlayerNotFound(player_id))?;
        let abbr = opponent.trim().to_ascii_uppercase();
        let opponent = self
            .store
            .team_by_abbr(&abbr)?
            .ok_or(ForecastError::TeamNotFound(abbr))?;

        let games = self
            .store
            .recent_games(player_id, self.config.lookback_games)?;
        let season = self.resolve_season(&games)?;

        let offense = match season {
            Some(season) if with_offense && !games.is_empty() => Some(OffenseContext {
                team: offensive_profile(&self.store, &player.team, season)?,
                league: league_tendency(
                    &self.store,
                    season,
                    self.config.league_pass_rate_fallback,
                )?,
            }),
            _ => None,
        };

        Ok(MatchupContext {
            player,
            opponent,
            games,
            season,
            offense,
        })
    }

    fn resolve_season(&self, games: &[GameRecord]) -> anyhow::Result<Option<i32>> {
        if let Some(season) = self.config.season {
            return Ok(Some(season));
        }
        if let Some(season) = self.store.latest_season()? {
            return Ok(Some(season));
        }
        Ok(games.first().map(|g| g.key.season))
    }

    fn history_stats(&self, games: &[GameRecord], metric: Metric) -> Option<WeightedStats> {
        let values: Vec<f64> = games.iter().map(|g| metric.value(&g.stats)).collect();
        let keys: Vec<GameKey> = games.iter().map(|g| g.key).collect();
        weighted_stats(&values, &time_weights(&keys, &self.config.decay))
            .filter(|stats| stats.mean > 0.0)
    }

    fn benchmark_forecast(
        &self,
        ctx: &MatchupContext,
        metric: Metric,
    ) -> Result<BenchmarkForecast, ForecastError> {
        let games_used = ctx.games.len();
        let (Some(stats), Some(season)) = (self.history_stats(&ctx.games, metric), ctx.season)
        else {
            debug!(
                player_id = ctx.player.id,
                metric = %metric,
                games = games_used,
                "no usable history, empty forecast"
            );
            return Ok(BenchmarkForecast::empty(metric, games_used));
        };

        let opponent_mean = match metric.defense_category() {
            Some(category) => defensive_baseline(&self.store, ctx.opponent.id, season, category)?
                .map(|b| b.mean_allowed),
            None => None,
        };

        let tendency = metric.tendency();
        let mut team_rate = ctx
            .offense
            .as_ref()
            .and_then(|o| o.team)
            .map(|profile| profile.rate(tendency));
        let league_rate = match ctx.offense.as_ref() {
            Some(offense) => offense.league.rate(tendency),
            None => match tendency {
                Tendency::Pass => self.config.league_pass_rate_fallback,
                Tendency::Rush => self.config.league_rush_rate_fallback(),
                Tendency::Neutral => 1.0,
            },
        };

        let window = &ctx.games[..ctx.games.len().min(self.config.share_lookback_games)];
        let mut share = None;
        if let Some(fields) = metric.share_fields() {
            let estimate = share_estimate(
                &self.store,
                &ctx.player.team,
                fields,
                window,
                &self.config.decay,
            )?;
            share = estimate.map(|e| e.share);
            if let Some(estimate) = estimate
                && estimate.team_total <= 0.0
                && let Some(fallback) = metric.fallback_share_fields()
            {
                debug!(
                    player_id = ctx.player.id,
                    metric = %metric,
                    "team recorded no share volume, using fallback fields"
                );
                share = player_share(
                    &self.store,
                    &ctx.player.team,
                    fallback,
                    window,
                    &self.config.decay,
                )?;
            }
        }

        let team_volume = match metric.volume_field() {
            Some(field) => {
                let volume = self.team_volume(&ctx.player.team, season, field)?;
                if volume.is_none() {
                    team_rate = None;
                }
                volume
            }
            None => None,
        };

        let projection = blend_projection(&BlendInputs {
            player_mean: stats.mean,
            share,
            team_rate,
            league_rate,
            opponent_mean,
            league_reference: self.config.reference.for_metric(metric),
            team_volume,
            blend_weight: self.config.blend_weight,
        });
        if projection.path != ProjectionPath::Blended {
            debug!(
                player_id = ctx.player.id,
                opponent = %ctx.opponent.abbr,
                metric = %metric,
                path = ?projection.path,
                "matchup model unavailable, using fallback projection"
            );
        }

        let effective_std = metric.variance_floor().apply(stats.std, stats.mean);
        Ok(BenchmarkForecast {
            metric,
            probabilities: exceedance_probabilities(
                projection.value,
                effective_std,
                metric.benchmarks(),
            ),
            projected: round_to(projection.value, 1),
            player_avg: round_to(stats.mean, 1),
            player_std: round_to(stats.std, 1),
            effective_std: round_to(effective_std, 1),
            opponent_avg_allowed: opponent_mean.map(|v| round_to(v, 1)),
            share: share.map(|v| round_to(v, 3)),
            tendency_multiplier: projection.tendency_multiplier.map(|v| round_to(v, 3)),
            adjusted_defense: projection.adjusted_defense.map(|v| round_to(v, 1)),
            consistency: round_to(consistency_score(stats.mean, effective_std), 2),
            path: projection.path,
            games_used,
        })
    }

    /// Time-weighted per-game team total of `field` in `season`.
    fn team_volume(
        &self,
        team_abbr: &str,
        season: i32,
        field: StatField,
    ) -> anyhow::Result<Option<f64>> {
        let weekly = self.store.team_weekly_aggregate(team_abbr, season, field)?;
        let keys: Vec<GameKey> = weekly.keys().map(|w| GameKey::new(season, *w)).collect();
        let values: Vec<f64> = weekly.values().copied().collect();
        Ok(weighted_stats(&values, &time_weights(&keys, &self.config.decay))
            .map(|stats| stats.mean)
            .filter(|mean| *mean > 0.0))
    }

    fn count_forecast(
        &self,
        ctx: &MatchupContext,
        metric: Metric,
    ) -> Result<CountForecast, ForecastError> {
        let games_used = ctx.games.len();
        let Some(stats) = self.history_stats(&ctx.games, metric) else {
            debug!(
                player_id = ctx.player.id,
                metric = %metric,
                games = games_used,
                "no observed occurrences, empty forecast"
            );
            return Ok(CountForecast::empty(metric, games_used));
        };

        // Interceptions stay a function of the passer's own rate.
        let opponent_points = match (metric.defense_category(), ctx.season) {
            (Some(DefenseCategory::Points), Some(season)) => defensive_baseline(
                &self.store,
                ctx.opponent.id,
                season,
                DefenseCategory::Points,
            )?
            .map(|b| b.mean_allowed),
            _ => None,
        };
        let factor = touchdown_factor(opponent_points, self.config.reference.points_allowed);
        let path = if opponent_points.is_some_and(|p| p > 0.0) {
            ProjectionPath::OpponentScaled
        } else {
            ProjectionPath::Historical
        };

        let lambda = stats.mean * factor;
        Ok(CountForecast {
            metric,
            probabilities: at_least_probabilities(lambda, metric.benchmarks()),
            at_least_one: percent(poisson_at_least(lambda, 1)),
            avg_per_game: round_to(lambda, 2),
            player_avg: round_to(stats.mean, 2),
            opponent_factor: round_to(factor, 3),
            opponent_points_allowed: opponent_points.map(|v| round_to(v, 1)),
            consistency: round_to(consistency_score(stats.mean, stats.std), 2),
            path,
            games_used,
        })
    }
}

impl<S: StatStore + Sync> Forecaster<S> {
    /// Forecasts every matchup in parallel. Each entry carries its own result
    /// so one unknown player does not sink the slate.
    pub fn predict_slate(&self, matchups: &[Matchup]) -> Vec<SlateEntry> {
        matchups
            .par_iter()
            .map(|m| SlateEntry {
                matchup: m.clone(),
                outcome: self.predict_player(m.player_id, &m.opponent),
            })
            .collect()
    }
}
