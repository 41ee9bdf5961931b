use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DecayConfig, ForecastConfig};
use crate::distribution::{exceedance_probabilities, poisson_at_least};
use crate::model::{GameKey, GameRecord, Metric, Role};
use crate::store::StatStore;
use crate::weighting::{time_weights, weighted_stats};

pub const DEFAULT_MIN_HISTORY: usize = 6;
pub const DEFAULT_BINS: usize = 10;

/// One forecast "outcome >= benchmark" and whether it happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryEvent {
    pub prob: f64,
    pub hit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    /// Share of events that happened.
    pub base_rate: f64,
    pub mean_pred: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub metric: Metric,
    pub players: usize,
    pub forecasts: usize,
    pub metrics: Metrics,
    pub bins: Vec<CalibrationBin>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub metrics: Vec<Metric>,
    /// Prior games a player needs before a game is scored.
    pub min_history: usize,
    pub bins: usize,
    pub lookback_games: usize,
    pub decay: DecayConfig,
}

impl BacktestConfig {
    pub fn from_forecast(config: &ForecastConfig) -> Self {
        Self {
            metrics: vec![
                Metric::PassingYards,
                Metric::PassingTouchdowns,
                Metric::Interceptions,
                Metric::ReceivingYards,
                Metric::RushingYards,
                Metric::Receptions,
                Metric::Touchdowns,
            ],
            min_history: DEFAULT_MIN_HISTORY,
            bins: DEFAULT_BINS,
            lookback_games: config.lookback_games,
            decay: config.decay,
        }
    }
}

/// Role whose players a metric is scored for.
pub fn metric_role(metric: Metric) -> Role {
    match metric {
        Metric::PassingYards | Metric::PassingTouchdowns | Metric::Interceptions => Role::Passer,
        _ => Role::Skill,
    }
}

/// Walk-forward calibration over every player in the store.
///
/// Each game is forecast from the games before it only, on the history-only
/// path (no opponent or team adjustment), so the numbers isolate the
/// weighting and distribution choices.
pub fn run_backtest<S: StatStore + Sync + ?Sized>(
    store: &S,
    config: &BacktestConfig,
) -> Result<Vec<MetricReport>> {
    let players = store.players()?;
    let histories = players
        .par_iter()
        .map(|p| {
            let mut games = store.season_games(p.id, None)?;
            games.reverse();
            Ok((p.position.role(), games))
        })
        .collect::<Result<Vec<(Role, Vec<GameRecord>)>>>()?;

    let mut reports = Vec::with_capacity(config.metrics.len());
    for metric in &config.metrics {
        let role = metric_role(*metric);
        let per_player: Vec<Vec<BinaryEvent>> = histories
            .par_iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, games)| walk_forward_events(games, *metric, config))
            .collect();
        let players = per_player.iter().filter(|e| !e.is_empty()).count();
        let events: Vec<BinaryEvent> = per_player.into_iter().flatten().collect();
        debug!(metric = %metric, players, events = events.len(), "backtest metric scored");

        reports.push(MetricReport {
            metric: *metric,
            players,
            forecasts: events.len() / metric.benchmarks().len().max(1),
            metrics: evaluate_events(&events),
            bins: calibration_bins(&events, config.bins),
        });
    }
    Ok(reports)
}

/// `games` oldest first. Every game after `min_history` is forecast from the
/// preceding `lookback_games` and scored against each benchmark.
pub fn walk_forward_events(
    games: &[GameRecord],
    metric: Metric,
    config: &BacktestConfig,
) -> Vec<BinaryEvent> {
    let mut events = Vec::new();
    for idx in config.min_history.max(1)..games.len() {
        let start = idx.saturating_sub(config.lookback_games);
        let prior = &games[start..idx];
        let values: Vec<f64> = prior.iter().map(|g| metric.value(&g.stats)).collect();
        let keys: Vec<GameKey> = prior.iter().map(|g| g.key).collect();
        let Some(stats) = weighted_stats(&values, &time_weights(&keys, &config.decay)) else {
            continue;
        };
        if stats.mean <= 0.0 {
            continue;
        }

        let realized = metric.value(&games[idx].stats);
        let benchmarks = metric.benchmarks();
        if metric.is_count() {
            for &k in benchmarks {
                events.push(BinaryEvent {
                    prob: poisson_at_least(stats.mean, k),
                    hit: realized >= f64::from(k),
                });
            }
        } else {
            let std = metric.variance_floor().apply(stats.std, stats.mean);
            for (t, pct) in exceedance_probabilities(stats.mean, std, benchmarks) {
                events.push(BinaryEvent {
                    prob: pct / 100.0,
                    hit: realized >= f64::from(t),
                });
            }
        }
    }
    events
}

pub fn evaluate_events(events: &[BinaryEvent]) -> Metrics {
    if events.is_empty() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            base_rate: 0.0,
            mean_pred: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut hits = 0usize;
    let mut pred_sum = 0.0_f64;
    for e in events {
        let p = e.prob.clamp(0.0, 1.0);
        let y = if e.hit { 1.0 } else { 0.0 };
        brier_sum += (p - y).powi(2);
        let actual_prob = (if e.hit { p } else { 1.0 - p }).clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();
        pred_sum += p;
        if e.hit {
            hits += 1;
        }
    }

    let n = events.len() as f64;
    Metrics {
        samples: events.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        base_rate: hits as f64 / n,
        mean_pred: pred_sum / n,
    }
}

pub fn calibration_bins(events: &[BinaryEvent], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for e in events {
        let p = e.prob.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        if e.hit {
            actual_sum[idx] += 1.0;
        }
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (avg_pred, actual_rate) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            CalibrationBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                avg_pred,
                actual_rate,
            }
        })
        .collect()
}

/// Count-weighted gap between predicted and realized rates across bins.
pub fn expected_calibration_error(bins: &[CalibrationBin]) -> f64 {
    let total: usize = bins.iter().map(|b| b.count).sum();
    if total == 0 {
        return 0.0;
    }
    bins.iter()
        .map(|b| b.count as f64 * (b.avg_pred - b.actual_rate).abs())
        .sum::<f64>()
        / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StatField, StatLine};

    fn game(week: u32, tds: f64) -> GameRecord {
        GameRecord {
            subject_id: 1,
            key: GameKey::new(2024, week),
            opponent: None,
            stats: StatLine::new().with(StatField::PassingTouchdowns, tds),
        }
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            min_history: 3,
            ..BacktestConfig::from_forecast(&ForecastConfig::default())
        }
    }

    #[test]
    fn perfect_forecasts_score_zero_brier() {
        let events = [
            BinaryEvent { prob: 1.0, hit: true },
            BinaryEvent { prob: 0.0, hit: false },
        ];
        let m = evaluate_events(&events);
        assert_eq!(m.brier, 0.0);
        assert!(m.log_loss < 1e-9);
        assert_eq!(m.base_rate, 0.5);
    }

    #[test]
    fn coin_flip_brier_is_quarter() {
        let events = [
            BinaryEvent { prob: 0.5, hit: true },
            BinaryEvent { prob: 0.5, hit: false },
        ];
        let m = evaluate_events(&events);
        assert!((m.brier - 0.25).abs() < 1e-12);
        assert!((m.log_loss - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn bins_cover_unit_interval() {
        let events = [
            BinaryEvent { prob: 0.05, hit: false },
            BinaryEvent { prob: 0.95, hit: true },
            BinaryEvent { prob: 1.0, hit: true },
        ];
        let bins = calibration_bins(&events, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 2);
        assert_eq!(bins[9].actual_rate, 1.0);
        assert!(expected_calibration_error(&bins) < 0.05);
    }

    #[test]
    fn walk_forward_uses_only_prior_games() {
        let games: Vec<GameRecord> = (1..=5).map(|w| game(w, 2.0)).collect();
        let events = walk_forward_events(&games, Metric::PassingTouchdowns, &config());
        // Weeks 4 and 5 are scored, four thresholds each.
        assert_eq!(events.len(), 8);
        assert!(events[0].hit && events[1].hit && !events[2].hit);
    }

    #[test]
    fn zero_mean_history_is_not_scored() {
        let games: Vec<GameRecord> = (1..=5).map(|w| game(w, 0.0)).collect();
        assert!(walk_forward_events(&games, Metric::PassingTouchdowns, &config()).is_empty());
    }

    #[test]
    fn metrics_route_to_roles() {
        assert_eq!(metric_role(Metric::Interceptions), Role::Passer);
        assert_eq!(metric_role(Metric::Receptions), Role::Skill);
    }
}
