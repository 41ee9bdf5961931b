use serde::{Deserialize, Serialize};

use crate::config::DecayConfig;
use crate::model::{GameKey, VarianceFloor};

/// One weight per game, same order as `keys`.
///
/// The reference point is the most recent game in the series. Games from that
/// season decay weekly from `current_season_weight`; older seasons get
/// `season_decay ^ seasons_back` with no weekly term. Weights are not
/// normalized.
pub fn time_weights(keys: &[GameKey], decay: &DecayConfig) -> Vec<f64> {
    let Some(reference) = keys.iter().min_by(|a, b| a.recency_cmp(b)) else {
        return Vec::new();
    };

    keys.iter()
        .map(|key| {
            if key.season == reference.season {
                let weeks_ago = reference.week.saturating_sub(key.week);
                decay.current_season_weight * decay.week_decay.powi(weeks_ago as i32)
            } else {
                let seasons_ago = reference.season - key.season;
                decay.season_decay.powi(seasons_ago.max(1))
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedStats {
    pub mean: f64,
    pub std: f64,
    pub samples: usize,
}

/// Weighted mean and weighted population std-dev. `None` for an empty series
/// or a zero total weight.
pub fn weighted_stats(values: &[f64], weights: &[f64]) -> Option<WeightedStats> {
    if values.is_empty() || values.len() != weights.len() {
        return None;
    }
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 {
        return None;
    }

    let mean = values
        .iter()
        .zip(weights)
        .map(|(v, w)| v * w)
        .sum::<f64>()
        / weight_sum;
    let variance = values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum::<f64>()
        / weight_sum;

    Some(WeightedStats {
        mean,
        std: variance.max(0.0).sqrt(),
        samples: values.len(),
    })
}

impl VarianceFloor {
    /// Keeps the downstream distribution from collapsing to 0%/100%.
    pub fn apply(&self, std: f64, mean: f64) -> f64 {
        if std < self.min_std {
            std.max(self.mean_ratio * mean)
        } else {
            std
        }
    }
}
