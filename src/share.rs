use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use anyhow::Result;

use crate::config::DecayConfig;
use crate::model::{GameKey, GameRecord, StatField};
use crate::store::StatStore;
use crate::weighting::time_weights;

/// A player's share of the team over a window, with the raw team total it was
/// measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShareEstimate {
    pub share: f64,
    /// Unweighted team total of `fields` across the window's weeks.
    pub team_total: f64,
}

/// Time-weighted average of the player's per-game share of the team total over
/// `fields` (summed when more than one).
///
/// The ratio stream is weighted, not numerator and denominator separately. A
/// week where the team total is zero (or missing) contributes a ratio of 0.0.
/// `None` when `games` is empty.
pub fn player_share<S: StatStore + ?Sized>(
    store: &S,
    team_abbr: &str,
    fields: &[StatField],
    games: &[GameRecord],
    decay: &DecayConfig,
) -> Result<Option<f64>> {
    Ok(share_estimate(store, team_abbr, fields, games, decay)?.map(|e| e.share))
}

pub fn share_estimate<S: StatStore + ?Sized>(
    store: &S,
    team_abbr: &str,
    fields: &[StatField],
    games: &[GameRecord],
    decay: &DecayConfig,
) -> Result<Option<ShareEstimate>> {
    let mut team_totals: HashMap<i32, BTreeMap<u32, f64>> = HashMap::new();
    let mut ratios = Vec::with_capacity(games.len());
    let mut window_total = 0.0;
    for game in games {
        let season = game.key.season;
        if let Entry::Vacant(slot) = team_totals.entry(season) {
            let mut weeks: BTreeMap<u32, f64> = BTreeMap::new();
            for field in fields {
                for (week, total) in store.team_weekly_aggregate(team_abbr, season, *field)? {
                    *weeks.entry(week).or_insert(0.0) += total;
                }
            }
            slot.insert(weeks);
        }
        let team_total = team_totals
            .get(&season)
            .and_then(|weeks| weeks.get(&game.key.week))
            .copied()
            .unwrap_or(0.0);
        window_total += team_total;
        let player_value: f64 = fields.iter().map(|f| game.stats.get(*f)).sum();
        ratios.push(share_ratio(player_value, team_total));
    }

    let keys: Vec<GameKey> = games.iter().map(|g| g.key).collect();
    Ok(
        weighted_ratio(&ratios, &time_weights(&keys, decay)).map(|share| ShareEstimate {
            share,
            team_total: window_total,
        }),
    )
}

pub fn share_ratio(player_value: f64, team_total: f64) -> f64 {
    if team_total > 0.0 {
        player_value / team_total
    } else {
        0.0
    }
}

fn weighted_ratio(ratios: &[f64], weights: &[f64]) -> Option<f64> {
    let weight_sum: f64 = weights.iter().sum();
    if ratios.is_empty() || weight_sum <= 0.0 {
        return None;
    }
    Some(
        ratios
            .iter()
            .zip(weights)
            .map(|(r, w)| r * w)
            .sum::<f64>()
            / weight_sum,
    )
}
