use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::distribution::round_to;
use crate::error::ForecastError;
use crate::model::{GameRecord, Player, StatField, StatLine};
use crate::store::StatStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonLine {
    pub season: i32,
    pub games_played: usize,
    pub totals: StatLine,
    pub averages: StatLine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub player: Player,
    /// `None` only when neither the request nor the store names a season.
    pub season: Option<i32>,
    pub games_played: usize,
    pub totals: StatLine,
    pub averages: StatLine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerSummary {
    pub player: Player,
    pub games_played: usize,
    pub averages: StatLine,
    /// Population std-dev per field.
    pub standard_deviations: StatLine,
    /// Most recent season first.
    pub seasons: Vec<SeasonLine>,
}

/// Totals and per-game averages for one season of weekly rows. Defaults to
/// the latest season in the store.
pub fn season_summary<S: StatStore + ?Sized>(
    store: &S,
    player_id: i64,
    season: Option<i32>,
) -> Result<SeasonSummary, ForecastError> {
    let player = store
        .player(player_id)?
        .ok_or(ForecastError::PlayerNotFound(player_id))?;
    let season = match season {
        Some(season) => Some(season),
        None => store.latest_season()?,
    };
    let games = match season {
        Some(season) => store.season_games(player_id, Some(season))?,
        None => Vec::new(),
    };
    let (totals, averages) = totals_and_averages(&games);
    Ok(SeasonSummary {
        player,
        season,
        games_played: games.len(),
        totals,
        averages,
    })
}

pub fn career_summary<S: StatStore + ?Sized>(
    store: &S,
    player_id: i64,
) -> Result<CareerSummary, ForecastError> {
    let player = store
        .player(player_id)?
        .ok_or(ForecastError::PlayerNotFound(player_id))?;
    let games = store.season_games(player_id, None)?;

    let mut by_season: BTreeMap<i32, Vec<GameRecord>> = BTreeMap::new();
    for game in &games {
        by_season
            .entry(game.key.season)
            .or_default()
            .push(game.clone());
    }
    let seasons = by_season
        .iter()
        .rev()
        .map(|(season, rows)| {
            let (totals, averages) = totals_and_averages(rows);
            SeasonLine {
                season: *season,
                games_played: rows.len(),
                totals,
                averages,
            }
        })
        .collect();

    let (_, averages) = totals_and_averages(&games);
    Ok(CareerSummary {
        player,
        games_played: games.len(),
        standard_deviations: deviations(&games),
        averages,
        seasons,
    })
}

fn totals_and_averages(games: &[GameRecord]) -> (StatLine, StatLine) {
    let mut totals = StatLine::new();
    let mut averages = StatLine::new();
    if games.is_empty() {
        return (totals, averages);
    }
    let n = games.len() as f64;
    for field in StatField::ALL {
        let total: f64 = games.iter().map(|g| g.stats.get(field)).sum();
        totals.set(field, total);
        averages.set(field, round_to(total / n, 2));
    }
    (totals, averages)
}

fn deviations(games: &[GameRecord]) -> StatLine {
    let mut out = StatLine::new();
    if games.is_empty() {
        return out;
    }
    for field in StatField::ALL {
        let values: Vec<f64> = games.iter().map(|g| g.stats.get(field)).collect();
        out.set(field, round_to(population_std(&values), 2));
    }
    out
}

/// Centered on the exact mean; only the caller rounds.
fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
