use anyhow::Result;

use crate::model::{DefenseCategory, DefensiveBaseline};
use crate::store::StatStore;

/// What `team_id` has allowed per game so far in `season`.
///
/// Only the given season is read: prior seasons say little about this year's
/// defense. `None` when the team has no games in that season.
pub fn defensive_baseline<S: StatStore + ?Sized>(
    store: &S,
    team_id: i64,
    season: i32,
    category: DefenseCategory,
) -> Result<Option<DefensiveBaseline>> {
    let allowed = store.opponent_allowed(team_id, season, category)?;
    Ok(baseline_from_values(&allowed))
}

/// Mean and population std-dev (no Bessel correction).
pub fn baseline_from_values(values: &[f64]) -> Option<DefensiveBaseline> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(DefensiveBaseline {
        mean_allowed: mean,
        std_allowed: variance.sqrt(),
        games: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std_without_bessel() {
        let b = baseline_from_values(&[200.0, 240.0]).unwrap();
        assert_eq!(b.mean_allowed, 220.0);
        assert_eq!(b.std_allowed, 20.0);
        assert_eq!(b.games, 2);
    }

    #[test]
    fn empty_season_is_no_data() {
        assert!(baseline_from_values(&[]).is_none());
    }
}
