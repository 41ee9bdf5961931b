use std::collections::BTreeSet;

use anyhow::Result;
use tracing::debug;

use crate::model::{LeagueTendency, StatField, TeamOffensiveProfile};
use crate::store::StatStore;

/// Pass/rush yardage split of a team's offense in `season`.
///
/// Returns `None` when no week was observed (or the team gained no yards at
/// all) so callers fall back instead of reading a 0/0 split.
pub fn offensive_profile<S: StatStore + ?Sized>(
    store: &S,
    team_abbr: &str,
    season: i32,
) -> Result<Option<TeamOffensiveProfile>> {
    let passing = store.team_weekly_aggregate(team_abbr, season, StatField::PassingYards)?;
    let rushing = store.team_weekly_aggregate(team_abbr, season, StatField::RushingYards)?;

    let weeks: BTreeSet<u32> = passing.keys().chain(rushing.keys()).copied().collect();
    if weeks.is_empty() {
        return Ok(None);
    }

    let n = weeks.len() as f64;
    let avg_passing_yards = weeks
        .iter()
        .map(|w| passing.get(w).copied().unwrap_or(0.0))
        .sum::<f64>()
        / n;
    let avg_rushing_yards = weeks
        .iter()
        .map(|w| rushing.get(w).copied().unwrap_or(0.0))
        .sum::<f64>()
        / n;

    Ok(profile_from_averages(
        avg_passing_yards,
        avg_rushing_yards,
        weeks.len(),
    ))
}

pub fn profile_from_averages(
    avg_passing_yards: f64,
    avg_rushing_yards: f64,
    games_observed: usize,
) -> Option<TeamOffensiveProfile> {
    let total = avg_passing_yards + avg_rushing_yards;
    if games_observed == 0 || total <= 0.0 {
        return None;
    }
    let pass_rate = avg_passing_yards / total;
    Some(TeamOffensiveProfile {
        avg_passing_yards,
        avg_rushing_yards,
        pass_rate,
        rush_rate: 1.0 - pass_rate,
        games_observed,
    })
}

/// Mean pass/rush rate over every team with data, or the configured default
/// split when no team has any.
pub fn league_tendency<S: StatStore + ?Sized>(
    store: &S,
    season: i32,
    fallback_pass_rate: f64,
) -> Result<LeagueTendency> {
    let mut profiles = Vec::new();
    for team in store.league_teams()? {
        if let Some(profile) = offensive_profile(store, &team.abbr, season)? {
            profiles.push(profile);
        }
    }
    Ok(average_tendency(&profiles, fallback_pass_rate))
}

pub fn average_tendency(
    profiles: &[TeamOffensiveProfile],
    fallback_pass_rate: f64,
) -> LeagueTendency {
    if profiles.is_empty() {
        debug!("no team offense data, using default league split");
        return LeagueTendency {
            pass_rate: fallback_pass_rate,
            rush_rate: 1.0 - fallback_pass_rate,
            teams_observed: 0,
        };
    }
    let n = profiles.len() as f64;
    LeagueTendency {
        pass_rate: profiles.iter().map(|p| p.pass_rate).sum::<f64>() / n,
        rush_rate: profiles.iter().map(|p| p.rush_rate).sum::<f64>() / n,
        teams_observed: profiles.len(),
    }
}
