use std::collections::BTreeMap;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::model::StatField;
use crate::seed::{SEED_VERSION, SeedFile, SeedPlayer, SeedPlayerStat, SeedTeam, SeedTeamStat};

pub const LEAGUE_TEAMS: [(&str, &str); 32] = [
    ("ARI", "Arizona"),
    ("ATL", "Atlanta"),
    ("BAL", "Baltimore"),
    ("BUF", "Buffalo"),
    ("CAR", "Carolina"),
    ("CHI", "Chicago"),
    ("CIN", "Cincinnati"),
    ("CLE", "Cleveland"),
    ("DAL", "Dallas"),
    ("DEN", "Denver"),
    ("DET", "Detroit"),
    ("GB", "Green Bay"),
    ("HOU", "Houston"),
    ("IND", "Indianapolis"),
    ("JAX", "Jacksonville"),
    ("KC", "Kansas City"),
    ("LV", "Las Vegas"),
    ("LAC", "Los Angeles (AFC)"),
    ("LAR", "Los Angeles (NFC)"),
    ("MIA", "Miami"),
    ("MIN", "Minnesota"),
    ("NE", "New England"),
    ("NO", "New Orleans"),
    ("NYG", "New York (NFC)"),
    ("NYJ", "New York (AFC)"),
    ("PHI", "Philadelphia"),
    ("PIT", "Pittsburgh"),
    ("SF", "San Francisco"),
    ("SEA", "Seattle"),
    ("TB", "Tampa Bay"),
    ("TEN", "Tennessee"),
    ("WAS", "Washington"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticParams {
    pub first_season: i32,
    pub seasons: u32,
    pub weeks: u32,
    /// Fixed seed for reproducible leagues; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            first_season: 2023,
            seasons: 2,
            weeks: 17,
            seed: None,
        }
    }
}

/// Per-game expectations for one generated player.
#[derive(Debug, Clone, Copy, Default)]
struct Talent {
    passing_yards: f64,
    passing_tds: f64,
    interceptions: f64,
    rushing_yards: f64,
    rush_tds: f64,
    receiving_yards: f64,
    receptions: f64,
    rec_tds: f64,
}

struct Slot {
    external_id: String,
    team: usize,
    talent: Talent,
}

/// Builds a randomized league in seed-file shape: 32 teams with one QB, two
/// RBs, three WRs and one TE each, every team playing every week.
pub fn generate_league(params: &SyntheticParams) -> SeedFile {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let teams: Vec<SeedTeam> = LEAGUE_TEAMS
        .iter()
        .map(|(abbr, name)| SeedTeam {
            team_abbr: abbr.to_string(),
            team_name: name.to_string(),
        })
        .collect();

    let mut players = Vec::new();
    let mut slots = Vec::new();
    for (team_idx, (abbr, _)) in LEAGUE_TEAMS.iter().enumerate() {
        for (code, depth) in [("QB", 1), ("RB", 2), ("WR", 3), ("TE", 1)] {
            for n in 1..=depth {
                let external_id = format!("SYN-{abbr}-{code}{n}");
                players.push(SeedPlayer {
                    player_id: external_id.clone(),
                    name: format!("{abbr} {code}{n}"),
                    position: code.to_string(),
                    team: abbr.to_string(),
                });
                slots.push(Slot {
                    external_id,
                    team: team_idx,
                    talent: draw_talent(&mut rng, code, n),
                });
            }
        }
    }

    let mut player_stats = Vec::new();
    let mut team_stats = Vec::new();
    for season in params.first_season..params.first_season + params.seasons as i32 {
        for week in 1..=params.weeks {
            let mut order: Vec<usize> = (0..LEAGUE_TEAMS.len()).collect();
            order.shuffle(&mut rng);
            let mut opponent_of = vec![0usize; LEAGUE_TEAMS.len()];
            for pair in order.chunks(2) {
                if let [a, b] = pair {
                    opponent_of[*a] = *b;
                    opponent_of[*b] = *a;
                }
            }

            // Offense produced per team this week: (passing, rushing, touchdowns).
            let mut produced = vec![(0.0_f64, 0.0_f64, 0u32); LEAGUE_TEAMS.len()];
            for slot in &slots {
                let line = play_game(&mut rng, &slot.talent);
                let entry = &mut produced[slot.team];
                entry.0 += line.get(&StatField::PassingYards).copied().unwrap_or(0.0);
                entry.1 += line.get(&StatField::RushingYards).copied().unwrap_or(0.0);
                entry.2 += [
                    StatField::PassingTouchdowns,
                    StatField::RushingTouchdowns,
                ]
                .iter()
                .map(|f| line.get(f).copied().unwrap_or(0.0) as u32)
                .sum::<u32>();

                player_stats.push(SeedPlayerStat {
                    player_id: Some(slot.external_id.clone()),
                    season,
                    week: Some(week),
                    opponent: Some(LEAGUE_TEAMS[opponent_of[slot.team]].0.to_string()),
                    stats: line
                        .into_iter()
                        .map(|(field, v)| (field.column().to_string(), Value::from(v)))
                        .collect(),
                });
            }

            for (team_idx, (abbr, _)) in LEAGUE_TEAMS.iter().enumerate() {
                let opp = opponent_of[team_idx];
                let (passing, rushing, tds) = produced[opp];
                let field_goals = rng.gen_range(0..4);
                team_stats.push(SeedTeamStat {
                    team_abbreviation: abbr.to_string(),
                    season,
                    week: Some(week),
                    opponent: Some(LEAGUE_TEAMS[opp].0.to_string()),
                    points_allowed: Some(i64::from(tds * 7 + field_goals * 3)),
                    yards_allowed: Some((passing + rushing).round() as i64),
                    passing_yards_allowed: Some(passing.round() as i64),
                    rushing_yards_allowed: Some(rushing.round() as i64),
                });
            }
        }
    }

    SeedFile {
        version: Some(SEED_VERSION.to_string()),
        exported_at: Some(Utc::now().to_rfc3339()),
        teams,
        players,
        player_stats,
        team_stats,
    }
}

fn draw_talent(rng: &mut StdRng, code: &str, depth: u32) -> Talent {
    match (code, depth) {
        ("QB", _) => Talent {
            passing_yards: rng.gen_range(185.0..290.0),
            passing_tds: rng.gen_range(0.9..2.2),
            interceptions: rng.gen_range(0.4..1.1),
            rushing_yards: rng.gen_range(0.0..35.0),
            rush_tds: rng.gen_range(0.0..0.3),
            ..Talent::default()
        },
        ("RB", 1) => Talent {
            rushing_yards: rng.gen_range(55.0..95.0),
            rush_tds: rng.gen_range(0.3..0.8),
            receiving_yards: rng.gen_range(12.0..35.0),
            receptions: rng.gen_range(1.5..4.0),
            rec_tds: rng.gen_range(0.05..0.2),
            ..Talent::default()
        },
        ("RB", _) => Talent {
            rushing_yards: rng.gen_range(18.0..45.0),
            rush_tds: rng.gen_range(0.1..0.35),
            receiving_yards: rng.gen_range(5.0..20.0),
            receptions: rng.gen_range(0.8..2.5),
            rec_tds: rng.gen_range(0.0..0.1),
            ..Talent::default()
        },
        ("WR", n) => {
            let scale = match n {
                1 => 1.0,
                2 => 0.7,
                _ => 0.45,
            };
            Talent {
                receiving_yards: scale * rng.gen_range(65.0..100.0),
                receptions: scale * rng.gen_range(5.0..7.5),
                rec_tds: scale * rng.gen_range(0.3..0.7),
                rushing_yards: rng.gen_range(0.0..4.0),
                ..Talent::default()
            }
        }
        _ => Talent {
            receiving_yards: rng.gen_range(25.0..60.0),
            receptions: rng.gen_range(2.5..5.5),
            rec_tds: rng.gen_range(0.15..0.5),
            ..Talent::default()
        },
    }
}

fn play_game(rng: &mut StdRng, talent: &Talent) -> BTreeMap<StatField, f64> {
    let mut line = BTreeMap::new();
    if talent.passing_yards > 0.0 {
        let yards = noisy(rng, talent.passing_yards, 0.3);
        let attempts = (yards / rng.gen_range(6.0..8.0)).round();
        line.insert(StatField::PassingYards, yards);
        line.insert(StatField::PassingAttempts, attempts);
        line.insert(
            StatField::PassingCompletions,
            (attempts * rng.gen_range(0.58..0.7)).round(),
        );
        line.insert(
            StatField::PassingTouchdowns,
            poisson_draw(rng, talent.passing_tds),
        );
        line.insert(
            StatField::Interceptions,
            poisson_draw(rng, talent.interceptions),
        );
    }
    if talent.rushing_yards > 0.0 {
        let yards = noisy(rng, talent.rushing_yards, 0.45);
        line.insert(StatField::RushingYards, yards);
        line.insert(StatField::Rushes, (yards / rng.gen_range(3.5..5.0)).round());
        line.insert(StatField::RushingTouchdowns, poisson_draw(rng, talent.rush_tds));
    }
    if talent.receiving_yards > 0.0 {
        let receptions = noisy(rng, talent.receptions, 0.4).round();
        let yards = if receptions > 0.0 {
            noisy(rng, talent.receiving_yards, 0.45)
        } else {
            0.0
        };
        line.insert(StatField::Receptions, receptions);
        line.insert(
            StatField::Targets,
            (receptions * rng.gen_range(1.2..1.6)).round(),
        );
        line.insert(StatField::ReceivingYards, yards);
        line.insert(
            StatField::ReceivingTouchdowns,
            poisson_draw(rng, talent.rec_tds),
        );
    }
    line
}

/// `mean * (1 +- spread)`, rounded to whole yards and never negative.
fn noisy(rng: &mut StdRng, mean: f64, spread: f64) -> f64 {
    (mean * (1.0 + rng.gen_range(-spread..spread))).max(0.0).round()
}

/// Knuth's multiplication method; fine for the small rates used here.
fn poisson_draw(rng: &mut StdRng, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 0.0;
    }
    let limit = (-lambda).exp();
    let mut k = 0u32;
    let mut p = 1.0;
    loop {
        p *= rng.gen_range(0.0..1.0);
        if p <= limit {
            return f64::from(k);
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SyntheticParams {
        SyntheticParams {
            first_season: 2024,
            seasons: 1,
            weeks: 3,
            seed: Some(7),
        }
    }

    #[test]
    fn league_shape() {
        let seed = generate_league(&small());
        assert_eq!(seed.teams.len(), 32);
        assert_eq!(seed.players.len(), 32 * 7);
        assert_eq!(seed.player_stats.len(), 32 * 7 * 3);
        assert_eq!(seed.team_stats.len(), 32 * 3);
        let qbs = seed.players.iter().filter(|p| p.position == "QB").count();
        assert_eq!(qbs, 32);
    }

    #[test]
    fn every_team_meets_someone_else_each_week() {
        let seed = generate_league(&small());
        for row in &seed.team_stats {
            let opp = row.opponent.as_deref().unwrap();
            assert_ne!(opp, row.team_abbreviation);
        }
        assert!(
            seed.player_stats
                .iter()
                .all(|row| row.stat_line().get(StatField::ReceivingYards) >= 0.0)
        );
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let a = generate_league(&small());
        let b = generate_league(&small());
        assert_eq!(a.player_stats, b.player_stats);
        assert_eq!(a.team_stats, b.team_stats);
    }
}
