use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::model::{DefenseLine, Position, StatField, StatLine};
use crate::store::{SqliteStore, stat_columns, stat_line_from_row};

pub const SEED_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub exported_at: Option<String>,
    #[serde(default)]
    pub teams: Vec<SeedTeam>,
    #[serde(default)]
    pub players: Vec<SeedPlayer>,
    #[serde(default)]
    pub player_stats: Vec<SeedPlayerStat>,
    #[serde(default)]
    pub team_stats: Vec<SeedTeamStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedTeam {
    #[serde(alias = "abbreviation")]
    pub team_abbr: String,
    #[serde(alias = "name")]
    pub team_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPlayer {
    pub player_id: String,
    pub name: String,
    pub position: String,
    pub team: String,
}

/// One row of `player_stats`. `week: null` is a season total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPlayerStat {
    pub player_id: Option<String>,
    pub season: i32,
    #[serde(default)]
    pub week: Option<u32>,
    #[serde(default)]
    pub opponent: Option<String>,
    /// Stat columns by name; unknown keys and nulls are ignored on import.
    #[serde(flatten)]
    pub stats: BTreeMap<String, Value>,
}

impl SeedPlayerStat {
    pub fn stat_line(&self) -> StatLine {
        let mut line = StatLine::new();
        for field in StatField::ALL {
            if let Some(value) = self.stats.get(field.column()).and_then(Value::as_f64) {
                line.set(field, value);
            }
        }
        line
    }

    fn columns_from(line: &StatLine) -> BTreeMap<String, Value> {
        StatField::ALL
            .iter()
            .filter_map(|field| {
                line.recorded(*field)
                    .map(|v| (field.column().to_string(), Value::from(v)))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedTeamStat {
    #[serde(alias = "team_abbr")]
    pub team_abbreviation: String,
    pub season: i32,
    #[serde(default)]
    pub week: Option<u32>,
    #[serde(default)]
    pub opponent: Option<String>,
    #[serde(default)]
    pub points_allowed: Option<i64>,
    #[serde(default)]
    pub yards_allowed: Option<i64>,
    #[serde(default)]
    pub passing_yards_allowed: Option<i64>,
    #[serde(default)]
    pub rushing_yards_allowed: Option<i64>,
}

impl SeedTeamStat {
    fn defense_line(&self) -> DefenseLine {
        DefenseLine {
            points_against: self.points_allowed,
            yards_against: self.yards_allowed,
            passing_yards_against: self.passing_yards_allowed,
            rushing_yards_against: self.rushing_yards_allowed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: i64,
    pub teams: usize,
    pub players: usize,
    pub player_games: usize,
    pub team_games: usize,
    pub skipped: Vec<String>,
}

pub fn read_seed_file(path: &Path) -> Result<SeedFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read seed file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse seed file {}", path.display()))
}

pub fn write_seed_file(path: &Path, seed: &SeedFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let json = serde_json::to_string_pretty(seed).context("serialize seed file")?;
    fs::write(path, json).with_context(|| format!("write seed file {}", path.display()))
}

/// Upserts every row of `seed` in one transaction. Rows that reference an
/// unknown player or team are skipped and listed in the summary.
pub fn import_seed(store: &SqliteStore, seed: &SeedFile, source: &str) -> Result<ImportSummary> {
    let started_at = Utc::now().to_rfc3339();
    let summary = store.write(|w| {
        let mut summary = ImportSummary::default();

        for team in &seed.teams {
            w.upsert_team(&team.team_abbr, &team.team_name)?;
            summary.teams += 1;
        }

        for player in &seed.players {
            w.upsert_player(
                &player.player_id,
                &player.name,
                &Position::parse(&player.position),
                &player.team,
            )?;
            summary.players += 1;
        }

        for (idx, row) in seed.player_stats.iter().enumerate() {
            let resolved = match row.player_id.as_deref() {
                Some(external) => w.player_row_id(external)?,
                None => None,
            };
            let Some(player_id) = resolved else {
                let reason = format!(
                    "player_stats[{idx}]: unknown player {}",
                    row.player_id.as_deref().unwrap_or("<null>")
                );
                warn!(row = idx, player = ?row.player_id, "skipping stat row for unknown player");
                summary.skipped.push(reason);
                continue;
            };
            w.upsert_player_game(
                player_id,
                row.season,
                row.week,
                row.opponent.as_deref(),
                &row.stat_line(),
            )?;
            summary.player_games += 1;
        }

        for (idx, row) in seed.team_stats.iter().enumerate() {
            let Some(team_id) = w.team_id(&row.team_abbreviation)? else {
                warn!(row = idx, team = %row.team_abbreviation, "skipping team row for unknown team");
                summary
                    .skipped
                    .push(format!("team_stats[{idx}]: unknown team {}", row.team_abbreviation));
                continue;
            };
            w.upsert_team_game(
                team_id,
                row.season,
                row.week,
                row.opponent.as_deref(),
                &row.defense_line(),
            )?;
            summary.team_games += 1;
        }

        summary.run_id = w.record_import_run(
            &started_at,
            source,
            [
                summary.teams,
                summary.players,
                summary.player_games,
                summary.team_games,
            ],
            &summary.skipped,
        )?;
        Ok(summary)
    })?;

    info!(
        run_id = summary.run_id,
        source,
        version = seed.version.as_deref().unwrap_or("unknown"),
        teams = summary.teams,
        players = summary.players,
        player_games = summary.player_games,
        team_games = summary.team_games,
        skipped = summary.skipped.len(),
        "seed import finished"
    );
    Ok(summary)
}

/// Dumps the whole store, season totals included, in seed-file shape.
pub fn export_seed(store: &SqliteStore) -> Result<SeedFile> {
    store.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT team_abbr, team_name FROM teams ORDER BY team_abbr")
            .context("prepare team export")?;
        let teams = stmt
            .query_map([], |row| {
                Ok(SeedTeam {
                    team_abbr: row.get(0)?,
                    team_name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("export teams")?;

        let mut stmt = conn
            .prepare("SELECT player_id, name, position, team FROM players ORDER BY player_id")
            .context("prepare player export")?;
        let players = stmt
            .query_map([], |row| {
                Ok(SeedPlayer {
                    player_id: row.get(0)?,
                    name: row.get(1)?,
                    position: row.get(2)?,
                    team: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("export players")?;

        let sql = format!(
            r#"
            SELECT p.player_id, g.season, g.week, g.opponent, {cols}
            FROM player_games g
            JOIN players p ON p.id = g.player_id
            ORDER BY p.player_id, g.season, g.slot
            "#,
            cols = stat_columns_qualified("g")
        );
        let mut stmt = conn.prepare(&sql).context("prepare player stat export")?;
        let player_stats = stmt
            .query_map([], player_stat_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("export player stats")?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT t.team_abbr, g.season, g.week, g.opponent,
                       g.points_against, g.yards_against,
                       g.passing_yards_against, g.rushing_yards_against
                FROM team_games g
                JOIN teams t ON t.id = g.team_id
                ORDER BY t.team_abbr, g.season, g.slot
                "#,
            )
            .context("prepare team stat export")?;
        let team_stats = stmt
            .query_map([], |row| {
                Ok(SeedTeamStat {
                    team_abbreviation: row.get(0)?,
                    season: row.get(1)?,
                    week: row.get(2)?,
                    opponent: row.get(3)?,
                    points_allowed: row.get(4)?,
                    yards_allowed: row.get(5)?,
                    passing_yards_allowed: row.get(6)?,
                    rushing_yards_allowed: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("export team stats")?;

        Ok(SeedFile {
            version: Some(SEED_VERSION.to_string()),
            exported_at: Some(Utc::now().to_rfc3339()),
            teams,
            players,
            player_stats,
            team_stats,
        })
    })
}

fn stat_columns_qualified(alias: &str) -> String {
    stat_columns()
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn player_stat_from_row(row: &Row<'_>) -> rusqlite::Result<SeedPlayerStat> {
    let line = stat_line_from_row(row, 4)?;
    Ok(SeedPlayerStat {
        player_id: row.get(0)?,
        season: row.get(1)?,
        week: row.get(2)?,
        opponent: row.get(3)?,
        stats: SeedPlayerStat::columns_from(&line),
    })
}
