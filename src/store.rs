use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use crate::config::app_cache_dir;
use crate::model::{
    DefenseCategory, GameKey, GameRecord, Player, Position, StatField, StatLine, Team,
};

/// Read-only queries the forecasting engine needs from the stats database.
pub trait StatStore {
    fn player(&self, player_id: i64) -> Result<Option<Player>>;

    fn players(&self) -> Result<Vec<Player>>;

    fn team_by_abbr(&self, abbr: &str) -> Result<Option<Team>>;

    fn league_teams(&self) -> Result<Vec<Team>>;

    /// Per-game rows, most recent first (season desc, week desc). Season total
    /// rows are never returned.
    fn recent_games(&self, player_id: i64, limit: usize) -> Result<Vec<GameRecord>>;

    /// All per-game rows for a player, optionally restricted to one season,
    /// most recent first.
    fn season_games(&self, player_id: i64, season: Option<i32>) -> Result<Vec<GameRecord>>;

    /// Week -> sum of `field` over every player rostered on `team_abbr`.
    fn team_weekly_aggregate(
        &self,
        team_abbr: &str,
        season: i32,
        field: StatField,
    ) -> Result<BTreeMap<u32, f64>>;

    /// Per-week figures the team allowed in `season`, most recent week first.
    fn opponent_allowed(
        &self,
        team_id: i64,
        season: i32,
        category: DefenseCategory,
    ) -> Result<Vec<f64>>;

    /// Latest season with any per-game player rows.
    fn latest_season(&self) -> Result<Option<i32>>;
}

impl<T: StatStore + ?Sized> StatStore for &T {
    fn player(&self, player_id: i64) -> Result<Option<Player>> {
        (**self).player(player_id)
    }

    fn players(&self) -> Result<Vec<Player>> {
        (**self).players()
    }

    fn team_by_abbr(&self, abbr: &str) -> Result<Option<Team>> {
        (**self).team_by_abbr(abbr)
    }

    fn league_teams(&self) -> Result<Vec<Team>> {
        (**self).league_teams()
    }

    fn recent_games(&self, player_id: i64, limit: usize) -> Result<Vec<GameRecord>> {
        (**self).recent_games(player_id, limit)
    }

    fn season_games(&self, player_id: i64, season: Option<i32>) -> Result<Vec<GameRecord>> {
        (**self).season_games(player_id, season)
    }

    fn team_weekly_aggregate(
        &self,
        team_abbr: &str,
        season: i32,
        field: StatField,
    ) -> Result<BTreeMap<u32, f64>> {
        (**self).team_weekly_aggregate(team_abbr, season, field)
    }

    fn opponent_allowed(
        &self,
        team_id: i64,
        season: i32,
        category: DefenseCategory,
    ) -> Result<Vec<f64>> {
        (**self).opponent_allowed(team_id, season, category)
    }

    fn latest_season(&self) -> Result<Option<i32>> {
        (**self).latest_season()
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("gridiron_stats.sqlite"))
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside one transaction; commits only if it returns `Ok`.
    pub fn write<T>(&self, f: impl FnOnce(&StoreWriter<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin write transaction")?;
        let out = f(&StoreWriter { tx: &tx })?;
        tx.commit().context("commit write transaction")?;
        Ok(out)
    }

    pub fn player_by_external_id(&self, external_id: &str) -> Result<Option<Player>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, player_id, name, position, team FROM players WHERE player_id = ?1",
            params![external_id],
            player_from_row,
        )
        .optional()
        .context("query player by external id")
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_abbr TEXT NOT NULL UNIQUE,
            team_name TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            position TEXT NOT NULL,
            team TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_players_team ON players(team);

        CREATE TABLE IF NOT EXISTS player_games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id INTEGER NOT NULL REFERENCES players(id),
            season INTEGER NOT NULL,
            week INTEGER NULL,
            slot INTEGER NOT NULL,
            opponent TEXT NULL,
            passing_attempts REAL NULL,
            passing_completions REAL NULL,
            passing_yards REAL NULL,
            passing_touchdowns REAL NULL,
            interceptions REAL NULL,
            rushes REAL NULL,
            rushing_yards REAL NULL,
            rushing_touchdowns REAL NULL,
            receptions REAL NULL,
            targets REAL NULL,
            receiving_yards REAL NULL,
            receiving_touchdowns REAL NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(player_id, season, slot)
        );
        CREATE INDEX IF NOT EXISTS idx_player_season_week
            ON player_games(player_id, season, week);

        CREATE TABLE IF NOT EXISTS team_games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL REFERENCES teams(id),
            season INTEGER NOT NULL,
            week INTEGER NULL,
            slot INTEGER NOT NULL,
            opponent TEXT NULL,
            points_against INTEGER NULL,
            yards_against INTEGER NULL,
            passing_yards_against INTEGER NULL,
            rushing_yards_against INTEGER NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(team_id, season, slot)
        );
        CREATE INDEX IF NOT EXISTS idx_team_season_week
            ON team_games(team_id, season, week);

        CREATE TABLE IF NOT EXISTS import_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source TEXT NOT NULL,
            teams INTEGER NOT NULL,
            players INTEGER NOT NULL,
            player_games INTEGER NOT NULL,
            team_games INTEGER NOT NULL,
            skipped_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Write half of the store, only reachable inside [`SqliteStore::write`].
pub struct StoreWriter<'a> {
    tx: &'a Transaction<'a>,
}

impl StoreWriter<'_> {
    pub fn team_id(&self, abbr: &str) -> Result<Option<i64>> {
        self.tx
            .query_row(
                "SELECT id FROM teams WHERE team_abbr = ?1",
                params![abbr.trim().to_ascii_uppercase()],
                |row| row.get(0),
            )
            .optional()
            .context("look up team id")
    }

    pub fn player_row_id(&self, external_id: &str) -> Result<Option<i64>> {
        self.tx
            .query_row(
                "SELECT id FROM players WHERE player_id = ?1",
                params![external_id],
                |row| row.get(0),
            )
            .optional()
            .context("look up player id")
    }

    pub fn upsert_team(&self, abbr: &str, name: &str) -> Result<i64> {
        let abbr = abbr.trim().to_ascii_uppercase();
        self.tx
            .execute(
                r#"
                INSERT INTO teams (team_abbr, team_name, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(team_abbr) DO UPDATE SET
                    team_name = excluded.team_name,
                    updated_at = excluded.updated_at
                "#,
                params![abbr, name, Utc::now().to_rfc3339()],
            )
            .context("upsert team")?;
        self.tx
            .query_row(
                "SELECT id FROM teams WHERE team_abbr = ?1",
                params![abbr],
                |row| row.get(0),
            )
            .context("resolve team id")
    }

    pub fn upsert_player(
        &self,
        external_id: &str,
        name: &str,
        position: &Position,
        team: &str,
    ) -> Result<i64> {
        self.tx
            .execute(
                r#"
                INSERT INTO players (player_id, name, position, team, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(player_id) DO UPDATE SET
                    name = excluded.name,
                    position = excluded.position,
                    team = excluded.team,
                    updated_at = excluded.updated_at
                "#,
                params![
                    external_id,
                    name,
                    position.code(),
                    team.trim().to_ascii_uppercase(),
                    Utc::now().to_rfc3339()
                ],
            )
            .context("upsert player")?;
        self.tx
            .query_row(
                "SELECT id FROM players WHERE player_id = ?1",
                params![external_id],
                |row| row.get(0),
            )
            .context("resolve player id")
    }

    /// `week = None` stores a season total row.
    pub fn upsert_player_game(
        &self,
        player_id: i64,
        season: i32,
        week: Option<u32>,
        opponent: Option<&str>,
        stats: &StatLine,
    ) -> Result<()> {
        let columns = StatField::ALL.map(|f| f.column()).join(", ");
        let placeholders = (6..6 + StatField::ALL.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let updates = StatField::ALL
            .map(|f| format!("{c} = excluded.{c}", c = f.column()))
            .join(",\n                ");
        let updated_at_idx = 6 + StatField::ALL.len();
        let sql = format!(
            r#"
            INSERT INTO player_games (
                player_id, season, week, slot, opponent, {columns}, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, {placeholders}, ?{updated_at_idx})
            ON CONFLICT(player_id, season, slot) DO UPDATE SET
                week = excluded.week,
                opponent = excluded.opponent,
                {updates},
                updated_at = excluded.updated_at
            "#
        );

        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(player_id),
            Box::new(season),
            Box::new(week.map(i64::from)),
            Box::new(slot(week)),
            Box::new(opponent.map(|s| s.trim().to_ascii_uppercase())),
        ];
        for field in StatField::ALL {
            values.push(Box::new(stats.recorded(field)));
        }
        values.push(Box::new(Utc::now().to_rfc3339()));

        self.tx
            .execute(&sql, rusqlite::params_from_iter(values.iter()))
            .context("upsert player game")?;
        Ok(())
    }

    pub fn upsert_team_game(
        &self,
        team_id: i64,
        season: i32,
        week: Option<u32>,
        opponent: Option<&str>,
        allowed: &crate::model::DefenseLine,
    ) -> Result<()> {
        self.tx
            .execute(
                r#"
                INSERT INTO team_games (
                    team_id, season, week, slot, opponent,
                    points_against, yards_against, passing_yards_against, rushing_yards_against,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(team_id, season, slot) DO UPDATE SET
                    week = excluded.week,
                    opponent = excluded.opponent,
                    points_against = excluded.points_against,
                    yards_against = excluded.yards_against,
                    passing_yards_against = excluded.passing_yards_against,
                    rushing_yards_against = excluded.rushing_yards_against,
                    updated_at = excluded.updated_at
                "#,
                params![
                    team_id,
                    season,
                    week.map(i64::from),
                    slot(week),
                    opponent.map(|s| s.trim().to_ascii_uppercase()),
                    allowed.points_against,
                    allowed.yards_against,
                    allowed.passing_yards_against,
                    allowed.rushing_yards_against,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("upsert team game")?;
        Ok(())
    }

    pub fn record_import_run(
        &self,
        started_at: &str,
        source: &str,
        counts: [usize; 4],
        skipped: &[String],
    ) -> Result<i64> {
        let skipped_json = serde_json::to_string(skipped).unwrap_or_else(|_| "[]".to_string());
        self.tx
            .execute(
                r#"
                INSERT INTO import_runs (
                    started_at, finished_at, source, teams, players, player_games, team_games,
                    skipped_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    started_at,
                    Utc::now().to_rfc3339(),
                    source,
                    counts[0] as i64,
                    counts[1] as i64,
                    counts[2] as i64,
                    counts[3] as i64,
                    skipped_json
                ],
            )
            .context("insert import run")?;
        Ok(self.tx.last_insert_rowid())
    }
}

impl StatStore for SqliteStore {
    fn player(&self, player_id: i64) -> Result<Option<Player>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, player_id, name, position, team FROM players WHERE id = ?1",
            params![player_id],
            player_from_row,
        )
        .optional()
        .context("query player")
    }

    fn players(&self) -> Result<Vec<Player>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, player_id, name, position, team FROM players ORDER BY id ASC")
            .context("prepare players query")?;
        let rows = stmt
            .query_map([], player_from_row)
            .context("query players")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode player row")?);
        }
        Ok(out)
    }

    fn team_by_abbr(&self, abbr: &str) -> Result<Option<Team>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, team_abbr, team_name FROM teams WHERE team_abbr = ?1",
            params![abbr.trim().to_ascii_uppercase()],
            team_from_row,
        )
        .optional()
        .context("query team by abbr")
    }

    fn league_teams(&self) -> Result<Vec<Team>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, team_abbr, team_name FROM teams ORDER BY team_abbr ASC")
            .context("prepare teams query")?;
        let rows = stmt.query_map([], team_from_row).context("query teams")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode team row")?);
        }
        Ok(out)
    }

    fn recent_games(&self, player_id: i64, limit: usize) -> Result<Vec<GameRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            r#"
            SELECT player_id, season, week, opponent, {columns}
            FROM player_games
            WHERE player_id = ?1 AND week IS NOT NULL
            ORDER BY season DESC, week DESC, id DESC
            LIMIT ?2
            "#,
            columns = stat_columns()
        );
        let mut stmt = conn.prepare(&sql).context("prepare recent games query")?;
        let rows = stmt
            .query_map(params![player_id, limit as i64], game_from_row)
            .context("query recent games")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode game row")?);
        }
        Ok(out)
    }

    fn season_games(&self, player_id: i64, season: Option<i32>) -> Result<Vec<GameRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            r#"
            SELECT player_id, season, week, opponent, {columns}
            FROM player_games
            WHERE player_id = ?1 AND week IS NOT NULL
              AND (?2 IS NULL OR season = ?2)
            ORDER BY season DESC, week DESC, id DESC
            "#,
            columns = stat_columns()
        );
        let mut stmt = conn.prepare(&sql).context("prepare season games query")?;
        let rows = stmt
            .query_map(params![player_id, season], game_from_row)
            .context("query season games")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode game row")?);
        }
        Ok(out)
    }

    fn team_weekly_aggregate(
        &self,
        team_abbr: &str,
        season: i32,
        field: StatField,
    ) -> Result<BTreeMap<u32, f64>> {
        let conn = self.lock()?;
        let sql = format!(
            r#"
            SELECT pg.week, SUM(COALESCE(pg.{col}, 0))
            FROM player_games pg
            JOIN players p ON p.id = pg.player_id
            WHERE p.team = ?1 AND pg.season = ?2 AND pg.week IS NOT NULL
            GROUP BY pg.week
            ORDER BY pg.week ASC
            "#,
            col = field.column()
        );
        let mut stmt = conn.prepare(&sql).context("prepare team aggregate query")?;
        let rows = stmt
            .query_map(
                params![team_abbr.trim().to_ascii_uppercase(), season],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, f64>(1)?)),
            )
            .context("query team aggregate")?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (week, total) = row.context("decode team aggregate row")?;
            out.insert(week, total);
        }
        Ok(out)
    }

    fn opponent_allowed(
        &self,
        team_id: i64,
        season: i32,
        category: DefenseCategory,
    ) -> Result<Vec<f64>> {
        let conn = self.lock()?;
        let sql = format!(
            r#"
            SELECT COALESCE({col}, 0)
            FROM team_games
            WHERE team_id = ?1 AND season = ?2 AND week IS NOT NULL
            ORDER BY week DESC
            "#,
            col = category.column()
        );
        let mut stmt = conn.prepare(&sql).context("prepare opponent allowed query")?;
        let rows = stmt
            .query_map(params![team_id, season], |row| row.get::<_, f64>(0))
            .context("query opponent allowed")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode opponent allowed row")?);
        }
        Ok(out)
    }

    fn latest_season(&self) -> Result<Option<i32>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT MAX(season) FROM player_games WHERE week IS NOT NULL",
            [],
            |row| row.get::<_, Option<i32>>(0),
        )
        .context("query latest season")
    }
}

pub(crate) fn stat_columns() -> String {
    StatField::ALL.map(|f| f.column()).join(", ")
}

/// Reads the stat columns starting at `offset`; NULL columns stay absent.
pub(crate) fn stat_line_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<StatLine> {
    let mut line = StatLine::new();
    for (idx, field) in StatField::ALL.iter().enumerate() {
        if let Some(value) = row.get::<_, Option<f64>>(offset + idx)? {
            line.set(*field, value);
        }
    }
    Ok(line)
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<GameRecord> {
    Ok(GameRecord {
        subject_id: row.get(0)?,
        key: GameKey::new(row.get(1)?, row.get::<_, u32>(2)?),
        opponent: row.get(3)?,
        stats: stat_line_from_row(row, 4)?,
    })
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        position: Position::parse(&row.get::<_, String>(3)?),
        team: row.get(4)?,
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        abbr: row.get(1)?,
        name: row.get(2)?,
    })
}

fn slot(week: Option<u32>) -> i64 {
    week.map(i64::from).unwrap_or(0)
}
