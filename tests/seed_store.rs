use serde_json::json;

use gridiron_props::backtest::{self, BacktestConfig};
use gridiron_props::config::ForecastConfig;
use gridiron_props::model::{Metric, StatField};
use gridiron_props::seed::{self, SeedFile};
use gridiron_props::store::{SqliteStore, StatStore};
use gridiron_props::summary;
use gridiron_props::synthetic::{SyntheticParams, generate_league};

fn seed_json() -> SeedFile {
    serde_json::from_value(json!({
        "version": "1.0",
        "exported_at": "2025-10-07",
        "teams": [
            { "team_abbr": "KC", "team_name": "Kansas City Chiefs" },
            { "abbreviation": "DEN", "name": "Denver Broncos" }
        ],
        "players": [
            { "player_id": "00-0033873", "name": "Field General", "position": "QB", "team": "KC" },
            { "player_id": "00-0036212", "name": "Slot Guy", "position": "WR", "team": "KC" }
        ],
        "player_stats": [
            { "player_id": "00-0033873", "season": 2024, "week": 1, "opponent": "DEN",
              "passing_yards": 291, "passing_touchdowns": 3, "interceptions": 0 },
            { "player_id": "00-0033873", "season": 2024, "week": 2, "opponent": "DEN",
              "passing_yards": 211, "passing_touchdowns": 1, "interceptions": 2 },
            { "player_id": "00-0033873", "season": 2023, "week": 18, "opponent": "DEN",
              "passing_yards": 262, "passing_touchdowns": 2, "interceptions": 1 },
            { "player_id": "00-0033873", "season": 2024, "week": null,
              "passing_yards": 4183, "passing_touchdowns": 26 },
            { "player_id": "00-0036212", "season": 2024, "week": 1, "receptions": 7,
              "receiving_yards": 84, "targets": null },
            { "player_id": "00-9999999", "season": 2024, "week": 1, "receptions": 2 },
            { "player_id": null, "season": 2024, "week": 1 }
        ],
        "team_stats": [
            { "team_abbreviation": "DEN", "season": 2024, "week": 1, "opponent": "KC",
              "points_allowed": 27, "yards_allowed": 380,
              "passing_yards_allowed": 291, "rushing_yards_allowed": 89 },
            { "team_abbreviation": "SEA", "season": 2024, "week": 1, "points_allowed": 10 }
        ]
    }))
    .unwrap()
}

#[test]
fn import_reports_skipped_rows_and_is_idempotent() {
    let store = SqliteStore::open_in_memory().unwrap();
    let first = seed::import_seed(&store, &seed_json(), "fixture").unwrap();
    assert_eq!(first.teams, 2);
    assert_eq!(first.players, 2);
    assert_eq!(first.player_games, 5);
    assert_eq!(first.team_games, 1);
    assert_eq!(first.skipped.len(), 3);

    let second = seed::import_seed(&store, &seed_json(), "fixture").unwrap();
    assert!(second.run_id > first.run_id);
    assert_eq!(store.league_teams().unwrap().len(), 2);
    let qb = store.player_by_external_id("00-0033873").unwrap().unwrap();
    assert_eq!(store.season_games(qb.id, None).unwrap().len(), 3);
}

#[test]
fn export_then_import_preserves_rows() {
    let source = SqliteStore::open_in_memory().unwrap();
    seed::import_seed(&source, &seed_json(), "fixture").unwrap();
    let exported = seed::export_seed(&source).unwrap();
    assert_eq!(exported.players.len(), 2);
    assert_eq!(exported.player_stats.len(), 5);
    assert!(exported.player_stats.iter().any(|row| row.week.is_none()));

    let copy = SqliteStore::open_in_memory().unwrap();
    let summary = seed::import_seed(&copy, &exported, "export").unwrap();
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.player_games, 5);
    assert_eq!(summary.team_games, 1);
    assert_eq!(copy.latest_season().unwrap(), Some(2024));
}

#[test]
fn season_and_career_summaries_use_weekly_rows_only() {
    let store = SqliteStore::open_in_memory().unwrap();
    seed::import_seed(&store, &seed_json(), "fixture").unwrap();
    let qb = store.player_by_external_id("00-0033873").unwrap().unwrap();

    let season = summary::season_summary(&store, qb.id, None).unwrap();
    assert_eq!(season.season, Some(2024));
    assert_eq!(season.games_played, 2);
    assert_eq!(season.totals.get(StatField::PassingYards), 502.0);
    assert_eq!(season.averages.get(StatField::PassingYards), 251.0);

    let career = summary::career_summary(&store, qb.id).unwrap();
    assert_eq!(career.games_played, 3);
    assert_eq!(career.seasons.len(), 2);
    assert_eq!(career.seasons[0].season, 2024);
    assert_eq!(career.averages.get(StatField::PassingTouchdowns), 2.0);
    assert!(career.standard_deviations.get(StatField::PassingYards) > 0.0);

    assert!(summary::season_summary(&store, 404, None).unwrap_err().is_not_found());
}

#[test]
fn synthetic_league_backtests_end_to_end() {
    let store = SqliteStore::open_in_memory().unwrap();
    let league = generate_league(&SyntheticParams {
        first_season: 2024,
        seasons: 1,
        weeks: 10,
        seed: Some(42),
    });
    let summary = seed::import_seed(&store, &league, "synthetic").unwrap();
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.player_games, 32 * 7 * 10);

    let config = BacktestConfig {
        metrics: vec![Metric::ReceivingYards, Metric::PassingTouchdowns],
        min_history: 4,
        ..BacktestConfig::from_forecast(&ForecastConfig::default())
    };
    let reports = backtest::run_backtest(&store, &config).unwrap();
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert!(report.metrics.samples > 0, "{}", report.metric);
        assert!(report.metrics.brier > 0.0 && report.metrics.brier < 0.5);
        let binned: usize = report.bins.iter().map(|b| b.count).sum();
        assert_eq!(binned, report.metrics.samples);
    }
}
