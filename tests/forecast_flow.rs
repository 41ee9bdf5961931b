use std::collections::BTreeMap;

use serde_json::{Value, json};

use gridiron_props::config::{DecayConfig, ForecastConfig};
use gridiron_props::error::ForecastError;
use gridiron_props::model::{GameKey, Metric, Role, StatField};
use gridiron_props::predict::{Forecaster, Matchup};
use gridiron_props::projection::ProjectionPath;
use gridiron_props::seed::{self, SeedFile, SeedPlayer, SeedPlayerStat, SeedTeam, SeedTeamStat};
use gridiron_props::share::{player_share, share_estimate};
use gridiron_props::store::{SqliteStore, StatStore};
use gridiron_props::tendency::offensive_profile;
use gridiron_props::weighting::time_weights;

fn stat_row(player: &str, season: i32, week: Option<u32>, stats: Value) -> SeedPlayerStat {
    let stats: BTreeMap<String, Value> = serde_json::from_value(stats).unwrap();
    SeedPlayerStat {
        player_id: Some(player.to_string()),
        season,
        week,
        opponent: Some("BUF".to_string()),
        stats,
    }
}

fn defense_row(team: &str, season: i32, week: u32, passing: i64, rushing: i64) -> SeedTeamStat {
    SeedTeamStat {
        team_abbreviation: team.to_string(),
        season,
        week: Some(week),
        opponent: Some("KC".to_string()),
        points_allowed: Some(24),
        yards_allowed: Some(passing + rushing),
        passing_yards_allowed: Some(passing),
        rushing_yards_allowed: Some(rushing),
    }
}

fn league_seed() -> SeedFile {
    let teams = ["KC", "BUF", "NYJ", "MIA"]
        .iter()
        .map(|abbr| SeedTeam {
            team_abbr: abbr.to_string(),
            team_name: abbr.to_string(),
        })
        .collect();
    let players = [
        ("QB-1", "QB", "KC"),
        ("WR-1", "WR", "KC"),
        ("RB-1", "RB", "KC"),
        ("WR-9", "WR", "MIA"),
    ]
    .iter()
    .map(|(id, pos, team)| SeedPlayer {
        player_id: id.to_string(),
        name: format!("Player {id}"),
        position: pos.to_string(),
        team: team.to_string(),
    })
    .collect();

    let mut player_stats = Vec::new();
    let mut schedule: Vec<(i32, u32)> = vec![(2023, 16), (2023, 17)];
    schedule.extend((1..=6).map(|w| (2024, w)));
    for (i, (season, week)) in schedule.iter().enumerate() {
        let i = i as f64;
        player_stats.push(stat_row(
            "QB-1",
            *season,
            Some(*week),
            json!({
                "passing_yards": 250.0 + 5.0 * i,
                "passing_touchdowns": 2,
                "interceptions": if i as u32 % 3 == 0 { 1 } else { 0 },
            }),
        ));
        player_stats.push(stat_row(
            "WR-1",
            *season,
            Some(*week),
            json!({
                "receiving_yards": 70.0 + 2.0 * i,
                "receptions": 6,
                "targets": 9,
                "receiving_touchdowns": if i as u32 % 2 == 0 { 1 } else { 0 },
            }),
        ));
        player_stats.push(stat_row(
            "RB-1",
            *season,
            Some(*week),
            json!({ "rushing_yards": 80.0, "rushing_touchdowns": 1, "receiving_yards": 10.0 }),
        ));
    }
    // Season total row: must never reach the forecast.
    player_stats.push(stat_row(
        "WR-1",
        2024,
        None,
        json!({ "receiving_yards": 9999.0, "receptions": 999 }),
    ));

    let mut team_stats: Vec<SeedTeamStat> = (1..=6)
        .map(|w| defense_row("BUF", 2024, w, 230, 110))
        .collect();
    team_stats.push(defense_row("NYJ", 2023, 17, 300, 150));

    SeedFile {
        version: Some("1.0".to_string()),
        exported_at: None,
        teams,
        players,
        player_stats,
        team_stats,
    }
}

fn loaded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    let summary = seed::import_seed(&store, &league_seed(), "test").unwrap();
    assert!(summary.skipped.is_empty());
    store
}

fn id(store: &SqliteStore, external: &str) -> i64 {
    store.player_by_external_id(external).unwrap().unwrap().id
}

#[test]
fn unknown_entities_are_not_found_but_empty_history_is_a_result() {
    let store = loaded_store();
    let wr = id(&store, "WR-1");
    let idle = id(&store, "WR-9");
    let f = Forecaster::new(&store, ForecastConfig::default());

    assert!(matches!(
        f.predict_player(123_456, "BUF"),
        Err(ForecastError::PlayerNotFound(123_456))
    ));
    assert!(matches!(
        f.predict_player(wr, "ZZZ"),
        Err(ForecastError::TeamNotFound(_))
    ));

    let prediction = f.predict_player(idle, "BUF").unwrap();
    let receiving = prediction.receiving.unwrap();
    assert_eq!(receiving.path, ProjectionPath::NoData);
    assert_eq!(receiving.projected, 0.0);
    assert!(receiving.probabilities.values().all(|p| *p == 0.0));
    assert_eq!(prediction.touchdowns.unwrap().at_least_one, 0.0);
}

#[test]
fn season_total_rows_never_feed_forecasts() {
    let store = loaded_store();
    let wr = id(&store, "WR-1");
    let f = Forecaster::new(&store, ForecastConfig::default());
    let forecast = f.predict_yardage(wr, "NYJ", None).unwrap();
    assert_eq!(forecast.games_used, 8);
    assert!(forecast.player_avg < 100.0);
}

#[test]
fn current_season_opponent_data_drives_a_blend() {
    let store = loaded_store();
    let wr = id(&store, "WR-1");
    let f = Forecaster::new(&store, ForecastConfig::default());
    let forecast = f
        .predict_yardage(wr, "buf", Some(Metric::ReceivingYards))
        .unwrap();

    assert_eq!(forecast.path, ProjectionPath::Blended);
    assert_eq!(forecast.opponent_avg_allowed, Some(230.0));
    let share = forecast.share.unwrap();
    assert!((0.0..=1.0).contains(&share));
    let probs: Vec<f64> = forecast.probabilities.values().copied().collect();
    assert!(probs.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn prior_season_defense_is_ignored() {
    let store = loaded_store();
    let wr = id(&store, "WR-1");
    let f = Forecaster::new(&store, ForecastConfig::default());
    let forecast = f.predict_yardage(wr, "NYJ", None).unwrap();
    assert_eq!(forecast.path, ProjectionPath::Historical);
    assert_eq!(forecast.projected, forecast.player_avg);
}

#[test]
fn pinned_season_reads_that_seasons_defense() {
    let store = loaded_store();
    let wr = id(&store, "WR-1");
    let config = ForecastConfig {
        season: Some(2023),
        ..ForecastConfig::default()
    };
    let f = Forecaster::new(&store, config);
    assert_eq!(
        f.predict_yardage(wr, "BUF", None).unwrap().path,
        ProjectionPath::Historical
    );
    assert_eq!(
        f.predict_yardage(wr, "NYJ", None).unwrap().opponent_avg_allowed,
        Some(300.0)
    );
}

#[test]
fn passer_payload_has_touchdown_ladder_and_interceptions() {
    let store = loaded_store();
    let qb = id(&store, "QB-1");
    let f = Forecaster::new(&store, ForecastConfig::default());
    let prediction = f.predict_player(qb, "BUF").unwrap();

    assert_eq!(prediction.role, Role::Passer);
    assert_eq!(prediction.passing.unwrap().path, ProjectionPath::Blended);
    assert!(prediction.rushing.is_none());

    let tds = prediction.passing_touchdowns.unwrap();
    assert_eq!(tds.probabilities.len(), 4);
    assert!((tds.opponent_factor - 24.0 / 22.0).abs() < 1e-3);
    let ladder: Vec<f64> = tds.probabilities.values().copied().collect();
    assert!(ladder.windows(2).all(|w| w[0] >= w[1]));

    let ints = prediction.interceptions.unwrap();
    let total = ints.prob_0_ints + ints.prob_1_int + ints.prob_2plus_ints;
    assert!((total - 100.0).abs() < 0.05);
}

#[test]
fn unrecorded_stats_read_as_zero_occurrences() {
    let store = loaded_store();
    let rb = id(&store, "RB-1");
    let f = Forecaster::new(&store, ForecastConfig::default());
    let receptions = f.predict_receptions(rb, "BUF").unwrap();
    assert_eq!(receptions.path, ProjectionPath::NoData);
    assert_eq!(receptions.games_used, 8);

    let prediction = f.predict_player(rb, "BUF").unwrap();
    assert!(prediction.receiving.unwrap().projected > 0.0);
    assert!(prediction.rushing.unwrap().projected > 0.0);
    assert_eq!(prediction.touchdowns.unwrap().player_avg, 1.0);
}

#[test]
fn slate_runs_every_matchup() {
    let store = loaded_store();
    let matchups = vec![
        Matchup {
            player_id: id(&store, "QB-1"),
            opponent: "BUF".into(),
        },
        Matchup {
            player_id: id(&store, "WR-1"),
            opponent: "NYJ".into(),
        },
        Matchup {
            player_id: -1,
            opponent: "BUF".into(),
        },
    ];
    let f = Forecaster::new(&store, ForecastConfig::default());
    let slate = f.predict_slate(&matchups);
    assert_eq!(slate.len(), 3);
    assert!(slate[0].outcome.is_ok());
    assert!(slate[1].outcome.is_ok());
    assert!(
        slate[2]
            .outcome
            .as_ref()
            .is_err_and(|e| e.is_not_found())
    );
}

fn weighted(ratios: &[f64], keys: &[GameKey]) -> f64 {
    let weights = time_weights(keys, &DecayConfig::default());
    let total: f64 = weights.iter().sum();
    ratios.iter().zip(&weights).map(|(r, w)| r * w).sum::<f64>() / total
}

#[test]
fn total_yards_share_spans_receiving_and_rushing() {
    let store = loaded_store();
    let rb = id(&store, "RB-1");
    let games = store.recent_games(rb, 20).unwrap();
    assert_eq!(games.len(), 8);

    // KC per week: WR-1 receiving (70 + 2i) plus RB-1 80 rushing + 10 receiving.
    let keys: Vec<GameKey> = games.iter().map(|g| g.key).collect();
    let ratios: Vec<f64> = (0..8)
        .rev()
        .map(|i| 90.0 / (160.0 + 2.0 * f64::from(i)))
        .collect();
    let expected = weighted(&ratios, &keys);

    let fields = [StatField::ReceivingYards, StatField::RushingYards];
    let share = player_share(&store, "KC", &fields, &games, &DecayConfig::default())
        .unwrap()
        .unwrap();
    assert!((share - expected).abs() < 1e-9);

    let f = Forecaster::new(&store, ForecastConfig::default());
    let forecast = f
        .predict_yardage(rb, "BUF", Some(Metric::TotalYards))
        .unwrap();
    assert_eq!(forecast.path, ProjectionPath::Blended);
    assert_eq!(forecast.tendency_multiplier, Some(1.0));
    assert_eq!(forecast.adjusted_defense, Some(340.0));
    assert_eq!(forecast.opponent_avg_allowed, Some(340.0));
    assert!((forecast.share.unwrap() - expected).abs() < 6e-4);
    assert_eq!(forecast.player_avg, 90.0);
    let blended = 0.7 * 340.0 * expected + 0.3 * 90.0;
    assert!((forecast.projected - blended).abs() < 0.051);
}

#[test]
fn offensive_profile_averages_every_roster_week() {
    let store = loaded_store();
    let profile = offensive_profile(&store, "KC", 2024).unwrap().unwrap();
    // 2024 is schedule slots 2..=7: QB passing 250 + 5i, RB rushing 80.
    assert_eq!(profile.games_observed, 6);
    assert!((profile.avg_passing_yards - 272.5).abs() < 1e-9);
    assert!((profile.avg_rushing_yards - 80.0).abs() < 1e-9);
    assert!((profile.pass_rate - 272.5 / 352.5).abs() < 1e-9);
    assert!(offensive_profile(&store, "BUF", 2024).unwrap().is_none());
}

/// KC never records targets and has one blank week; MIA records targets.
fn thin_receiving_seed() -> SeedFile {
    let teams = ["KC", "MIA", "BUF"]
        .iter()
        .map(|abbr| SeedTeam {
            team_abbr: abbr.to_string(),
            team_name: abbr.to_string(),
        })
        .collect();
    let players = [
        ("TE-1", "TE", "KC"),
        ("WR-2", "WR", "KC"),
        ("WR-M", "WR", "MIA"),
        ("TE-M", "TE", "MIA"),
    ]
    .iter()
    .map(|(id, pos, team)| SeedPlayer {
        player_id: id.to_string(),
        name: format!("Player {id}"),
        position: pos.to_string(),
        team: team.to_string(),
    })
    .collect();

    let mut player_stats = Vec::new();
    for week in 1..=4 {
        let blank = week == 3;
        player_stats.push(stat_row(
            "TE-1",
            2024,
            Some(week),
            if blank {
                json!({ "receiving_yards": 0, "receptions": 0 })
            } else {
                json!({ "receiving_yards": 40, "receptions": 4 })
            },
        ));
        player_stats.push(stat_row(
            "WR-2",
            2024,
            Some(week),
            if blank {
                json!({ "receiving_yards": 0, "receptions": 0 })
            } else {
                json!({ "receiving_yards": 60, "receptions": 6 })
            },
        ));
        player_stats.push(stat_row(
            "WR-M",
            2024,
            Some(week),
            json!({ "receiving_yards": 70, "receptions": 5, "targets": 8 }),
        ));
        player_stats.push(stat_row(
            "TE-M",
            2024,
            Some(week),
            json!({ "receiving_yards": 12, "receptions": 1, "targets": 0 }),
        ));
    }

    SeedFile {
        version: Some("1.0".to_string()),
        exported_at: None,
        teams,
        players,
        player_stats,
        team_stats: (1..=4).map(|w| defense_row("BUF", 2024, w, 230, 110)).collect(),
    }
}

#[test]
fn blank_team_week_adds_a_zero_ratio() {
    let store = SqliteStore::open_in_memory().unwrap();
    seed::import_seed(&store, &thin_receiving_seed(), "test").unwrap();
    let te = id(&store, "TE-1");
    let games = store.recent_games(te, 20).unwrap();
    let keys: Vec<GameKey> = games.iter().map(|g| g.key).collect();
    assert_eq!(keys[1], GameKey::new(2024, 3));

    let estimate = share_estimate(
        &store,
        "KC",
        &[StatField::ReceivingYards],
        &games,
        &DecayConfig::default(),
    )
    .unwrap()
    .unwrap();
    let expected = weighted(&[0.4, 0.0, 0.4, 0.4], &keys);
    assert!((estimate.share - expected).abs() < 1e-9);
    assert!(estimate.share < 0.4);
    assert_eq!(estimate.team_total, 300.0);

    let targets = share_estimate(
        &store,
        "KC",
        &[StatField::Targets],
        &games,
        &DecayConfig::default(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(targets.share, 0.0);
    assert_eq!(targets.team_total, 0.0);
}

#[test]
fn receptions_fall_back_to_reception_share_only_without_team_targets() {
    let store = SqliteStore::open_in_memory().unwrap();
    seed::import_seed(&store, &thin_receiving_seed(), "test").unwrap();
    let f = Forecaster::new(&store, ForecastConfig::default());

    let te = id(&store, "TE-1");
    let keys: Vec<GameKey> = store
        .recent_games(te, 20)
        .unwrap()
        .iter()
        .map(|g| g.key)
        .collect();
    let expected = weighted(&[0.4, 0.0, 0.4, 0.4], &keys);
    let forecast = f.predict_receptions(te, "BUF").unwrap();
    assert!((forecast.share.unwrap() - expected).abs() < 6e-4);

    // MIA logged targets, so a zero target share stands.
    let te_m = id(&store, "TE-M");
    let forecast = f.predict_receptions(te_m, "BUF").unwrap();
    assert_eq!(forecast.share, Some(0.0));
}
