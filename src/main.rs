use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tracing::info;

use gridiron_props::cli::{self, arg_value, has_flag, parse_arg, positional};
use gridiron_props::config::ForecastConfig;
use gridiron_props::model::Metric;
use gridiron_props::predict::{Forecaster, Matchup, PlayerPrediction};
use gridiron_props::store::SqliteStore;
use gridiron_props::summary;

const USAGE: &str = "\
usage: gridiron_props <command> [--db PATH] [--pretty]

commands:
  predict      --player ID --opponent ABBR
  yardage      --player ID --opponent ABBR [--metric receiving|rushing|passing|total]
  receptions   --player ID --opponent ABBR
  touchdowns   --player ID --opponent ABBR
  passing-tds  --player ID --opponent ABBR
  interceptions --player ID --opponent ABBR
  summary      --player ID [--season YEAR] [--career]
  slate        --file MATCHUPS.json

ID is the store id or the external player id. Numeric values that match no
store row are looked up as external ids; --external forces that lookup.";

#[derive(Debug, Serialize)]
struct SlateRow {
    player_id: i64,
    opponent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prediction: Option<PlayerPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    cli::init();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = positional(&args).into_iter().next() else {
        eprintln!("{USAGE}");
        return Ok(());
    };
    if command == "help" || has_flag(&args, "--help") {
        println!("{USAGE}");
        return Ok(());
    }

    let pretty = has_flag(&args, "--pretty");
    let (store, db_path) = cli::open_store(&args)?;
    let mut config = ForecastConfig::from_env();
    if let Some(season) = parse_arg::<i32>(&args, "--season") {
        config.season = Some(season);
    }
    info!(db = %db_path.display(), command = %command, "gridiron_props");

    match command.as_str() {
        "predict" => {
            let (player_id, opponent) = matchup_args(&store, &args)?;
            let forecaster = Forecaster::new(&store, config);
            cli::print_json(&forecaster.predict_player(player_id, &opponent)?, pretty)
        }
        "yardage" => {
            let (player_id, opponent) = matchup_args(&store, &args)?;
            let metric = match arg_value(&args, "--metric") {
                Some(raw) => {
                    Some(Metric::parse(&raw).ok_or_else(|| anyhow!("unknown metric: {raw}"))?)
                }
                None => None,
            };
            let forecaster = Forecaster::new(&store, config);
            cli::print_json(
                &forecaster.predict_yardage(player_id, &opponent, metric)?,
                pretty,
            )
        }
        "receptions" => {
            let (player_id, opponent) = matchup_args(&store, &args)?;
            let forecaster = Forecaster::new(&store, config);
            cli::print_json(&forecaster.predict_receptions(player_id, &opponent)?, pretty)
        }
        "touchdowns" => {
            let (player_id, opponent) = matchup_args(&store, &args)?;
            let forecaster = Forecaster::new(&store, config);
            cli::print_json(&forecaster.predict_touchdowns(player_id, &opponent)?, pretty)
        }
        "passing-tds" => {
            let (player_id, opponent) = matchup_args(&store, &args)?;
            let forecaster = Forecaster::new(&store, config);
            cli::print_json(
                &forecaster.predict_passing_touchdowns(player_id, &opponent)?,
                pretty,
            )
        }
        "interceptions" => {
            let (player_id, opponent) = matchup_args(&store, &args)?;
            let forecaster = Forecaster::new(&store, config);
            cli::print_json(
                &forecaster.predict_interceptions(player_id, &opponent)?,
                pretty,
            )
        }
        "summary" => {
            let player_id = player_arg(&store, &args)?;
            if has_flag(&args, "--career") {
                cli::print_json(&summary::career_summary(&store, player_id)?, pretty)
            } else {
                cli::print_json(
                    &summary::season_summary(&store, player_id, config.season)?,
                    pretty,
                )
            }
        }
        "slate" => {
            let path = arg_value(&args, "--file")
                .map(PathBuf::from)
                .context("slate needs --file MATCHUPS.json")?;
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read slate {}", path.display()))?;
            let matchups: Vec<Matchup> = serde_json::from_str(&raw)
                .with_context(|| format!("parse slate {}", path.display()))?;

            let forecaster = Forecaster::new(&store, config);
            let rows = forecaster
                .predict_slate(&matchups)
                .into_iter()
                .map(|entry| {
                    let (prediction, error) = match entry.outcome {
                        Ok(p) => (Some(p), None),
                        Err(err) => (None, Some(err.to_string())),
                    };
                    SlateRow {
                        player_id: entry.matchup.player_id,
                        opponent: entry.matchup.opponent,
                        prediction,
                        error,
                    }
                })
                .collect::<Vec<_>>();
            let failed = rows.iter().filter(|r| r.error.is_some()).count();
            info!(matchups = rows.len(), failed, "slate forecast");
            cli::print_json(&rows, pretty)
        }
        other => {
            eprintln!("{USAGE}");
            bail!("unknown command: {other}")
        }
    }
}

fn matchup_args(store: &SqliteStore, args: &[String]) -> Result<(i64, String)> {
    let player_id = player_arg(store, args)?;
    let opponent = arg_value(args, "--opponent").context("missing --opponent ABBR")?;
    Ok((player_id, opponent))
}

fn player_arg(store: &SqliteStore, args: &[String]) -> Result<i64> {
    let raw = arg_value(args, "--player").context("missing --player ID")?;
    cli::resolve_player(store, &raw, has_flag(args, "--external"))
}
