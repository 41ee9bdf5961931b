use std::path::PathBuf;

use anyhow::Result;

use gridiron_props::cli::{self, arg_value, has_flag, parse_arg};
use gridiron_props::seed;
use gridiron_props::synthetic::{self, SyntheticParams};

fn main() -> Result<()> {
    cli::init();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let defaults = SyntheticParams::default();
    let params = SyntheticParams {
        first_season: parse_arg(&args, "--first-season").unwrap_or(defaults.first_season),
        seasons: parse_arg::<u32>(&args, "--seasons")
            .unwrap_or(defaults.seasons)
            .clamp(1, 10),
        weeks: parse_arg::<u32>(&args, "--weeks")
            .unwrap_or(defaults.weeks)
            .clamp(1, 18),
        seed: parse_arg(&args, "--seed"),
    };

    let league = synthetic::generate_league(&params);
    if let Some(out) = arg_value(&args, "--out") {
        seed::write_seed_file(&PathBuf::from(&out), &league)?;
        println!("Synthetic seed file written: {out}");
    }
    if has_flag(&args, "--dry-run") {
        println!(
            "Synthetic league: {} teams, {} players, {} player games",
            league.teams.len(),
            league.players.len(),
            league.player_stats.len()
        );
        return Ok(());
    }

    let (store, db_path) = cli::open_store(&args)?;
    let summary = seed::import_seed(&store, &league, "synthetic")?;
    println!("Synthetic league loaded");
    println!("DB: {}", db_path.display());
    println!(
        "Seasons: {}..={}",
        params.first_season,
        params.first_season + params.seasons as i32 - 1
    );
    println!("Players: {}", summary.players);
    println!("Player games: {}", summary.player_games);
    println!("Team games: {}", summary.team_games);
    Ok(())
}
