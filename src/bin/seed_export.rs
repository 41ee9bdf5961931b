use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use gridiron_props::cli::{self, arg_value, positional};
use gridiron_props::seed;

fn main() -> Result<()> {
    cli::init();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let out = arg_value(&args, "--out")
        .or_else(|| positional(&args).into_iter().next())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("seed_data.json"));

    let (store, db_path) = cli::open_store(&args)?;
    let seed_file = seed::export_seed(&store)?;
    seed::write_seed_file(&out, &seed_file)?;
    info!(
        db = %db_path.display(),
        out = %out.display(),
        teams = seed_file.teams.len(),
        players = seed_file.players.len(),
        player_stats = seed_file.player_stats.len(),
        team_stats = seed_file.team_stats.len(),
        "seed export finished"
    );
    println!("Seed file created: {}", out.display());
    Ok(())
}
