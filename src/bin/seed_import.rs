use std::path::PathBuf;

use anyhow::{Context, Result};

use gridiron_props::cli::{self, arg_value, positional};
use gridiron_props::seed;

fn main() -> Result<()> {
    cli::init();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let seed_path = arg_value(&args, "--file")
        .or_else(|| positional(&args).into_iter().next())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("seed_data.json"));

    let (store, db_path) = cli::open_store(&args)?;
    let seed_file = seed::read_seed_file(&seed_path)?;
    let source = seed_path.display().to_string();
    let summary = seed::import_seed(&store, &seed_file, &source)
        .with_context(|| format!("import {source}"))?;

    println!("Seed import complete");
    println!("DB: {}", db_path.display());
    println!("Seed version: {}", seed_file.version.as_deref().unwrap_or("n/a"));
    println!("Exported at: {}", seed_file.exported_at.as_deref().unwrap_or("n/a"));
    println!("Run: {}", summary.run_id);
    println!("Teams: {}", summary.teams);
    println!("Players: {}", summary.players);
    println!("Player games: {}", summary.player_games);
    println!("Team games: {}", summary.team_games);
    if !summary.skipped.is_empty() {
        println!("Skipped: {}", summary.skipped.len());
        for reason in summary.skipped.iter().take(6) {
            println!("   - {reason}");
        }
    }
    Ok(())
}
