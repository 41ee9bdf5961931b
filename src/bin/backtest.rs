use anyhow::Result;

use gridiron_props::backtest::{self, BacktestConfig, expected_calibration_error};
use gridiron_props::cli::{self, arg_value, has_flag, parse_arg};
use gridiron_props::config::ForecastConfig;
use gridiron_props::model::Metric;

fn main() -> Result<()> {
    cli::init();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let (store, db_path) = cli::open_store(&args)?;

    let mut config = BacktestConfig::from_forecast(&ForecastConfig::from_env());
    if let Some(raw) = arg_value(&args, "--metrics") {
        let metrics = raw
            .split(',')
            .filter_map(Metric::parse)
            .collect::<Vec<_>>();
        if !metrics.is_empty() {
            config.metrics = metrics;
        }
    }
    config.min_history = parse_arg::<usize>(&args, "--min-history")
        .unwrap_or(config.min_history)
        .clamp(1, 100);
    config.bins = parse_arg::<usize>(&args, "--bins")
        .unwrap_or(config.bins)
        .clamp(2, 50);

    let reports = backtest::run_backtest(&store, &config)?;
    if has_flag(&args, "--json") {
        return cli::print_json(&reports, true);
    }

    println!("Walk-forward calibration");
    println!("DB: {}", db_path.display());
    println!("Min history: {} games", config.min_history);
    println!();
    println!(
        "{:<20} {:>8} {:>10} {:>8} {:>9} {:>9} {:>8}",
        "metric", "players", "events", "brier", "log_loss", "base", "ece"
    );
    for report in &reports {
        println!(
            "{:<20} {:>8} {:>10} {:>8.4} {:>9.4} {:>9.3} {:>8.4}",
            report.metric.label(),
            report.players,
            report.metrics.samples,
            report.metrics.brier,
            report.metrics.log_loss,
            report.metrics.base_rate,
            expected_calibration_error(&report.bins)
        );
    }

    if has_flag(&args, "--bins-detail") {
        for report in &reports {
            println!();
            println!("{}", report.metric.label());
            for bin in report.bins.iter().filter(|b| b.count > 0) {
                println!(
                    "  [{:.2}, {:.2}) n={:<6} pred={:.3} actual={:.3}",
                    bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
                );
            }
        }
    }
    Ok(())
}
