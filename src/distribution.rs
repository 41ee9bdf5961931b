use std::collections::BTreeMap;

use statrs::distribution::{ContinuousCDF, Discrete, Normal, Poisson};

/// P(outcome >= t) for each benchmark under Normal(projection, std), as a
/// percentage rounded to 2 decimals.
pub fn exceedance_probabilities(
    projection: f64,
    std: f64,
    benchmarks: &[u32],
) -> BTreeMap<u32, f64> {
    let standard = Normal::new(0.0, 1.0).ok();
    benchmarks
        .iter()
        .map(|&t| {
            let p = match standard.as_ref() {
                Some(normal) if std > 0.0 => {
                    let z = (t as f64 - projection) / std;
                    1.0 - normal.cdf(z)
                }
                // Degenerate spread: the outcome is the projection itself.
                _ => {
                    if projection >= t as f64 {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            (t, percent(p))
        })
        .collect()
}

/// Poisson probability of exactly `k` occurrences. Zero rate means zero
/// occurrences with certainty.
pub fn poisson_exact(lambda: f64, k: u32) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    match Poisson::new(lambda) {
        Ok(dist) => dist.pmf(u64::from(k)),
        Err(_) => 0.0,
    }
}

/// P(X >= k) = 1 - sum_{j<k} pmf(j).
pub fn poisson_at_least(lambda: f64, k: u32) -> f64 {
    if k == 0 {
        return 1.0;
    }
    let below: f64 = (0..k).map(|j| poisson_exact(lambda, j)).sum();
    (1.0 - below).clamp(0.0, 1.0)
}

/// P(X >= k) per threshold as rounded percentages.
pub fn at_least_probabilities(lambda: f64, thresholds: &[u32]) -> BTreeMap<u32, f64> {
    thresholds
        .iter()
        .map(|&k| (k, percent(poisson_at_least(lambda, k))))
        .collect()
}

/// Every benchmark at 0.0; used when the player has nothing to model.
pub fn zero_probabilities(benchmarks: &[u32]) -> BTreeMap<u32, f64> {
    benchmarks.iter().map(|&t| (t, 0.0)).collect()
}

/// `1 / (1 + std/mean)`; higher is steadier. 0 when the mean is not positive.
pub fn consistency_score(mean: f64, std: f64) -> f64 {
    if mean > 0.0 {
        1.0 / (1.0 + std / mean)
    } else {
        0.0
    }
}

pub fn percent(p: f64) -> f64 {
    round_to(p * 100.0, 2)
}

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (v * scale).round() / scale
}
