use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionPath {
    /// Matchup-adjusted team projection blended with the player's history.
    Blended,
    /// Team tendency missing: history scaled by opponent vs league reference.
    OpponentScaled,
    /// Opponent has no current-season data: history unmodified.
    Historical,
    /// Player has no qualifying games (or a zero mean).
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendInputs {
    /// Player's time-weighted mean for the target stat.
    pub player_mean: f64,
    /// Player's share of the team total. `None` when the subject's output is
    /// the team output (a passer's yards).
    pub share: Option<f64>,
    /// Team pass or rush rate matching the stat. `None` when team data is
    /// missing.
    pub team_rate: Option<f64>,
    pub league_rate: f64,
    /// Opponent's mean allowed this season.
    pub opponent_mean: Option<f64>,
    /// Generic league figure for the same defensive category.
    pub league_reference: f64,
    /// Team per-game volume for count stats (receptions). When set, the team
    /// projection is `volume * adjusted_defense / league_reference`.
    pub team_volume: Option<f64>,
    /// Weight of the matchup projection; history gets `1 - blend_weight`.
    pub blend_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub value: f64,
    pub path: ProjectionPath,
    pub tendency_multiplier: Option<f64>,
    pub adjusted_defense: Option<f64>,
    pub team_projection: Option<f64>,
    pub individual_projection: Option<f64>,
}

impl Projection {
    pub fn none() -> Self {
        Self {
            value: 0.0,
            path: ProjectionPath::NoData,
            tendency_multiplier: None,
            adjusted_defense: None,
            team_projection: None,
            individual_projection: None,
        }
    }

    fn simple(value: f64, path: ProjectionPath) -> Self {
        Self {
            value,
            path,
            ..Self::none()
        }
    }
}

pub fn tendency_multiplier(team_rate: f64, league_rate: f64) -> f64 {
    if league_rate > 0.0 {
        team_rate / league_rate
    } else {
        1.0
    }
}

pub fn blend_projection(inputs: &BlendInputs) -> Projection {
    let Some(opponent_mean) = inputs.opponent_mean else {
        return Projection::simple(inputs.player_mean, ProjectionPath::Historical);
    };

    let Some(team_rate) = inputs.team_rate else {
        let factor = if inputs.league_reference > 0.0 {
            opponent_mean / inputs.league_reference
        } else {
            1.0
        };
        return Projection::simple(
            inputs.player_mean * factor,
            ProjectionPath::OpponentScaled,
        );
    };

    let multiplier = tendency_multiplier(team_rate, inputs.league_rate);
    let adjusted_defense = opponent_mean * multiplier;
    let team_projection = match inputs.team_volume {
        Some(volume) if inputs.league_reference > 0.0 => {
            volume * adjusted_defense / inputs.league_reference
        }
        _ => adjusted_defense,
    };
    let individual = match inputs.share {
        Some(share) => team_projection * share,
        None => team_projection,
    };
    let w = inputs.blend_weight.clamp(0.0, 1.0);

    Projection {
        value: w * individual + (1.0 - w) * inputs.player_mean,
        path: ProjectionPath::Blended,
        tendency_multiplier: Some(multiplier),
        adjusted_defense: Some(adjusted_defense),
        team_projection: Some(team_projection),
        individual_projection: Some(individual),
    }
}

/// Scoring environment factor for touchdown rates: opponent points allowed
/// relative to the league reference, 1.0 without usable data.
pub fn touchdown_factor(opponent_points: Option<f64>, league_points: f64) -> f64 {
    match opponent_points {
        Some(points) if points > 0.0 && league_points > 0.0 => points / league_points,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> BlendInputs {
        BlendInputs {
            player_mean: 250.0,
            share: None,
            team_rate: Some(0.65),
            league_rate: 0.58,
            opponent_mean: Some(220.0),
            league_reference: 220.0,
            team_volume: None,
            blend_weight: 0.7,
        }
    }

    #[test]
    fn pass_heavy_offense_inflates_defense() {
        let p = blend_projection(&inputs());
        assert_eq!(p.path, ProjectionPath::Blended);
        let m = p.tendency_multiplier.unwrap();
        assert!((m - 1.1207).abs() < 1e-3);
        let adjusted = p.adjusted_defense.unwrap();
        assert!((adjusted - 246.55).abs() < 0.1);
        let expected = 0.7 * adjusted + 0.3 * 250.0;
        assert!((p.value - expected).abs() < 1e-9);
    }

    #[test]
    fn share_scales_individual_projection() {
        let p = blend_projection(&BlendInputs {
            player_mean: 60.0,
            share: Some(0.25),
            ..inputs()
        });
        let individual = p.individual_projection.unwrap();
        assert!((individual - p.adjusted_defense.unwrap() * 0.25).abs() < 1e-9);
        assert!((p.value - (0.7 * individual + 0.3 * 60.0)).abs() < 1e-9);
    }

    #[test]
    fn volume_scales_team_projection_for_counts() {
        let p = blend_projection(&BlendInputs {
            player_mean: 5.0,
            share: Some(0.2),
            team_rate: Some(0.58),
            opponent_mean: Some(250.0),
            league_reference: 250.0,
            team_volume: Some(22.0),
            ..inputs()
        });
        assert!((p.team_projection.unwrap() - 22.0).abs() < 1e-9);
        assert!((p.individual_projection.unwrap() - 4.4).abs() < 1e-9);
    }

    #[test]
    fn missing_team_data_scales_history_by_opponent() {
        let p = blend_projection(&BlendInputs {
            player_mean: 80.0,
            team_rate: None,
            opponent_mean: Some(275.0),
            league_reference: 250.0,
            ..inputs()
        });
        assert_eq!(p.path, ProjectionPath::OpponentScaled);
        assert!((p.value - 88.0).abs() < 1e-9);
        assert!(p.tendency_multiplier.is_none());
    }

    #[test]
    fn missing_opponent_keeps_history() {
        let p = blend_projection(&BlendInputs {
            player_mean: 71.5,
            opponent_mean: None,
            ..inputs()
        });
        assert_eq!(p.path, ProjectionPath::Historical);
        assert_eq!(p.value, 71.5);
    }

    #[test]
    fn touchdown_factor_defaults_to_neutral() {
        assert_eq!(touchdown_factor(None, 22.0), 1.0);
        assert_eq!(touchdown_factor(Some(0.0), 22.0), 1.0);
        assert!((touchdown_factor(Some(27.5), 22.0) - 1.25).abs() < 1e-12);
    }
}
