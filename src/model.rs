use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    PassingAttempts,
    PassingCompletions,
    PassingYards,
    PassingTouchdowns,
    Interceptions,
    Rushes,
    RushingYards,
    RushingTouchdowns,
    Receptions,
    Targets,
    ReceivingYards,
    ReceivingTouchdowns,
}

impl StatField {
    pub const ALL: [StatField; 12] = [
        StatField::PassingAttempts,
        StatField::PassingCompletions,
        StatField::PassingYards,
        StatField::PassingTouchdowns,
        StatField::Interceptions,
        StatField::Rushes,
        StatField::RushingYards,
        StatField::RushingTouchdowns,
        StatField::Receptions,
        StatField::Targets,
        StatField::ReceivingYards,
        StatField::ReceivingTouchdowns,
    ];

    /// Column name in the `player_games` table and key in seed files.
    pub fn column(self) -> &'static str {
        match self {
            StatField::PassingAttempts => "passing_attempts",
            StatField::PassingCompletions => "passing_completions",
            StatField::PassingYards => "passing_yards",
            StatField::PassingTouchdowns => "passing_touchdowns",
            StatField::Interceptions => "interceptions",
            StatField::Rushes => "rushes",
            StatField::RushingYards => "rushing_yards",
            StatField::RushingTouchdowns => "rushing_touchdowns",
            StatField::Receptions => "receptions",
            StatField::Targets => "targets",
            StatField::ReceivingYards => "receiving_yards",
            StatField::ReceivingTouchdowns => "receiving_touchdowns",
        }
    }
}

/// Sparse per-game stat values.
///
/// A field that was never recorded reads as `0.0`: missing stats are treated
/// as zero occurrences, never as unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatLine(BTreeMap<StatField, f64>);

impl StatLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: StatField, value: f64) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: StatField, value: f64) {
        self.0.insert(field, value);
    }

    pub fn get(&self, field: StatField) -> f64 {
        self.0.get(&field).copied().unwrap_or(0.0)
    }

    pub fn recorded(&self, field: StatField) -> Option<f64> {
        self.0.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameKey {
    pub season: i32,
    pub week: u32,
}

impl GameKey {
    pub fn new(season: i32, week: u32) -> Self {
        Self { season, week }
    }

    /// Most recent first: season desc, then week desc.
    pub fn recency_cmp(&self, other: &GameKey) -> Ordering {
        other
            .season
            .cmp(&self.season)
            .then(other.week.cmp(&self.week))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub subject_id: i64,
    pub key: GameKey,
    pub opponent: Option<String>,
    pub stats: StatLine,
}

/// What a defense gave up in one game (or one season for aggregate rows).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseLine {
    #[serde(default)]
    pub points_against: Option<i64>,
    #[serde(default)]
    pub yards_against: Option<i64>,
    #[serde(default)]
    pub passing_yards_against: Option<i64>,
    #[serde(default)]
    pub rushing_yards_against: Option<i64>,
}

impl DefenseLine {
    pub fn allowed(&self, category: DefenseCategory) -> f64 {
        let raw = match category {
            DefenseCategory::Passing => self.passing_yards_against,
            DefenseCategory::Rushing => self.rushing_yards_against,
            DefenseCategory::Total => self.yards_against,
            DefenseCategory::Points => self.points_against,
        };
        raw.unwrap_or(0) as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Passer,
    Skill,
}

impl Position {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QB" => Position::Quarterback,
            "RB" | "FB" | "HB" => Position::RunningBack,
            "WR" => Position::WideReceiver,
            "TE" => Position::TightEnd,
            other => Position::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Other(code) => code,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Position::Quarterback => Role::Passer,
            _ => Role::Skill,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for Position {
    fn from(raw: String) -> Self {
        Position::parse(&raw)
    }
}

impl From<Position> for String {
    fn from(pos: Position) -> Self {
        pos.code().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub position: Position,
    pub team: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub abbr: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseCategory {
    Passing,
    Rushing,
    Total,
    Points,
}

impl DefenseCategory {
    pub fn column(self) -> &'static str {
        match self {
            DefenseCategory::Passing => "passing_yards_against",
            DefenseCategory::Rushing => "rushing_yards_against",
            DefenseCategory::Total => "yards_against",
            DefenseCategory::Points => "points_against",
        }
    }
}

/// Which side of the offensive split a metric draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tendency {
    Pass,
    Rush,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceFloor {
    /// Below this std-dev the series is considered implausibly tight.
    pub min_std: f64,
    /// Replacement std as a fraction of the weighted mean.
    pub mean_ratio: f64,
}

pub const YARDAGE_BENCHMARKS: &[u32] = &[15, 25, 40, 50, 65, 75, 100, 125, 150];
pub const PASSING_BENCHMARKS: &[u32] = &[150, 200, 250, 300, 350, 400, 450, 500];
pub const RECEPTION_BENCHMARKS: &[u32] = &[2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
pub const TOTAL_YARD_BENCHMARKS: &[u32] = &[25, 50, 75, 100, 125, 150, 175, 200];
pub const PASSING_TD_THRESHOLDS: &[u32] = &[1, 2, 3, 4];
pub const TOUCHDOWN_THRESHOLDS: &[u32] = &[1, 2];
pub const INTERCEPTION_THRESHOLDS: &[u32] = &[1, 2];

/// A forecastable per-game series derived from a `StatLine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ReceivingYards,
    RushingYards,
    PassingYards,
    TotalYards,
    Receptions,
    Touchdowns,
    PassingTouchdowns,
    Interceptions,
}

impl Metric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "receiving_yards" | "receiving" => Some(Metric::ReceivingYards),
            "rushing_yards" | "rushing" => Some(Metric::RushingYards),
            "passing_yards" | "passing" => Some(Metric::PassingYards),
            "total_yards" | "total" => Some(Metric::TotalYards),
            "receptions" => Some(Metric::Receptions),
            "touchdowns" => Some(Metric::Touchdowns),
            "passing_touchdowns" => Some(Metric::PassingTouchdowns),
            "interceptions" => Some(Metric::Interceptions),
            _ => None,
        }
    }

    pub fn value(self, line: &StatLine) -> f64 {
        match self {
            Metric::ReceivingYards => line.get(StatField::ReceivingYards),
            Metric::RushingYards => line.get(StatField::RushingYards),
            Metric::PassingYards => line.get(StatField::PassingYards),
            Metric::TotalYards => {
                line.get(StatField::ReceivingYards) + line.get(StatField::RushingYards)
            }
            Metric::Receptions => line.get(StatField::Receptions),
            Metric::Touchdowns => {
                line.get(StatField::ReceivingTouchdowns) + line.get(StatField::RushingTouchdowns)
            }
            Metric::PassingTouchdowns => line.get(StatField::PassingTouchdowns),
            Metric::Interceptions => line.get(StatField::Interceptions),
        }
    }

    pub fn is_count(self) -> bool {
        matches!(
            self,
            Metric::Touchdowns | Metric::PassingTouchdowns | Metric::Interceptions
        )
    }

    /// Defensive figure the opponent adjustment reads, if any.
    pub fn defense_category(self) -> Option<DefenseCategory> {
        match self {
            Metric::ReceivingYards | Metric::PassingYards | Metric::Receptions => {
                Some(DefenseCategory::Passing)
            }
            Metric::RushingYards => Some(DefenseCategory::Rushing),
            Metric::TotalYards => Some(DefenseCategory::Total),
            Metric::Touchdowns | Metric::PassingTouchdowns => Some(DefenseCategory::Points),
            Metric::Interceptions => None,
        }
    }

    pub fn tendency(self) -> Tendency {
        match self {
            Metric::ReceivingYards | Metric::PassingYards | Metric::Receptions => Tendency::Pass,
            Metric::RushingYards => Tendency::Rush,
            _ => Tendency::Neutral,
        }
    }

    /// Team-total fields the player's share is measured against. `None` means
    /// the subject's output is the team output (a passer's yards).
    pub fn share_fields(self) -> Option<&'static [StatField]> {
        match self {
            Metric::ReceivingYards => Some(&[StatField::ReceivingYards]),
            Metric::RushingYards => Some(&[StatField::RushingYards]),
            Metric::TotalYards => Some(&[StatField::ReceivingYards, StatField::RushingYards]),
            Metric::Receptions => Some(&[StatField::Targets]),
            _ => None,
        }
    }

    /// Share fields used when the primary ones yield nothing (seed data
    /// without targets).
    pub fn fallback_share_fields(self) -> Option<&'static [StatField]> {
        match self {
            Metric::Receptions => Some(&[StatField::Receptions]),
            _ => None,
        }
    }

    /// Team per-game volume a count-style projection scales, if any.
    pub fn volume_field(self) -> Option<StatField> {
        match self {
            Metric::Receptions => Some(StatField::Receptions),
            _ => None,
        }
    }

    pub fn variance_floor(self) -> VarianceFloor {
        match self {
            Metric::PassingYards => VarianceFloor {
                min_std: 20.0,
                mean_ratio: 0.25,
            },
            Metric::Receptions => VarianceFloor {
                min_std: 1.0,
                mean_ratio: 0.30,
            },
            Metric::TotalYards => VarianceFloor {
                min_std: 8.0,
                mean_ratio: 0.30,
            },
            _ => VarianceFloor {
                min_std: 5.0,
                mean_ratio: 0.30,
            },
        }
    }

    pub fn benchmarks(self) -> &'static [u32] {
        match self {
            Metric::ReceivingYards | Metric::RushingYards => YARDAGE_BENCHMARKS,
            Metric::PassingYards => PASSING_BENCHMARKS,
            Metric::TotalYards => TOTAL_YARD_BENCHMARKS,
            Metric::Receptions => RECEPTION_BENCHMARKS,
            Metric::Touchdowns => TOUCHDOWN_THRESHOLDS,
            Metric::PassingTouchdowns => PASSING_TD_THRESHOLDS,
            Metric::Interceptions => INTERCEPTION_THRESHOLDS,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::ReceivingYards => "receiving_yards",
            Metric::RushingYards => "rushing_yards",
            Metric::PassingYards => "passing_yards",
            Metric::TotalYards => "total_yards",
            Metric::Receptions => "receptions",
            Metric::Touchdowns => "touchdowns",
            Metric::PassingTouchdowns => "passing_touchdowns",
            Metric::Interceptions => "interceptions",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamOffensiveProfile {
    pub avg_passing_yards: f64,
    pub avg_rushing_yards: f64,
    pub pass_rate: f64,
    pub rush_rate: f64,
    pub games_observed: usize,
}

impl TeamOffensiveProfile {
    pub fn rate(&self, tendency: Tendency) -> f64 {
        match tendency {
            Tendency::Pass => self.pass_rate,
            Tendency::Rush => self.rush_rate,
            Tendency::Neutral => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeagueTendency {
    pub pass_rate: f64,
    pub rush_rate: f64,
    pub teams_observed: usize,
}

impl LeagueTendency {
    pub fn rate(&self, tendency: Tendency) -> f64 {
        match tendency {
            Tendency::Pass => self.pass_rate,
            Tendency::Rush => self.rush_rate,
            Tendency::Neutral => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefensiveBaseline {
    pub mean_allowed: f64,
    pub std_allowed: f64,
    pub games: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_stat_fields_read_as_zero() {
        let line = StatLine::new().with(StatField::ReceivingYards, 54.0);
        assert_eq!(line.get(StatField::ReceivingYards), 54.0);
        assert_eq!(line.get(StatField::RushingYards), 0.0);
        assert!(line.recorded(StatField::RushingYards).is_none());
        assert_eq!(Metric::TotalYards.value(&line), 54.0);
        assert_eq!(Metric::Touchdowns.value(&line), 0.0);
    }

    #[test]
    fn recency_cmp_orders_season_then_week_descending() {
        let mut keys = vec![
            GameKey::new(2023, 17),
            GameKey::new(2024, 2),
            GameKey::new(2024, 9),
            GameKey::new(2022, 1),
        ];
        keys.sort_by(|a, b| a.recency_cmp(b));
        assert_eq!(
            keys,
            vec![
                GameKey::new(2024, 9),
                GameKey::new(2024, 2),
                GameKey::new(2023, 17),
                GameKey::new(2022, 1),
            ]
        );
    }

    #[test]
    fn position_maps_to_role() {
        assert_eq!(Position::parse("qb").role(), Role::Passer);
        assert_eq!(Position::parse("WR").role(), Role::Skill);
        assert_eq!(Position::parse("K"), Position::Other("K".to_string()));
        assert_eq!(Position::parse("K").role(), Role::Skill);
    }

    #[test]
    fn benchmark_lists_are_ascending() {
        for metric in [
            Metric::ReceivingYards,
            Metric::PassingYards,
            Metric::TotalYards,
            Metric::Receptions,
            Metric::PassingTouchdowns,
        ] {
            let list = metric.benchmarks();
            assert!(list.windows(2).all(|w| w[0] < w[1]), "{metric}");
        }
    }
}
