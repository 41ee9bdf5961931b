use crate::model::Metric;

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("player not found: {0}")]
    PlayerNotFound(i64),

    #[error("team not found: {0}")]
    TeamNotFound(String),

    #[error("{0} cannot be forecast as a yardage distribution")]
    UnsupportedMetric(Metric),

    /// Store failures are passed through untouched.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ForecastError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ForecastError::PlayerNotFound(_) | ForecastError::TeamNotFound(_)
        )
    }
}
