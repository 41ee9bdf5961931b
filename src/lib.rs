pub mod backtest;
pub mod cli;
pub mod config;
pub mod defense;
pub mod distribution;
pub mod error;
pub mod model;
pub mod predict;
pub mod projection;
pub mod seed;
pub mod share;
pub mod store;
pub mod summary;
pub mod synthetic;
pub mod tendency;
pub mod weighting;

pub use config::ForecastConfig;
pub use error::ForecastError;
pub use predict::Forecaster;
pub use store::{SqliteStore, StatStore};
