pub mod config;
pub mod dataset;
pub mod error;
pub mod predictor;
pub mod rules;
pub mod web;

pub use config::ServiceConfig;
pub use error::{DatasetError, EstimateError};
pub use rules::{adjust_yield_for_damage, classify_wind_damage, DamageBucket};
