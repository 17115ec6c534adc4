//! Service configuration, loaded from YAML. Every section is optional.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_storm_path() -> PathBuf {
    PathBuf::from("dataset/historical-storm-dataset.csv")
}

fn default_yield_path() -> PathBuf {
    PathBuf::from("dataset/yield.csv")
}

fn default_base_yield() -> f64 {
    100.0
}

fn default_min_yield() -> u32 {
    2000
}

fn default_max_yield() -> u32 {
    6000
}

fn default_fallback_areas() -> Vec<String> {
    vec!["Area1".to_string(), "Area2".to_string()]
}

fn default_fallback_years() -> Vec<i64> {
    vec![2020, 2021]
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub datasets: DatasetConfig,
    #[serde(default)]
    pub estimation: EstimationConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_storm_path")]
    pub storm_path: PathBuf,
    #[serde(default = "default_yield_path")]
    pub yield_path: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            storm_path: default_storm_path(),
            yield_path: default_yield_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimationConfig {
    #[serde(default)]
    pub base_yield: BaseYieldPolicy,
}

/// Where the multiplicand for damage-adjusted yields comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BaseYieldPolicy {
    /// The same figure for every request.
    Fixed {
        #[serde(default = "default_base_yield")]
        value: f64,
    },
    /// Mean of historical rows for the area and year, then for the area,
    /// then `fallback`.
    Historical {
        #[serde(default = "default_base_yield")]
        fallback: f64,
    },
}

impl Default for BaseYieldPolicy {
    fn default() -> Self {
        BaseYieldPolicy::Fixed {
            value: default_base_yield(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_min_yield")]
    pub min_yield: u32,
    #[serde(default = "default_max_yield")]
    pub max_yield: u32,
}

impl PredictorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_yield >= self.max_yield {
            bail!(
                "predictor.min_yield ({}) must be below predictor.max_yield ({})",
                self.min_yield,
                self.max_yield
            );
        }
        Ok(())
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            min_yield: default_min_yield(),
            max_yield: default_max_yield(),
        }
    }
}

/// Areas and years listed by `/grouped-yield` when the yield table is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    #[serde(default = "default_fallback_areas")]
    pub fallback_areas: Vec<String>,
    #[serde(default = "default_fallback_years")]
    pub fallback_years: Vec<i64>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            fallback_areas: default_fallback_areas(),
            fallback_years: default_fallback_years(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: ServiceConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.predictor.validate()?;
        if self.grouping.fallback_areas.is_empty() || self.grouping.fallback_years.is_empty() {
            bail!("grouping fallback areas and years must not be empty");
        }
        let base = match self.estimation.base_yield {
            BaseYieldPolicy::Fixed { value } => value,
            BaseYieldPolicy::Historical { fallback } => fallback,
        };
        if !base.is_finite() {
            bail!("estimation.base_yield must be a finite number");
        }
        Ok(())
    }
}
