//! Placeholder yield predictor.
//!
//! There is no trained model behind this. The value is a seeded
//! pseudo-random integer keyed by (area, year) so that repeated requests get
//! repeated answers.

use std::fmt;

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;

use crate::config::PredictorConfig;

/// Year as it arrives from a caller or the yield table. Numbers and numeric
/// strings with the same text share a seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearKey(String);

impl YearKey {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(text) => Self(text.clone()),
            other => Self(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for YearKey {
    fn from(year: i64) -> Self {
        Self(year.to_string())
    }
}

impl fmt::Display for YearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seam for anything that produces a yield figure for an area and year.
pub trait YieldModel: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, area: &str, year: &YearKey) -> f64;
}

/// Deterministic stand-in returning an integer in `[min_yield, max_yield)`.
/// Non-predictive.
pub struct PlaceholderPredictor {
    seed: u64,
    min_yield: u32,
    max_yield: u32,
}

impl PlaceholderPredictor {
    /// Fails when the configured range is empty.
    pub fn new(config: &PredictorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            seed: config.seed,
            min_yield: config.min_yield,
            max_yield: config.max_yield,
        })
    }

    fn derive_seed(&self, area: &str, year: &YearKey) -> u64 {
        let mut seed = self.seed;
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        seed ^= fnv1a(area.as_bytes());
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        seed ^= fnv1a(year.as_str().as_bytes());
        seed
    }
}

impl Default for PlaceholderPredictor {
    fn default() -> Self {
        let config = PredictorConfig::default();
        Self {
            seed: config.seed,
            min_yield: config.min_yield,
            max_yield: config.max_yield,
        }
    }
}

impl YieldModel for PlaceholderPredictor {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn predict(&self, area: &str, year: &YearKey) -> f64 {
        let mut rng = ChaCha8Rng::seed_from_u64(self.derive_seed(area, year));
        rng.gen_range(self.min_yield..self.max_yield) as f64
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}
