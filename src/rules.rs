//! Estimation rules: wind speed to damage bucket, damage to adjusted yield.
//!
//! Both operations are pure. Parsing of caller-supplied values lives here too
//! so the HTTP layer and the CLI reject the same inputs.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::EstimateError;

/// Estimated share of the crop lost to wind, as a labeled percentage range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DamageBucket {
    #[serde(rename = "0–10%")]
    Light,
    #[serde(rename = "10–30%")]
    Moderate,
    #[serde(rename = "30–50%")]
    Heavy,
    #[serde(rename = "50–70%")]
    Severe,
    #[serde(rename = "70–100%")]
    Extreme,
    /// No band matched. Reached by fractional speeds that fall between two
    /// integer bands (61.5, 88.5, ...) and by NaN.
    #[serde(rename = "0%")]
    Unclassified,
}

impl DamageBucket {
    pub fn label(self) -> &'static str {
        match self {
            DamageBucket::Light => "0–10%",
            DamageBucket::Moderate => "10–30%",
            DamageBucket::Heavy => "30–50%",
            DamageBucket::Severe => "50–70%",
            DamageBucket::Extreme => "70–100%",
            DamageBucket::Unclassified => "0%",
        }
    }
}

impl fmt::Display for DamageBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a wind speed in km/h to its damage bucket.
///
/// Bands are inclusive on integer boundaries and checked in order, so a
/// value such as 61.5 satisfies none of them and lands in
/// [`DamageBucket::Unclassified`].
pub fn classify_wind_damage(wind_kph: f64) -> DamageBucket {
    if wind_kph <= 61.0 {
        DamageBucket::Light
    } else if (62.0..=88.0).contains(&wind_kph) {
        DamageBucket::Moderate
    } else if (89.0..=117.0).contains(&wind_kph) {
        DamageBucket::Heavy
    } else if (118.0..=157.0).contains(&wind_kph) {
        DamageBucket::Severe
    } else if wind_kph >= 158.0 {
        DamageBucket::Extreme
    } else {
        DamageBucket::Unclassified
    }
}

/// Reduce `base_yield` linearly by `damage_percent`, rounded to cents.
///
/// `damage_percent` may be a JSON number or a numeric string. It is not
/// bounded: values above 100 produce negative yields.
pub fn adjust_yield_for_damage(base_yield: f64, damage_percent: &Value) -> Result<f64, EstimateError> {
    let percent = parse_damage_percent(damage_percent)?;
    Ok(apply_damage(base_yield, percent))
}

pub fn apply_damage(base_yield: f64, damage_percent: f64) -> f64 {
    round_to_cents(base_yield * (1.0 - damage_percent / 100.0))
}

/// Half-away-from-zero rounding to two decimals.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn parse_damage_percent(value: &Value) -> Result<f64, EstimateError> {
    let parsed = match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| EstimateError::invalid(format!("damage_percent {number} is out of range")))?,
        Value::String(text) => parse_number(text).ok_or_else(|| {
            EstimateError::invalid(format!("could not convert string to float: '{text}'"))
        })?,
        Value::Null => {
            return Err(EstimateError::invalid(
                "damage_percent must be a number or a numeric string, got null",
            ))
        }
        other => {
            return Err(EstimateError::invalid(format!(
                "damage_percent must be a number or a numeric string, got {}",
                json_type_name(other)
            )))
        }
    };
    if !parsed.is_finite() {
        return Err(EstimateError::invalid("damage_percent must be a finite number"));
    }
    Ok(parsed)
}

/// Parse a wind speed query value. Absent, unparseable and non-finite values
/// share one message; only absence is a missing field.
pub fn parse_wind_speed(raw: Option<&str>) -> Result<f64, EstimateError> {
    const MESSAGE: &str = "Missing wind parameter";
    let raw = raw.ok_or_else(|| EstimateError::missing(MESSAGE))?;
    parse_number(raw)
        .filter(|wind| wind.is_finite())
        .ok_or_else(|| EstimateError::invalid(MESSAGE))
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
