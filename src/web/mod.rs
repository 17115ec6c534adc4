mod assets;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::{
    config::{BaseYieldPolicy, GroupingConfig, ServiceConfig},
    dataset::{StormArchive, YieldTable},
    error::EstimateError,
    predictor::{PlaceholderPredictor, YearKey, YieldModel},
    rules::{adjust_yield_for_damage, classify_wind_damage, parse_wind_speed, DamageBucket},
};

/// Everything a handler may read. Built once before the listener starts and
/// never mutated afterwards.
pub struct AppState {
    pub base_yield: BaseYieldPolicy,
    pub grouping: GroupingConfig,
    pub yields: YieldTable,
    pub storms: StormArchive,
    pub model: Box<dyn YieldModel>,
}

impl AppState {
    /// Fails when `config` does not validate, so a bad predictor range is
    /// caught before any request is served.
    pub fn new(config: &ServiceConfig, yields: YieldTable, storms: StormArchive) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            base_yield: config.estimation.base_yield.clone(),
            grouping: config.grouping.clone(),
            yields,
            storms,
            model: Box::new(PlaceholderPredictor::new(&config.predictor)?),
        })
    }

    /// Load both datasets named by `config`. A missing storm archive is
    /// fatal; a missing yield table is not.
    pub fn load(config: &ServiceConfig) -> Result<Self> {
        let storms = StormArchive::load(&config.datasets.storm_path)
            .context("Failed to load storm archive")?;
        let yields = YieldTable::load_or_empty(&config.datasets.yield_path);
        Self::new(config, yields, storms)
    }

    pub fn with_model(mut self, model: impl YieldModel + 'static) -> Self {
        self.model = Box::new(model);
        self
    }

    fn base_yield_for(&self, area: &Value, year: &Value) -> f64 {
        match self.base_yield {
            BaseYieldPolicy::Fixed { value } => value,
            BaseYieldPolicy::Historical { fallback } => area
                .as_str()
                .and_then(|area| self.yields.historical_mean(area, year_number(year)))
                .unwrap_or(fallback),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictYieldRequest {
    #[serde(default)]
    pub area: Value,
    #[serde(default)]
    pub year: Value,
}

#[derive(Debug, Serialize)]
pub struct YieldPrediction {
    pub area: String,
    pub year: Value,
    pub predicted_yield: f64,
}

#[derive(Debug, Serialize)]
pub struct CropDamageEstimate {
    pub wind_kph: f64,
    pub estimated_crop_damage_percent: DamageBucket,
}

#[derive(Debug, Deserialize)]
pub struct DamageYieldRequest {
    #[serde(default)]
    pub area: Value,
    #[serde(default)]
    pub year: Value,
    #[serde(default)]
    pub damage_percent: Value,
}

#[derive(Debug, Serialize)]
pub struct DamageAdjustedYield {
    pub area: Value,
    pub year: Value,
    pub damage_percent: Value,
    pub predicted_yield: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict-yield", post(predict_yield))
        .route("/grouped-yield", get(grouped_yield))
        .route("/estimate-crop-damage", get(estimate_crop_damage))
        .route("/predict-yield-by-damage", post(predict_yield_by_damage))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn run(config: ServiceConfig) -> Result<()> {
    let state = AppState::load(&config)?;
    info!(
        storm_rows = state.storms.rows,
        storm_columns = ?state.storms.columns,
        yield_rows = state.yields.len(),
        model = state.model.name(),
        "datasets ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("cropcast listening on http://{addr} (Ctrl+C to stop)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn predict_yield(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictYieldRequest>, JsonRejection>,
) -> Result<Json<YieldPrediction>, EstimateError> {
    let Json(request) = payload.map_err(malformed)?;
    if !is_truthy(&request.area) || !is_truthy(&request.year) {
        debug!(?request, "predict-yield rejected");
        return Err(EstimateError::missing("Missing area or year"));
    }
    let area = request
        .area
        .as_str()
        .ok_or_else(|| EstimateError::invalid("area must be a string"))?
        .to_string();

    let predicted_yield = state.model.predict(&area, &YearKey::from_json(&request.year));
    Ok(Json(YieldPrediction {
        area,
        year: request.year,
        predicted_yield,
    }))
}

async fn grouped_yield(State(state): State<Arc<AppState>>) -> Json<Vec<YieldPrediction>> {
    let (areas, years) = if state.yields.is_empty() {
        (
            state.grouping.fallback_areas.clone(),
            state.grouping.fallback_years.clone(),
        )
    } else {
        (state.yields.areas(), state.yields.years())
    };

    let mut results = Vec::with_capacity(areas.len() * years.len());
    for area in &areas {
        for year in &years {
            results.push(YieldPrediction {
                area: area.clone(),
                year: Value::from(*year),
                predicted_yield: state.model.predict(area, &YearKey::from(*year)),
            });
        }
    }
    Json(results)
}

/// Repeated `wind` keys are allowed; the first one wins.
async fn estimate_crop_damage(
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<CropDamageEstimate>, EstimateError> {
    let Query(pairs) = query.map_err(|rejection| {
        debug!(error = %rejection, "query string rejected");
        EstimateError::invalid("Missing wind parameter")
    })?;
    let raw = pairs
        .iter()
        .find(|(key, _)| key == "wind")
        .map(|(_, value)| value.as_str());
    let wind_kph = parse_wind_speed(raw).inspect_err(|_| {
        debug!(?raw, "estimate-crop-damage rejected");
    })?;
    Ok(Json(CropDamageEstimate {
        wind_kph,
        estimated_crop_damage_percent: classify_wind_damage(wind_kph),
    }))
}

async fn predict_yield_by_damage(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DamageYieldRequest>, JsonRejection>,
) -> Result<Json<DamageAdjustedYield>, EstimateError> {
    let Json(request) = payload.map_err(malformed)?;
    let base_yield = state.base_yield_for(&request.area, &request.year);
    let predicted_yield =
        adjust_yield_for_damage(base_yield, &request.damage_percent).inspect_err(|err| {
            debug!(error = %err, "predict-yield-by-damage rejected");
        })?;

    Ok(Json(DamageAdjustedYield {
        area: request.area,
        year: request.year,
        damage_percent: request.damage_percent,
        predicted_yield,
    }))
}

fn malformed(rejection: JsonRejection) -> EstimateError {
    debug!(error = %rejection, "request body rejected");
    EstimateError::MalformedBody(rejection.body_text())
}

/// Values a caller can send that count as "not provided".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn year_number(year: &Value) -> Option<i64> {
    match year {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
