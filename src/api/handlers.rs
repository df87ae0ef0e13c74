use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::alerts::{evaluate, AlertSettings, Thresholds};
use crate::data::Reading;
use crate::storage::{ReadingStore, StorageError};

/// Default number of readings returned by list endpoints
pub const DEFAULT_LIMIT: usize = 10;
/// Upper bound on readings returned by one request
pub const MAX_LIMIT: usize = 1000;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub thresholds: Thresholds,
    pub alerts: AlertSettings,
    /// Names of the configured notification channels
    pub channels: Vec<String>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Readings
// ============================================================================

#[derive(Serialize)]
pub struct ReadingResponse {
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    /// Descriptions of the thresholds this reading violates
    pub alerts: Vec<String>,
}

impl ReadingResponse {
    fn new(reading: &Reading, thresholds: &Thresholds) -> Self {
        Self {
            timestamp: reading.timestamp_text(),
            temperature: reading.temperature,
            humidity: reading.humidity,
            light: reading.light,
            alerts: evaluate(reading, thresholds)
                .into_iter()
                .map(|f| f.description)
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ReadingsResponse {
    pub readings: Vec<ReadingResponse>,
    pub count: usize,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

impl LimitParams {
    fn resolve(&self) -> Result<usize, ApiError> {
        match self.limit {
            Some(0) => Err(ApiError::BadRequest("limit must be at least 1".to_string())),
            Some(limit) => Ok(limit.min(MAX_LIMIT)),
            None => Ok(DEFAULT_LIMIT),
        }
    }
}

pub async fn latest_reading(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadingResponse>, ApiError> {
    let reading = state
        .store
        .latest(1)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("No readings recorded yet".to_string()))?;

    Ok(Json(ReadingResponse::new(&reading, &state.thresholds)))
}

pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<ReadingsResponse>, ApiError> {
    let limit = params.resolve()?;
    let readings: Vec<ReadingResponse> = state
        .store
        .latest(limit)?
        .iter()
        .map(|r| ReadingResponse::new(r, &state.thresholds))
        .collect();
    let total = state.store.count()?;

    Ok(Json(ReadingsResponse {
        count: readings.len(),
        readings,
        total,
    }))
}

pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Response, ApiError> {
    let limit = params.resolve()?;
    let readings = state.store.latest(limit)?;

    let mut body = String::from("timestamp,temperature,humidity,light\n");
    for r in &readings {
        let _ = writeln!(
            body,
            "{},{},{},{}",
            r.timestamp_text(),
            r.temperature,
            r.humidity,
            r.light
        );
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sensor-logs.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn thresholds(State(state): State<Arc<AppState>>) -> Json<Thresholds> {
    Json(state.thresholds)
}

#[derive(Serialize)]
pub struct SettingsResponse<'a> {
    pub thresholds: Thresholds,
    pub alerts: &'a AlertSettings,
    pub channels: &'a [String],
}

pub async fn settings(State(state): State<Arc<AppState>>) -> Response {
    Json(SettingsResponse {
        thresholds: state.thresholds,
        alerts: &state.alerts,
        channels: &state.channels,
    })
    .into_response()
}

// ============================================================================
// Dashboard page
// ============================================================================

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let latest = state.store.latest(1)?.into_iter().next();

    let mut page = String::from(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"10\">\
         <title>Control Tower</title></head><body>\n<h1>Control Tower</h1>\n",
    );

    match latest {
        Some(reading) => {
            let findings = evaluate(&reading, &state.thresholds);
            let _ = write!(
                page,
                "<p>Last reading: {}</p>\n<ul>\n\
                 <li>Temperature: {} &deg;C</li>\n\
                 <li>Humidity: {} %</li>\n\
                 <li>Light: {} lux</li>\n</ul>\n",
                reading.timestamp_text(),
                reading.temperature,
                reading.humidity,
                reading.light
            );
            if findings.is_empty() {
                page.push_str("<p>All systems normal.</p>\n");
            } else {
                page.push_str("<h2>Alerts</h2>\n<ul>\n");
                for f in findings {
                    let _ = writeln!(page, "<li>{}</li>", f.description);
                }
                page.push_str("</ul>\n");
            }
        }
        None => page.push_str("<p>No readings recorded yet.</p>\n"),
    }

    page.push_str(
        "<p><a href=\"/logs\">Reading history</a> | \
         <a href=\"/readings.csv\">Download log (CSV)</a></p>\n</body></html>\n",
    );
    Ok(Html(page))
}

/// Reading history table, newest first
pub async fn logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Html<String>, ApiError> {
    let limit = params.resolve()?;
    let readings = state.store.latest(limit)?;

    let mut page = String::from(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <title>Control Tower - Sensor Logs</title></head><body>\n<h1>Sensor Logs</h1>\n",
    );

    if readings.is_empty() {
        page.push_str("<p>No readings recorded yet.</p>\n");
    } else {
        page.push_str(
            "<table>\n<tr><th>Timestamp</th><th>Temperature (&deg;C)</th>\
             <th>Humidity (%)</th><th>Light (lux)</th><th>Alerts</th></tr>\n",
        );
        for r in &readings {
            let alerts: Vec<String> = evaluate(r, &state.thresholds)
                .into_iter()
                .map(|f| f.description)
                .collect();
            let _ = writeln!(
                page,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                r.timestamp_text(),
                r.temperature,
                r.humidity,
                r.light,
                if alerts.is_empty() {
                    "-".to_string()
                } else {
                    alerts.join("<br>")
                }
            );
        }
        page.push_str("</table>\n");
    }

    page.push_str("<p><a href=\"/\">Back to dashboard</a></p>\n</body></html>\n");
    Ok(Html(page))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        if let StorageError::InvalidLimit(_) = err {
            return ApiError::BadRequest(err.to_string());
        }
        tracing::error!(component = "dashboard", error = %err, "Store read failed");
        ApiError::Unavailable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
