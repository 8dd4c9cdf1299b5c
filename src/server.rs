//! HTTP surface: an options endpoint feeding the form menus and the
//! prediction endpoint. Internal failures are converted into structured
//! JSON payloads; the process keeps serving after any failed request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::infer::ModelCache;
use crate::{dataset, normalize};

pub struct AppState {
    pub cache: ModelCache,
    pub data_path: PathBuf,
}

impl AppState {
    pub fn new(model_path: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            cache: ModelCache::new(model_path),
            data_path: data_path.into(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/options", get(options))
        .route("/predict", post(predict))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct OptionsResponse {
    crop_type: Vec<String>,
    region: Vec<String>,
    soil_type: Vec<String>,
}

/// Unique menu values for the categorical inputs. Falls back to empty
/// menus when the dataset is unreadable; never an error response.
async fn options(State(state): State<Arc<AppState>>) -> Json<OptionsResponse> {
    match dataset::load(&state.data_path) {
        Ok(df) => Json(OptionsResponse {
            crop_type: dataset::unique_values(&df, "crop_type"),
            region: dataset::unique_values(&df, "region"),
            soil_type: dataset::unique_values(&df, "soil_type"),
        }),
        Err(err) => {
            warn!(%err, "options menus unavailable, returning empty lists");
            Json(OptionsResponse::default())
        }
    }
}

async fn predict(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(raw) = parse_body(&headers, &body) else {
        return client_error(json!({ "error": "Invalid request body" }));
    };

    // Field presence is validated before the model is consulted, so a
    // malformed request reads as a client error even when no artifact
    // exists yet.
    let missing = normalize::missing_required(&raw);
    if !missing.is_empty() {
        return client_error(json!({ "error": "Missing fields", "missing": missing }));
    }

    let pipeline = match state.cache.get_or_load() {
        Ok(pipeline) => pipeline,
        Err(err) => return server_error(&err.to_string()),
    };
    let record = match normalize::normalize(&raw, &pipeline.required_features()) {
        Ok(record) => record,
        Err(err) => return client_error(json!({ "error": err.to_string() })),
    };
    match state.cache.predict(&record) {
        Ok(prediction) => {
            Json(json!({ "prediction_tonnes_per_hectare": prediction })).into_response()
        }
        Err(err) => server_error(&err.to_string()),
    }
}

/// Accept the same payloads the original form posts: JSON bodies and
/// form-encoded bodies, both reduced to one untyped map for the
/// normalization boundary.
fn parse_body(headers: &HeaderMap, body: &Bytes) -> Option<HashMap<String, Value>> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type.starts_with("application/json") {
        serde_json::from_slice(body).ok()
    } else {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
            .ok()
            .map(|pairs| {
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect()
            })
    }
}

fn client_error(payload: Value) -> Response {
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

fn server_error(details: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Prediction failed", "details": details })),
    )
        .into_response()
}
