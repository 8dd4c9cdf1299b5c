//! Endpoint-level tests: options fallback behavior and the predict
//! request/response contract.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use http_body_util::BodyExt;
use polars::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crop_yield_predictor::pipeline;
use crop_yield_predictor::schema;
use crop_yield_predictor::server::{router, AppState};

fn training_frame() -> DataFrame {
    let rows = 60;
    let crops = ["maize", "rice", "wheat"];
    let regions = ["east", "north", "south"];
    let soils = ["clay", "loamy", "sandy"];
    let mut crop = Vec::new();
    let mut region = Vec::new();
    let mut soil = Vec::new();
    let mut temperature = Vec::new();
    let mut rainfall = Vec::new();
    let mut humidity = Vec::new();
    let mut production = Vec::new();
    for i in 0..rows {
        let t = 15.0 + (i as f64 % 20.0);
        let r = 100.0 + 30.0 * i as f64;
        crop.push(crops[i % 3]);
        region.push(regions[(i / 3) % 3]);
        soil.push(soils[(i / 9) % 3]);
        temperature.push(t);
        rainfall.push(r);
        humidity.push(40.0 + (i as f64 % 50.0));
        production.push(2.0 * t + 0.01 * r);
    }
    DataFrame::new(vec![
        Series::new("crop_type", &crop),
        Series::new("region", &region),
        Series::new("soil_type", &soil),
        Series::new("temperature_c", &temperature),
        Series::new("rainfall_mm", &rainfall),
        Series::new("humidity", &humidity),
        Series::new("production_tonnes_per_hectare", &production),
    ])
    .expect("training frame")
}

fn trained_state(dir: &TempDir) -> Arc<AppState> {
    let trained = pipeline::train(&training_frame(), schema::TARGET).expect("train");
    let model_path = dir.path().join("model.bin");
    trained.pipeline.save(&model_path).expect("save");
    Arc::new(AppState::new(model_path, dir.path().join("absent.csv")))
}

async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state).oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let payload = serde_json::from_slice(&bytes).expect("json body");
    (status, payload)
}

fn valid_payload() -> Value {
    json!({
        "crop_type": "rice",
        "region": "north",
        "temperature_c": 27.5,
        "rainfall_mm": 840,
        "humidity_percent": 61,
        "soil_type": "loamy"
    })
}

fn json_request(payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

#[tokio::test]
async fn options_returns_empty_menus_when_dataset_missing() {
    let dir = TempDir::new().expect("tempdir");
    let state = Arc::new(AppState::new(
        dir.path().join("model.bin"),
        dir.path().join("absent.csv"),
    ));
    let request = Request::builder()
        .method("GET")
        .uri("/options")
        .body(Body::empty())
        .expect("request");
    let (status, payload) = send(state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload,
        json!({ "crop_type": [], "region": [], "soil_type": [] })
    );
}

#[tokio::test]
async fn predict_reports_missing_fields() {
    let dir = TempDir::new().expect("tempdir");
    let mut payload = valid_payload();
    payload.as_object_mut().unwrap().remove("region");
    let (status, body) = send(trained_state(&dir), json_request(&payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing fields");
    assert_eq!(body["missing"], json!(["region"]));
}

#[tokio::test]
async fn predict_rejects_non_numeric_values() {
    let dir = TempDir::new().expect("tempdir");
    let mut payload = valid_payload();
    payload["temperature_c"] = json!("not-a-number");
    let (status, body) = send(trained_state(&dir), json_request(&payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .expect("error string")
        .contains("temperature_c"));
}

#[tokio::test]
async fn predict_succeeds_with_json_body() {
    let dir = TempDir::new().expect("tempdir");
    let (status, body) = send(trained_state(&dir), json_request(&valid_payload())).await;
    assert_eq!(status, StatusCode::OK);
    let prediction = body["prediction_tonnes_per_hectare"]
        .as_f64()
        .expect("numeric prediction");
    assert!(prediction.is_finite());
}

#[tokio::test]
async fn predict_accepts_form_encoded_body() {
    let dir = TempDir::new().expect("tempdir");
    let form = "crop_type=rice&region=north&temperature_c=27.5\
                &rainfall_mm=840&humidity_percent=61&soil_type=loamy";
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .expect("request");
    let (status, body) = send(trained_state(&dir), request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["prediction_tonnes_per_hectare"].is_number());
}

#[tokio::test]
async fn predict_without_model_is_server_error() {
    let dir = TempDir::new().expect("tempdir");
    let model_path = dir.path().join("model.bin");
    let state = Arc::new(AppState::new(&model_path, dir.path().join("absent.csv")));
    let (status, body) = send(state, json_request(&valid_payload())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Prediction failed");
    assert!(body["details"]
        .as_str()
        .expect("details string")
        .contains("model artifact missing"));
}
