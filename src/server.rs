//! HTTP frame ingest API.
//!
//! The camera uploads one multipart frame at a time (`image` bytes plus a
//! Unix-seconds `timestamp`). Each accepted frame is classified, persisted
//! under its encoded filename, and pushed through the camera's detection
//! gate; the gate decision drives the detection log and SMS dispatch. The
//! decision and state update complete synchronously before the response;
//! only delivery is offloaded to a background task.

use crate::classifier::Classifier;
use crate::config::HttpConfig;
use crate::detection_gate::{ClassifiedFrame, GateDecision, GateRegistry};
use crate::detection_log::DetectionLog;
use crate::frame_id;
use crate::notifier::Notifier;
use anyhow::{Context, Result};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub notifier: Arc<dyn Notifier>,
    pub gates: Arc<GateRegistry>,
    pub detection_log: Arc<DetectionLog>,
    /// Frames are written under `<frames_dir>/<camera_id>/`
    pub frames_dir: PathBuf,
    /// Recipients for every Notify decision
    pub destinations: Arc<Vec<String>>,
    /// Most recent accepted frame per camera
    pub latest: Arc<RwLock<HashMap<String, LatestFrame>>>,
}

/// Most recent accepted frame for one camera
#[derive(Clone)]
pub struct LatestFrame {
    pub image: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Response for an accepted frame
#[derive(Debug, Serialize)]
pub struct FrameAccepted {
    pub message: String,
    pub label: String,
    pub confidence: f64,
    pub decision: &'static str,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: &str, code: &str) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Create the API router
pub fn create_router(state: AppState, config: &HttpConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/cameras/:camera_id/frames", post(upload_frame))
        .route(
            "/api/v1/cameras/:camera_id/frames/latest",
            get(get_latest_frame),
        )
        .route(
            "/api/v1/cameras/:camera_id/frames/latest/time",
            get(get_latest_frame_time),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "fauna-watch"
    }))
}

/// Ingest one camera frame
#[instrument(skip(state, multipart))]
async fn upload_frame(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<FrameAccepted>, HandlerError> {
    let request_started = Instant::now();
    metrics::counter!("ingest.frames.received").increment(1);

    let mut image: Option<Vec<u8>> = None;
    let mut timestamp_field: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        metrics::counter!("ingest.frames.rejected").increment(1);
        bad_request(&format!("malformed multipart body: {e}"), "MULTIPART_ERROR")
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let bytes = field.bytes().await.map_err(|e| {
                    metrics::counter!("ingest.frames.rejected").increment(1);
                    bad_request(&format!("unreadable image field: {e}"), "MULTIPART_ERROR")
                })?;
                image = Some(bytes.to_vec());
            }
            Some("timestamp") => {
                let text = field.text().await.map_err(|e| {
                    metrics::counter!("ingest.frames.rejected").increment(1);
                    bad_request(
                        &format!("unreadable timestamp field: {e}"),
                        "MULTIPART_ERROR",
                    )
                })?;
                timestamp_field = Some(text);
            }
            _ => {}
        }
    }

    // Reject incomplete uploads before touching any state.
    let (image, timestamp_field) = match (image, timestamp_field) {
        (Some(image), Some(ts)) => (image, ts),
        _ => {
            metrics::counter!("ingest.frames.rejected").increment(1);
            return Err(bad_request(
                "missing 'image' or 'timestamp'",
                "MISSING_FIELD",
            ));
        }
    };
    if image.is_empty() {
        metrics::counter!("ingest.frames.rejected").increment(1);
        return Err(bad_request("empty image upload", "EMPTY_IMAGE"));
    }

    let timestamp = timestamp_field
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| {
            metrics::counter!("ingest.frames.rejected").increment(1);
            bad_request(
                &format!("timestamp '{timestamp_field}' is not Unix seconds"),
                "INVALID_TIMESTAMP",
            )
        })?;

    let classify_started = Instant::now();
    let classification = state.classifier.predict(&image).await.map_err(|e| {
        error!(error = %e, camera_id = %camera_id, "classifier call failed");
        metrics::counter!("classify.errors").increment(1);
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: "classifier unavailable".to_string(),
                code: "CLASSIFIER_ERROR".to_string(),
            }),
        )
    })?;
    let classify_elapsed = classify_started.elapsed();
    metrics::histogram!("classify.duration_seconds").record(classify_elapsed.as_secs_f64());

    let frame = ClassifiedFrame {
        label: classification.label.clone(),
        confidence: classification.confidence,
        timestamp,
    };

    store_frame(&state, &camera_id, &image, &frame)
        .await
        .map_err(|e| {
            error!(error = %e, camera_id = %camera_id, "failed to persist frame");
            metrics::counter!("ingest.storage.errors").increment(1);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "failed to persist frame".to_string(),
                    code: "STORAGE_ERROR".to_string(),
                }),
            )
        })?;

    let decision = state.gates.gate_for(&camera_id).process(&frame);
    metrics::counter!(format!("gate.decisions.{}", decision.kind())).increment(1);

    if decision.is_logged() {
        if let Err(e) = state
            .detection_log
            .append(&frame.label, Local::now().naive_local())
        {
            // The decision stands; a lost log row is not worth failing the
            // upload over.
            warn!(error = %e, label = %frame.label, "failed to append detection log row");
        }
    }

    if decision == GateDecision::Notify {
        dispatch_notifications(&state, &frame);
    }

    state.latest.write().unwrap().insert(
        camera_id.clone(),
        LatestFrame {
            image,
            timestamp,
        },
    );

    let request_elapsed = request_started.elapsed();
    metrics::histogram!("ingest.request.duration_seconds").record(request_elapsed.as_secs_f64());
    info!(
        camera_id = %camera_id,
        label = %frame.label,
        confidence = frame.confidence,
        decision = decision.kind(),
        request_ms = request_elapsed.as_millis() as u64,
        classify_ms = classify_elapsed.as_millis() as u64,
        "frame processed"
    );

    Ok(Json(FrameAccepted {
        message: "frame accepted".to_string(),
        label: frame.label,
        confidence: frame.confidence,
        decision: decision.kind(),
    }))
}

/// Write the frame image under its encoded filename.
async fn store_frame(
    state: &AppState,
    camera_id: &str,
    image: &[u8],
    frame: &ClassifiedFrame,
) -> Result<()> {
    let confidence_percent = (frame.confidence * 100.0).round() as u8;
    let filename = frame_id::encode(frame.timestamp, &frame.label, confidence_percent);

    let camera_dir = state.frames_dir.join(camera_id);
    tokio::fs::create_dir_all(&camera_dir)
        .await
        .with_context(|| format!("failed to create {}", camera_dir.display()))?;

    let path = camera_dir.join(filename);
    tokio::fs::write(&path, image)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    metrics::counter!("ingest.frames.stored").increment(1);
    Ok(())
}

/// Fan a Notify decision out to every configured destination on a background
/// task; the upload response does not wait for delivery.
fn dispatch_notifications(state: &AppState, frame: &ClassifiedFrame) {
    let message = notification_message(frame);
    for destination in state.destinations.iter().cloned() {
        let notifier = state.notifier.clone();
        let message = message.clone();
        tokio::spawn(async move {
            match notifier.notify(&destination, &message).await {
                Ok(()) => metrics::counter!("notify.sms.sent").increment(1),
                Err(e) => {
                    error!(error = %e, destination = %destination, "SMS dispatch failed");
                    metrics::counter!("notify.sms.failed").increment(1);
                }
            }
        });
    }
}

fn notification_message(frame: &ClassifiedFrame) -> String {
    format!(
        "At {} detected {} {:.2}%",
        frame.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        frame.label,
        frame.confidence * 100.0
    )
}

/// Most recent accepted frame for a camera
async fn get_latest_frame(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let latest = state
        .latest
        .read()
        .unwrap()
        .get(&camera_id)
        .cloned()
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("no frame received yet for camera '{camera_id}'"),
                    code: "NOT_FOUND".to_string(),
                }),
            )
        })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], latest.image))
}

/// Capture time of the most recent accepted frame, or "NA"
async fn get_latest_frame_time(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> impl IntoResponse {
    let time = state
        .latest
        .read()
        .unwrap()
        .get(&camera_id)
        .map(|latest| latest.timestamp.to_rfc3339())
        .unwrap_or_else(|| "NA".to_string());

    Json(serde_json::json!({ "time": time }))
}

/// Start the ingest API server
pub async fn start_server(state: AppState, config: &HttpConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "starting frame ingest server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}
