// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP API for the detection pipeline

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::detector::Detector;
use crate::{PantryscanError, Result};

/// Headroom for multipart framing on top of the image ceiling
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub detector: Detector,
    pub config: AppConfig,
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(health))
        .route("/api/detect-items", post(detect_items))
        .route("/api/detect-freshness", post(detect_freshness));

    if state.config.uploads.persist {
        router = router.nest_service("/uploads", ServeDir::new(&state.config.uploads.dir));
    }

    let body_limit = state.config.uploads.max_bytes() + MULTIPART_OVERHEAD;

    router
        .fallback(not_found)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// === Response bodies ===

#[derive(Serialize)]
struct HealthResponse {
    message: &'static str,
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct DetectionResponse<T: Serialize> {
    message: &'static str,
    result: Vec<T>,
}

#[derive(Serialize)]
struct ApiError {
    message: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Serialize)]
struct NotFoundResponse {
    error: &'static str,
    message: String,
}

// === Handlers ===

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Pantryscan API is running",
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn detect_items(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let image = match read_image_field(multipart, &state).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    match state.detector.detect_inventory(&image).await {
        Ok(items) => Json(DetectionResponse {
            message: "Success",
            result: items,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn detect_freshness(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let image = match read_image_field(multipart, &state).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    match state.detector.detect_freshness(&image).await {
        Ok(produce) => Json(DetectionResponse {
            message: "Success",
            result: produce,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Route not found",
            message: format!("Cannot {} {}", method, uri),
        }),
    )
}

// === Upload handling ===

/// Pull the `image` field out of the multipart body and validate it
async fn read_image_field(
    mut multipart: Multipart,
    state: &AppState,
) -> std::result::Result<Vec<u8>, Response> {
    let max_bytes = state.config.uploads.max_bytes();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_request(format!("Upload error: {}", e))),
        };

        if field.name() != Some("image") {
            continue;
        }

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return Err(bad_request(format!("Upload error: {}", e))),
        };

        if data.is_empty() {
            return Err(bad_request(
                "Uploaded file is empty. Please upload a valid image.".to_string(),
            ));
        }
        if data.len() > max_bytes {
            return Err(payload_too_large(state.config.uploads.max_size_mb));
        }
        // Sniff the content rather than trusting the filename
        if image::guess_format(&data).is_err() {
            return Err(bad_request("Only image files are allowed!".to_string()));
        }

        persist_upload(state, &data);
        return Ok(data.to_vec());
    }

    Err(bad_request("No image uploaded".to_string()))
}

/// Keep a copy of the upload on disk; failure is logged, never fatal
fn persist_upload(state: &AppState, data: &[u8]) {
    if !state.config.uploads.persist {
        return;
    }

    let ext = image::guess_format(data)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("jpg");

    let dir = Path::new(&state.config.uploads.dir);
    let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);

    let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(dir.join(&name), data));
    match result {
        Ok(()) => info!("Stored upload as {}", name),
        Err(e) => warn!("Failed to persist upload: {}", e),
    }
}

// === Error mapping ===

fn bad_request(error: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            message: "Error",
            error,
            details: None,
        }),
    )
        .into_response()
}

fn payload_too_large(limit_mb: u64) -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(ApiError {
            message: "Error",
            error: format!("File too large. Maximum size is {}MB.", limit_mb),
            details: None,
        }),
    )
        .into_response()
}

/// Map a pipeline error to a status code and structured body.
///
/// Oracle failures that smell like credential problems get a tailored 401
/// so the frontend can walk the user through fixing their key.
fn error_response(err: &PantryscanError) -> Response {
    let message = err.to_string();

    let (status, error, details) = match err {
        PantryscanError::InvalidImage(_) => (StatusCode::BAD_REQUEST, message, None),
        PantryscanError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, message, None),
        _ if is_auth_failure(&message) => (
            StatusCode::UNAUTHORIZED,
            "API key issue. Please check your Gemini API key.".to_string(),
            Some(message),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, message, None),
    };

    (
        status,
        Json(ApiError {
            message: "Error",
            error,
            details,
        }),
    )
        .into_response()
}

fn is_auth_failure(message: &str) -> bool {
    message.contains("API key") || message.contains("403") || message.contains("authentication")
}

// === Server ===

/// Start the web server
pub async fn start_server(config: AppConfig, detector: Detector) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState { detector, config });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PantryscanError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_sniffing() {
        assert!(is_auth_failure("Gemini returned status 403 Forbidden: quota"));
        assert!(is_auth_failure("API key not valid. Please pass a valid API key."));
        assert!(is_auth_failure("authentication required"));
        assert!(!is_auth_failure("connection reset by peer"));
    }

    #[test]
    fn test_detection_response_shape() {
        let response = DetectionResponse::<crate::normalize::InventoryItem> {
            message: "Success",
            result: vec![],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["message"], "Success");
        assert!(value["result"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_api_error_shape() {
        let error = ApiError {
            message: "Error",
            error: "No image uploaded".to_string(),
            details: None,
        };
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["message"], "Error");
        assert_eq!(value["error"], "No image uploaded");
        assert!(value.get("details").is_none());
    }

    #[test]
    fn test_error_mapping_statuses() {
        let invalid = PantryscanError::InvalidImage("empty".to_string());
        assert_eq!(error_response(&invalid).status(), StatusCode::BAD_REQUEST);

        let too_large = PantryscanError::ImageTooLarge { size: 11, limit: 10 };
        assert_eq!(error_response(&too_large).status(), StatusCode::PAYLOAD_TOO_LARGE);

        let auth = PantryscanError::Oracle("Gemini returned status 403: denied".to_string());
        assert_eq!(error_response(&auth).status(), StatusCode::UNAUTHORIZED);

        let other = PantryscanError::Oracle("connection refused".to_string());
        assert_eq!(error_response(&other).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
