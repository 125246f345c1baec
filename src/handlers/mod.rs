use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::cita_service::CitaError;
use crate::services::{AppState, NoEncontrado};

pub mod admin;
pub mod auth;
pub mod maestro;
pub mod tutor;

/// Uniform error response for every handler:
/// `{ "message": ..., "status": ... }`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// User, horario and mensaje services report failures through anyhow;
    /// a wrapped NoEncontrado is the not-found marker, everything else is
    /// a 400.
    pub fn from_service(err: anyhow::Error) -> Self {
        if err.downcast_ref::<NoEncontrado>().is_some() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::BadRequest(err.to_string())
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<CitaError> for ApiError {
    fn from(err: CitaError) -> Self {
        match err {
            CitaError::HorarioNoDisponible => ApiError::Conflict(err.to_string()),
            CitaError::TransicionInvalida { .. }
            | CitaError::AnticipacionInsuficiente
            | CitaError::Validacion(_) => ApiError::BadRequest(err.to_string()),
            CitaError::NoEncontrada(message) => ApiError::NotFound(message),
            CitaError::Interna(inner) => {
                tracing::error!("cita service error: {:?}", inner);
                ApiError::Internal("Error interno del servidor".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        let json_response = json!({
            "message": message,
            "status": status.as_u16()
        });
        (status, Json(json_response)).into_response()
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut status = "healthy";
    let mut dependencies = serde_json::Map::new();
    let mut all_healthy = true;

    let mongo_health = check_mongodb(&state).await;
    dependencies.insert("mongodb".to_string(), json!(mongo_health));
    if mongo_health.get("status").and_then(|v| v.as_str()) != Some("healthy") {
        all_healthy = false;
        status = "degraded";
    }

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "agenda-escolar-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

async fn check_mongodb(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        state.mongo.run_command(mongodb::bson::doc! { "ping": 1 }),
    )
    .await
    {
        Ok(Ok(_)) => {
            result.insert("status".to_string(), json!("healthy"));
            result.insert(
                "message".to_string(),
                json!("MongoDB connection successful"),
            );
        }
        Ok(Err(e)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(format!("MongoDB error: {}", e)));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("MongoDB timeout after 1s"));
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// HTTP Basic Auth in front of /metrics. Credentials come from METRICS_AUTH
/// ("username:password").
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !auth_header.starts_with("Basic ") {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let encoded = &auth_header[6..];
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cita_error_mapping() {
        assert!(matches!(
            ApiError::from(CitaError::HorarioNoDisponible),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(CitaError::AnticipacionInsuficiente),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(CitaError::NoEncontrada("Cita no encontrada".into())),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_from_service_detects_not_found() {
        let missing = anyhow::Error::new(NoEncontrado("Usuario no encontrado".to_string()));
        assert!(matches!(
            ApiError::from_service(missing),
            ApiError::NotFound(_)
        ));
        // message content alone never triggers a 404
        assert!(matches!(
            ApiError::from_service(anyhow::anyhow!("Usuario no encontrado")),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from_service(anyhow::anyhow!("El correo ya está en uso")),
            ApiError::BadRequest(_)
        ));
    }
}
