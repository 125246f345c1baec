use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    handlers::ApiError,
    middlewares::auth::{JwtClaims, JwtService},
    models::user::{ForgotPasswordRequest, LoginRequest, RegisterRequest},
    services::{
        auth_service::AuthService, email_service::EmailService, user_service::UserService,
        AppState,
    },
};

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.mongo.clone(),
        JwtService::new(&state.config.jwt_secret),
    )
}

/// POST /api/v1/auth/register: tutor self-registration.
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let response = auth_service(&state).register(req).await.map_err(|e| {
        tracing::warn!("registration failed: {}", e);
        ApiError::bad_request(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let response = auth_service(&state)
        .login(req)
        .await
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    Ok(Json(response))
}

/// POST /api/v1/auth/forgot-password: resets to a temporary password and
/// mails it; with email disabled the password is returned in the body.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let (perfil, temporal) = auth_service(&state)
        .reset_password(&req.correo)
        .await
        .map_err(ApiError::from_service)?;

    let email_disabled = EmailService::sending_disabled();

    if !email_disabled {
        EmailService::new()
            .send_password_reset_email(&perfil.correo, &perfil.nombre_completo, &temporal)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    } else {
        tracing::warn!(
            "Email sending disabled, temporary password returned in response for {}",
            perfil.correo
        );
    }

    let mut payload = json!({ "status": "ok" });
    if email_disabled {
        payload["temporaryPassword"] = temporal.into();
    }

    Ok(Json(payload))
}

/// GET /api/v1/auth/me: current profile; tutors also get their hijos.
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_service = UserService::new(state.mongo.clone());

    let perfil = user_service
        .get_perfil(&claims.sub)
        .await
        .map_err(ApiError::from_service)?;

    let hijos = if claims.rol == "tutor" {
        user_service
            .hijos_de_tutor(&claims.sub)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
    } else {
        Vec::new()
    };

    Ok(Json(json!({ "user": perfil, "hijos": hijos })))
}
