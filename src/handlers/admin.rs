use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    handlers::ApiError,
    middlewares::auth::JwtClaims,
    models::cita::{CreateCitaRequest, EstadoCita, ListCitasQuery, UpdateCitaRequest},
    models::mensaje::EnviarMensajeRequest,
    models::user::{CreateUserRequest, ListUsersQuery, UpdateUserRequest},
    services::{
        cita_service::{ActorCita, CitaService},
        mensaje_service::{Buzon, MensajeService},
        user_service::UserService,
        AppState,
    },
};

/// POST /admin/users: create a maestro or tutor account.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let user_service = UserService::new(state.mongo.clone());
    let created = user_service.create_user(req).await.map_err(|e| {
        tracing::error!("Failed to create user: {:?}", e);
        ApiError::bad_request(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_service = UserService::new(state.mongo.clone());

    let users = user_service
        .list_users(query)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(users))
}

/// GET /admin/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_service = UserService::new(state.mongo.clone());

    let user = user_service
        .get_perfil(&user_id)
        .await
        .map_err(ApiError::from_service)?;

    Ok(Json(user))
}

/// PATCH /admin/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let user_service = UserService::new(state.mongo.clone());

    let user = user_service
        .update_user(&user_id, req)
        .await
        .map_err(ApiError::from_service)?;

    Ok(Json(user))
}

/// POST /admin/users/:id/desactivar: soft deactivation; the account drops
/// out of every active listing but its citas stay readable.
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_service = UserService::new(state.mongo.clone());

    let user = user_service
        .deactivate_user(&user_id)
        .await
        .map_err(ApiError::from_service)?;

    Ok(Json(user))
}

/// POST /admin/users/:id/reactivar
pub async fn reactivate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_service = UserService::new(state.mongo.clone());

    let user = user_service
        .reactivate_user(&user_id)
        .await
        .map_err(ApiError::from_service)?;

    Ok(Json(user))
}

/// GET /admin/citas: all appointments, filterable by estado and
/// requiereDirectora.
pub async fn list_citas(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCitasQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let citas = cita_service.listar(ActorCita::Admin, query).await?;

    Ok(Json(citas))
}

/// GET /admin/citas/directora: active citas the principal must attend.
pub async fn citas_directora(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let citas = cita_service.citas_para_directora().await?;

    Ok(Json(citas))
}

/// GET /admin/citas/anteriores
pub async fn list_citas_anteriores(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let citas = cita_service.listar_anteriores(ActorCita::Admin).await?;

    Ok(Json(citas))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateCitaRequest {
    pub tutor_id: String,
    #[serde(flatten)]
    pub cita: CreateCitaRequest,
}

/// POST /admin/citas: agendar on behalf of a tutor. Same atomic claim as the
/// tutor-side flow.
pub async fn agendar_cita(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AdminCreateCitaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.cita
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let cita_service = CitaService::new(state.mongo.clone());

    let cita = cita_service.agendar(&req.tutor_id, req.cita).await?;

    Ok((StatusCode::CREATED, Json(cita)))
}

/// PATCH /admin/citas/:id
pub async fn modificar_cita(
    State(state): State<Arc<AppState>>,
    Path(cita_id): Path<String>,
    AppJson(req): AppJson<UpdateCitaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let cita_service = CitaService::new(state.mongo.clone());

    let cita = cita_service
        .modificar(ActorCita::Admin, &cita_id, req)
        .await?;

    Ok(Json(cita))
}

/// POST /admin/citas/:id/cancelar
pub async fn cancelar_cita(
    State(state): State<Arc<AppState>>,
    Path(cita_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let cita = cita_service
        .cambiar_estado(ActorCita::Admin, &cita_id, EstadoCita::Cancelada)
        .await?;

    Ok(Json(cita))
}

/// POST /admin/mensajes: contact any user.
pub async fn enviar_mensaje(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<EnviarMensajeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mensaje_service = MensajeService::new(state.mongo.clone(), Buzon::Admin);

    let mensaje = mensaje_service
        .enviar(&claims.sub, req)
        .await
        .map_err(ApiError::from_service)?;

    Ok((StatusCode::CREATED, Json(mensaje)))
}

/// GET /admin/mensajes
pub async fn list_mensajes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let mensaje_service = MensajeService::new(state.mongo.clone(), Buzon::Admin);

    let mensajes = mensaje_service
        .listar(&claims.sub)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(mensajes))
}

/// DELETE /admin/mensajes/:id
pub async fn eliminar_mensaje(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(mensaje_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mensaje_service = MensajeService::new(state.mongo.clone(), Buzon::Admin);

    mensaje_service
        .eliminar(&claims.sub, &mensaje_id)
        .await
        .map_err(ApiError::from_service)?;

    Ok(StatusCode::NO_CONTENT)
}
