use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    handlers::ApiError,
    metrics,
    middlewares::auth::JwtClaims,
    models::cita::{
        CreateCitaRequest, EstadoCita, ListCitasQuery, RetroalimentacionRequest, UpdateCitaRequest,
    },
    services::{
        cita_service::{ActorCita, CitaError, CitaService},
        horario_service::HorarioService,
        user_service::UserService,
        AppState,
    },
};

/// GET /api/v1/tutor/hijos
pub async fn list_hijos(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_service = UserService::new(state.mongo.clone());

    let hijos = user_service
        .hijos_de_tutor(&claims.sub)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(hijos))
}

/// GET /api/v1/tutor/hijos/:id/profesores: active maestros matching the
/// hijo's grade, the only ones this hijo can be booked with.
pub async fn list_profesores(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(hijo_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_service = UserService::new(state.mongo.clone());

    let hijo = user_service
        .get_hijo(&claims.sub, &hijo_id)
        .await
        .map_err(ApiError::from_service)?;

    let profesores = user_service
        .maestros_activos_por_grado(&hijo.grado)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if profesores.is_empty() {
        return Err(ApiError::not_found(format!(
            "No hay profesores asignados para el grado {}",
            hijo.grado
        )));
    }

    Ok(Json(profesores))
}

/// GET /api/v1/tutor/profesores/:id/horarios: open slots of one maestro.
pub async fn list_horarios_profesor(
    State(state): State<Arc<AppState>>,
    Path(profesor_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let horario_service = HorarioService::new(state.mongo.clone());

    let horarios = horario_service
        .horarios_disponibles(&profesor_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(horarios))
}

/// POST /api/v1/tutor/citas: the booking flow.
pub async fn agendar_cita(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateCitaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let cita_service = CitaService::new(state.mongo.clone());
    match cita_service.agendar(&claims.sub, req).await {
        Ok(cita) => {
            metrics::record_cita_agendada("ok");
            Ok((StatusCode::CREATED, Json(cita)))
        }
        Err(e) => {
            if matches!(e, CitaError::HorarioNoDisponible) {
                metrics::record_cita_agendada("conflict");
            }
            Err(ApiError::from(e))
        }
    }
}

/// GET /api/v1/tutor/citas
pub async fn list_citas(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ListCitasQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let citas = cita_service
        .listar(ActorCita::Tutor(&claims.sub), query)
        .await?;

    Ok(Json(citas))
}

/// GET /api/v1/tutor/citas/anteriores: history with feedback visible.
pub async fn list_citas_anteriores(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let citas = cita_service
        .listar_anteriores(ActorCita::Tutor(&claims.sub))
        .await?;

    Ok(Json(citas))
}

/// PATCH /api/v1/tutor/citas/:id: edit or re-slot (24h gate applies).
pub async fn modificar_cita(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(cita_id): Path<String>,
    AppJson(req): AppJson<UpdateCitaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let cita_service = CitaService::new(state.mongo.clone());

    let cita = cita_service
        .modificar(ActorCita::Tutor(&claims.sub), &cita_id, req)
        .await?;

    Ok(Json(cita))
}

/// POST /api/v1/tutor/citas/:id/cancelar
pub async fn cancelar_cita(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(cita_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let cita = cita_service
        .cambiar_estado(
            ActorCita::Tutor(&claims.sub),
            &cita_id,
            EstadoCita::Cancelada,
        )
        .await?;

    Ok(Json(cita))
}

/// POST /api/v1/tutor/citas/:id/retroalimentacion
pub async fn retroalimentar_cita(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(cita_id): Path<String>,
    AppJson(req): AppJson<RetroalimentacionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let cita_service = CitaService::new(state.mongo.clone());

    let cita = cita_service
        .retroalimentar(&claims.sub, &cita_id, &req.comentario)
        .await?;

    Ok(Json(cita))
}

/// GET /api/v1/tutor/buzon: messages sent to this tutor by maestros or the
/// administration.
pub async fn buzon(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    use crate::services::mensaje_service::{Buzon, MensajeService};

    let de_maestros = MensajeService::new(state.mongo.clone(), Buzon::Tutor)
        .listar(&claims.sub)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let de_admin = MensajeService::new(state.mongo.clone(), Buzon::Admin)
        .listar(&claims.sub)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "deMaestros": de_maestros,
        "deAdministracion": de_admin,
    })))
}
