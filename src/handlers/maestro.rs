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
    models::cita::{
        CreateCitaRequest, EstadoCita, Importancia, ListCitasQuery, Modalidad, UpdateCitaRequest,
    },
    models::horario::SetHorariosRequest,
    models::mensaje::EnviarMensajeRequest,
    services::{
        cita_service::{ActorCita, CitaService},
        horario_service::HorarioService,
        mensaje_service::{Buzon, MensajeService},
        user_service::UserService,
        AppState,
    },
};

/// GET /api/v1/maestro/horarios: the full weekly grid, open and booked.
pub async fn list_horarios(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let horario_service = HorarioService::new(state.mongo.clone());

    let horarios = horario_service
        .horarios_de_maestro(&claims.sub)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(horarios))
}

/// PUT /api/v1/maestro/horarios: replace the weekly selection. Booked slots
/// are preserved regardless of the new selection.
pub async fn set_horarios(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SetHorariosRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let user_service = UserService::new(state.mongo.clone());
    let perfil = user_service
        .get_perfil(&claims.sub)
        .await
        .map_err(ApiError::from_service)?;

    let horario_service = HorarioService::new(state.mongo.clone());
    let horarios = horario_service
        .guardar_horarios(&claims.sub, &perfil.nombre_completo, req)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(horarios))
}

/// GET /api/v1/maestro/citas/pendientes: requests awaiting accept/reject.
pub async fn citas_pendientes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let citas = cita_service.pendientes_de_maestro(&claims.sub).await?;

    Ok(Json(citas))
}

/// GET /api/v1/maestro/citas
pub async fn list_citas(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ListCitasQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let citas = cita_service
        .listar(ActorCita::Maestro(&claims.sub), query)
        .await?;

    Ok(Json(citas))
}

/// GET /api/v1/maestro/citas/anteriores
pub async fn list_citas_anteriores(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let citas = cita_service
        .listar_anteriores(ActorCita::Maestro(&claims.sub))
        .await?;

    Ok(Json(citas))
}

/// Booking on behalf of a tutor. The maestro never picks the profesor; the
/// claim always runs against their own slots.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MaestroCreateCitaRequest {
    pub tutor_id: String,
    pub hijo_id: String,
    pub horario_id: String,

    #[validate(length(min = 1, max = 500, message = "Describe el motivo de la cita"))]
    pub motivo: String,

    pub importancia: Importancia,
    #[serde(default)]
    pub requiere_directora: bool,
    pub modalidad: Modalidad,
}

impl MaestroCreateCitaRequest {
    fn into_create(self, profesor_id: &str) -> (String, CreateCitaRequest) {
        (
            self.tutor_id,
            CreateCitaRequest {
                hijo_id: self.hijo_id,
                profesor_id: profesor_id.to_string(),
                horario_id: self.horario_id,
                motivo: self.motivo,
                importancia: self.importancia,
                requiere_directora: self.requiere_directora,
                modalidad: self.modalidad,
            },
        )
    }
}

/// POST /api/v1/maestro/citas: book one of the maestro's own slots for a
/// tutor's hijo. Same atomic claim as the tutor-side flow.
pub async fn agendar_cita(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<MaestroCreateCitaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let (tutor_id, create) = req.into_create(&claims.sub);

    let cita_service = CitaService::new(state.mongo.clone());
    let cita = cita_service.agendar(&tutor_id, create).await?;

    Ok((StatusCode::CREATED, Json(cita)))
}

/// PATCH /api/v1/maestro/citas/:id: edit or re-slot one of the maestro's own
/// citas (24h gate applies, re-slotting claims another of their slots).
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
        .modificar(ActorCita::Maestro(&claims.sub), &cita_id, req)
        .await?;

    Ok(Json(cita))
}

async fn cambiar_estado(
    state: Arc<AppState>,
    claims: JwtClaims,
    cita_id: String,
    destino: EstadoCita,
) -> Result<impl IntoResponse, ApiError> {
    let cita_service = CitaService::new(state.mongo.clone());

    let cita = cita_service
        .cambiar_estado(ActorCita::Maestro(&claims.sub), &cita_id, destino)
        .await?;

    Ok(Json(cita))
}

/// POST /api/v1/maestro/citas/:id/aceptar
pub async fn aceptar_cita(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(cita_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    cambiar_estado(state, claims, cita_id, EstadoCita::Aceptado).await
}

/// POST /api/v1/maestro/citas/:id/rechazar: also releases the slot.
pub async fn rechazar_cita(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(cita_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    cambiar_estado(state, claims, cita_id, EstadoCita::Rechazado).await
}

/// POST /api/v1/maestro/citas/:id/realizada: not gated by the 24h rule.
pub async fn marcar_realizada(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(cita_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    cambiar_estado(state, claims, cita_id, EstadoCita::Realizada).await
}

/// POST /api/v1/maestro/citas/:id/no-realizada
pub async fn marcar_no_realizada(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(cita_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    cambiar_estado(state, claims, cita_id, EstadoCita::NoRealizada).await
}

/// POST /api/v1/maestro/citas/:id/cancelar
pub async fn cancelar_cita(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(cita_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    cambiar_estado(state, claims, cita_id, EstadoCita::Cancelada).await
}

#[derive(Debug, Deserialize)]
pub struct TutoresQuery {
    pub grado: String,
}

/// GET /api/v1/maestro/tutores?grado=N. Active tutors with a hijo in the
/// grade, the maestro's valid message recipients.
pub async fn list_tutores(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TutoresQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_service = UserService::new(state.mongo.clone());

    let tutores = user_service
        .tutores_activos_por_grado(&query.grado)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(tutores))
}

/// POST /api/v1/maestro/mensajes: contact a tutor.
pub async fn enviar_mensaje(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<EnviarMensajeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mensaje_service = MensajeService::new(state.mongo.clone(), Buzon::Tutor);

    let mensaje = mensaje_service
        .enviar(&claims.sub, req)
        .await
        .map_err(ApiError::from_service)?;

    Ok((StatusCode::CREATED, Json(mensaje)))
}

/// GET /api/v1/maestro/mensajes
pub async fn list_mensajes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let mensaje_service = MensajeService::new(state.mongo.clone(), Buzon::Tutor);

    let mensajes = mensaje_service
        .listar(&claims.sub)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(mensajes))
}

/// DELETE /api/v1/maestro/mensajes/:id: soft delete.
pub async fn eliminar_mensaje(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(mensaje_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mensaje_service = MensajeService::new(state.mongo.clone(), Buzon::Tutor);

    mensaje_service
        .eliminar(&claims.sub, &mensaje_id)
        .await
        .map_err(ApiError::from_service)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agendar_siempre_usa_los_horarios_del_maestro() {
        let req = MaestroCreateCitaRequest {
            tutor_id: "tutor1".to_string(),
            hijo_id: "hijo1".to_string(),
            horario_id: "slot1".to_string(),
            motivo: "Seguimiento de conducta".to_string(),
            importancia: Importancia::Media,
            requiere_directora: false,
            modalidad: Modalidad::Presencial,
        };

        let (tutor_id, create) = req.into_create("prof9");
        assert_eq!(tutor_id, "tutor1");
        // the profesor comes from the session, never from the body
        assert_eq!(create.profesor_id, "prof9");
        assert_eq!(create.hijo_id, "hijo1");
        assert_eq!(create.horario_id, "slot1");
    }

    #[test]
    fn test_agendar_ignora_profesor_ajeno_en_el_body() {
        let json = r#"{
            "tutorId": "tutor1",
            "hijoId": "hijo1",
            "horarioId": "slot1",
            "profesorId": "prof-otro",
            "motivo": "Revisión de tareas",
            "importancia": "alta",
            "modalidad": "presencial"
        }"#;

        let req: MaestroCreateCitaRequest = serde_json::from_str(json).unwrap();
        let (_, create) = req.into_create("prof9");
        assert_eq!(create.profesor_id, "prof9");
    }
}
