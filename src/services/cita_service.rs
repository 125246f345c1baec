use crate::models::cita::{
    Cita, CitaResponse, CreateCitaRequest, EstadoCita, ListCitasQuery, UpdateCitaRequest,
};
use crate::models::horario::Horario;
use crate::models::user::{EstadoUsuario, Rol};
use crate::services::user_service::UserService;
use crate::utils::time::{chrono_to_bson, cumple_anticipacion};
use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CitaError {
    /// Lost the race for a slot, or the slot was withdrawn. 409 on the wire.
    #[error("El horario ya no está disponible")]
    HorarioNoDisponible,

    #[error("Transición de estado inválida: {de} -> {a}")]
    TransicionInvalida { de: String, a: String },

    #[error("Las citas solo pueden modificarse o cancelarse con 24 horas de anticipación")]
    AnticipacionInsuficiente,

    #[error("{0}")]
    NoEncontrada(String),

    #[error("{0}")]
    Validacion(String),

    #[error(transparent)]
    Interna(#[from] anyhow::Error),
}

/// Who is acting on a cita; narrows every query so tutors and maestros can
/// only ever touch their own documents.
#[derive(Debug, Clone, Copy)]
pub enum ActorCita<'a> {
    Tutor(&'a str),
    Maestro(&'a str),
    Admin,
}

impl ActorCita<'_> {
    fn filtro(&self) -> Document {
        match self {
            ActorCita::Tutor(id) => doc! { "tutorId": *id },
            ActorCita::Maestro(id) => doc! { "profesorId": *id },
            ActorCita::Admin => doc! {},
        }
    }
}

/// Filter for the atomic slot claim: the slot must belong to the maestro,
/// still be open, and lie in the future. Claiming a slot whose weekday has
/// already passed would create a cita the 24h gate immediately locks.
fn filtro_claim(horario_oid: ObjectId, profesor_id: &str, ahora: DateTime<Utc>) -> Document {
    doc! {
        "_id": horario_oid,
        "profesorId": profesor_id,
        "disponible": true,
        "fecha": { "$gt": chrono_to_bson(ahora) },
    }
}

pub struct CitaService {
    mongo: Database,
}

impl CitaService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn citas(&self) -> mongodb::Collection<Cita> {
        self.mongo.collection::<Cita>("citas")
    }

    fn horarios(&self) -> mongodb::Collection<Horario> {
        self.mongo.collection::<Horario>("horarios_disponibles")
    }

    /// Books an appointment for a tutor's hijo against an open slot.
    ///
    /// The slot claim is a single conditional update (disponible: true ->
    /// false); whichever request matches first wins and every loser gets
    /// HorarioNoDisponible. A read-then-write pair here would allow double
    /// booking.
    pub async fn agendar(
        &self,
        tutor_id: &str,
        req: CreateCitaRequest,
    ) -> Result<CitaResponse, CitaError> {
        let user_service = UserService::new(self.mongo.clone());

        let hijo = user_service
            .get_hijo(tutor_id, &req.hijo_id)
            .await
            .map_err(|e| CitaError::NoEncontrada(e.to_string()))?;

        let profesor = user_service
            .get_user(&req.profesor_id)
            .await
            .map_err(|e| CitaError::NoEncontrada(e.to_string()))?;

        if profesor.rol != Rol::Maestro || profesor.estado != EstadoUsuario::Activo {
            return Err(CitaError::Validacion(
                "El profesor seleccionado no está disponible".to_string(),
            ));
        }
        if profesor.grado_asignado.as_deref() != Some(hijo.grado.as_str()) {
            return Err(CitaError::Validacion(format!(
                "El profesor no atiende el grado {}",
                hijo.grado
            )));
        }

        if req.motivo.trim().is_empty() {
            return Err(CitaError::Validacion(
                "Describe el motivo de la cita".to_string(),
            ));
        }

        let horario_oid = ObjectId::parse_str(&req.horario_id)
            .map_err(|_| CitaError::Validacion("Horario no válido".to_string()))?;

        // Atomic claim: the serialization point for the whole booking flow.
        let horario = self
            .horarios()
            .find_one_and_update(
                filtro_claim(horario_oid, &req.profesor_id, Utc::now()),
                doc! { "$set": { "disponible": false } },
            )
            .await
            .context("Failed to claim horario")?
            .ok_or(CitaError::HorarioNoDisponible)?;

        let cita = Cita {
            id: None,
            tutor_id: tutor_id.to_string(),
            profesor_id: req.profesor_id,
            hijo_id: req.hijo_id,
            horario_id: req.horario_id,
            nombre_alumno: hijo.nombre,
            grado: hijo.grado,
            motivo: req.motivo.trim().to_string(),
            importancia: req.importancia,
            requiere_directora: req.requiere_directora,
            modalidad: req.modalidad,
            estado: EstadoCita::Pendiente,
            dia: horario.dia.clone(),
            hora: horario.hora_inicio.clone(),
            fecha: horario.fecha,
            fecha_creacion: Utc::now(),
            retroalimentacion: None,
        };

        let insert_result = match self.citas().insert_one(&cita).await {
            Ok(r) => r,
            Err(e) => {
                // best-effort rollback of the claim so the slot is not lost
                let _ = self
                    .horarios()
                    .update_one(
                        doc! { "_id": horario_oid },
                        doc! { "$set": { "disponible": true } },
                    )
                    .await;
                return Err(CitaError::Interna(
                    anyhow::Error::new(e).context("Failed to insert cita"),
                ));
            }
        };

        let mut cita_con_id = cita;
        cita_con_id.id = insert_result.inserted_id.as_object_id();

        tracing::info!(
            horario = %horario_oid,
            profesor = %cita_con_id.profesor_id,
            "cita agendada"
        );

        Ok(CitaResponse::from(cita_con_id))
    }

    pub async fn get_cita(&self, actor: ActorCita<'_>, cita_id: &str) -> Result<Cita, CitaError> {
        let object_id = ObjectId::parse_str(cita_id)
            .map_err(|_| CitaError::Validacion("ID de cita no válido".to_string()))?;

        let mut filter = actor.filtro();
        filter.insert("_id", object_id);

        self.citas()
            .find_one(filter)
            .await
            .context("Failed to query cita")?
            .ok_or_else(|| CitaError::NoEncontrada("Cita no encontrada".to_string()))
    }

    pub async fn listar(
        &self,
        actor: ActorCita<'_>,
        query: ListCitasQuery,
    ) -> Result<Vec<CitaResponse>, CitaError> {
        let mut filter = actor.filtro();
        if let Some(estado) = query.estado {
            filter.insert("estado", estado);
        }
        if let Some(requiere) = query.requiere_directora {
            filter.insert("requiereDirectora", requiere);
        }

        let limit = query.limit.unwrap_or(50).min(100) as i64;
        let offset = query.offset.unwrap_or(0) as u64;

        let cursor = self
            .citas()
            .find(filter)
            .sort(doc! { "fecha": 1 })
            .skip(offset)
            .limit(limit)
            .await
            .context("Failed to query citas")?;

        let results: Vec<Cita> = cursor.try_collect().await.context("Failed to collect citas")?;
        Ok(results.into_iter().map(CitaResponse::from).collect())
    }

    /// History views: terminal citas, newest first, feedback included.
    pub async fn listar_anteriores(
        &self,
        actor: ActorCita<'_>,
    ) -> Result<Vec<CitaResponse>, CitaError> {
        let mut filter = actor.filtro();
        filter.insert(
            "estado",
            doc! { "$in": ["realizada", "no realizada", "cancelada"] },
        );

        let cursor = self
            .citas()
            .find(filter)
            .sort(doc! { "fecha": -1 })
            .limit(100)
            .await
            .context("Failed to query citas anteriores")?;

        let results: Vec<Cita> = cursor.try_collect().await.context("Failed to collect citas")?;
        Ok(results.into_iter().map(CitaResponse::from).collect())
    }

    /// Pending requests a maestro has to accept or reject.
    pub async fn pendientes_de_maestro(
        &self,
        profesor_id: &str,
    ) -> Result<Vec<CitaResponse>, CitaError> {
        self.listar(
            ActorCita::Maestro(profesor_id),
            ListCitasQuery {
                estado: Some("pendiente".to_string()),
                requiere_directora: None,
                limit: None,
                offset: None,
            },
        )
        .await
    }

    /// Citas flagged for the principal that are still active.
    pub async fn citas_para_directora(&self) -> Result<Vec<CitaResponse>, CitaError> {
        let cursor = self
            .citas()
            .find(doc! {
                "requiereDirectora": true,
                "estado": { "$in": ["pendiente", "aceptado"] },
            })
            .sort(doc! { "fecha": 1 })
            .await
            .context("Failed to query citas para directora")?;

        let results: Vec<Cita> = cursor.try_collect().await.context("Failed to collect citas")?;
        Ok(results.into_iter().map(CitaResponse::from).collect())
    }

    /// Drives every lifecycle change (aceptar, rechazar, realizada,
    /// no realizada, cancelar) through the transition matrix. Cancellation is
    /// additionally gated by the 24-hour rule; marking an outcome is not.
    pub async fn cambiar_estado(
        &self,
        actor: ActorCita<'_>,
        cita_id: &str,
        destino: EstadoCita,
    ) -> Result<CitaResponse, CitaError> {
        let cita = self.get_cita(actor, cita_id).await?;

        if !cita.estado.puede_pasar_a(destino) {
            return Err(CitaError::TransicionInvalida {
                de: cita.estado.as_str().to_string(),
                a: destino.as_str().to_string(),
            });
        }

        if destino == EstadoCita::Cancelada && !cumple_anticipacion(cita.fecha, Utc::now()) {
            return Err(CitaError::AnticipacionInsuficiente);
        }

        let object_id = cita.id.expect("cita fetched from mongo always has _id");

        // Guard on the current estado so two racing updates cannot both apply.
        let result = self
            .citas()
            .update_one(
                doc! { "_id": object_id, "estado": cita.estado.as_str() },
                doc! { "$set": { "estado": destino.as_str() } },
            )
            .await
            .context("Failed to update estado")?;

        if result.modified_count == 0 {
            let actual = self.get_cita(ActorCita::Admin, cita_id).await?;
            return Err(CitaError::TransicionInvalida {
                de: actual.estado.as_str().to_string(),
                a: destino.as_str().to_string(),
            });
        }

        // Cancelled or rejected citas give their slot back (safe now that
        // claiming is atomic; see DESIGN.md for the product decision).
        if destino.libera_horario() {
            let horario_service =
                crate::services::horario_service::HorarioService::new(self.mongo.clone());
            if let Err(e) = horario_service.liberar_horario(&cita.horario_id).await {
                tracing::warn!(cita = cita_id, error = %e, "no se pudo liberar el horario");
            }
        }

        tracing::info!(cita = cita_id, de = cita.estado.as_str(), a = destino.as_str(), "estado de cita actualizado");

        let mut actualizada = cita;
        actualizada.estado = destino;
        Ok(CitaResponse::from(actualizada))
    }

    /// Edits motivo/importancia/modalidad/requiereDirectora and optionally
    /// re-slots the cita. Only non-terminal citas can be modified, and only
    /// with 24 hours of lead time.
    pub async fn modificar(
        &self,
        actor: ActorCita<'_>,
        cita_id: &str,
        req: UpdateCitaRequest,
    ) -> Result<CitaResponse, CitaError> {
        let cita = self.get_cita(actor, cita_id).await?;

        if cita.estado.es_terminal() {
            return Err(CitaError::Validacion(
                "La cita ya está cerrada y no puede modificarse".to_string(),
            ));
        }
        if !cumple_anticipacion(cita.fecha, Utc::now()) {
            return Err(CitaError::AnticipacionInsuficiente);
        }

        let object_id = cita.id.expect("cita fetched from mongo always has _id");
        let mut set = doc! {};

        if let Some(motivo) = &req.motivo {
            if motivo.trim().is_empty() {
                return Err(CitaError::Validacion(
                    "Describe el motivo de la cita".to_string(),
                ));
            }
            set.insert("motivo", motivo.trim());
        }
        if let Some(importancia) = req.importancia {
            set.insert(
                "importancia",
                mongodb::bson::to_bson(&importancia).context("serialize importancia")?,
            );
        }
        if let Some(requiere) = req.requiere_directora {
            set.insert("requiereDirectora", requiere);
        }
        if let Some(modalidad) = req.modalidad {
            set.insert(
                "modalidad",
                mongodb::bson::to_bson(&modalidad).context("serialize modalidad")?,
            );
        }

        // Re-slot: claim the new horario first; only release the old one once
        // the claim succeeded, so the cita never ends up slotless.
        if let Some(nuevo_horario_id) = &req.horario_id {
            if *nuevo_horario_id != cita.horario_id {
                let nuevo_oid = ObjectId::parse_str(nuevo_horario_id)
                    .map_err(|_| CitaError::Validacion("Horario no válido".to_string()))?;

                let nuevo = self
                    .horarios()
                    .find_one_and_update(
                        filtro_claim(nuevo_oid, &cita.profesor_id, Utc::now()),
                        doc! { "$set": { "disponible": false } },
                    )
                    .await
                    .context("Failed to claim new horario")?
                    .ok_or(CitaError::HorarioNoDisponible)?;

                let horario_service =
                    crate::services::horario_service::HorarioService::new(self.mongo.clone());
                if let Err(e) = horario_service.liberar_horario(&cita.horario_id).await {
                    tracing::warn!(cita = cita_id, error = %e, "no se pudo liberar el horario anterior");
                }

                set.insert("horarioId", nuevo_horario_id);
                set.insert("dia", &nuevo.dia);
                set.insert("hora", &nuevo.hora_inicio);
                set.insert("fecha", chrono_to_bson(nuevo.fecha));
            }
        }

        if set.is_empty() {
            return Ok(CitaResponse::from(cita));
        }

        self.citas()
            .update_one(doc! { "_id": object_id }, doc! { "$set": set })
            .await
            .context("Failed to update cita")?;

        let actualizada = self.get_cita(actor, cita_id).await?;
        Ok(CitaResponse::from(actualizada))
    }

    /// Tutor feedback, only meaningful once the cita actually happened.
    pub async fn retroalimentar(
        &self,
        tutor_id: &str,
        cita_id: &str,
        comentario: &str,
    ) -> Result<CitaResponse, CitaError> {
        let cita = self.get_cita(ActorCita::Tutor(tutor_id), cita_id).await?;

        if cita.estado != EstadoCita::Realizada {
            return Err(CitaError::Validacion(
                "Solo las citas realizadas pueden recibir retroalimentación".to_string(),
            ));
        }

        let object_id = cita.id.expect("cita fetched from mongo always has _id");

        self.citas()
            .update_one(
                doc! { "_id": object_id },
                doc! { "$set": { "retroalimentacion": comentario.trim() } },
            )
            .await
            .context("Failed to store retroalimentación")?;

        let mut actualizada = cita;
        actualizada.retroalimentacion = Some(comentario.trim().to_string());
        Ok(CitaResponse::from(actualizada))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtro_de_actor() {
        let f = ActorCita::Tutor("t1").filtro();
        assert_eq!(f.get_str("tutorId").unwrap(), "t1");

        let f = ActorCita::Maestro("m1").filtro();
        assert_eq!(f.get_str("profesorId").unwrap(), "m1");

        assert!(ActorCita::Admin.filtro().is_empty());
    }

    #[test]
    fn test_filtro_claim_exige_horario_abierto_y_futuro() {
        use chrono::TimeZone;

        let ahora = Utc.with_ymd_and_hms(2026, 8, 26, 10, 0, 0).unwrap();
        let oid = ObjectId::from_bytes([7; 12]);

        let filtro = filtro_claim(oid, "prof1", ahora);
        assert_eq!(filtro.get_object_id("_id").unwrap(), oid);
        assert_eq!(filtro.get_str("profesorId").unwrap(), "prof1");
        assert!(filtro.get_bool("disponible").unwrap());

        // a slot whose fecha already passed must never match the claim
        let fecha = filtro.get_document("fecha").unwrap();
        assert_eq!(
            fecha.get_datetime("$gt").unwrap().timestamp_millis(),
            ahora.timestamp_millis()
        );
    }
}
