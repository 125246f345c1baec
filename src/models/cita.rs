use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Appointment document stored in the "citas" collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cita {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub tutor_id: String,
    pub profesor_id: String,
    pub hijo_id: String,
    pub horario_id: String,
    pub nombre_alumno: String,
    pub grado: String,
    pub motivo: String,
    pub importancia: Importancia,
    pub requiere_directora: bool,
    pub modalidad: Modalidad,
    pub estado: EstadoCita,
    /// Weekday and start hour copied from the claimed slot, denormalized so
    /// listings render without a second lookup.
    pub dia: String,
    pub hora: String,
    /// When the appointment takes place (the slot's fecha).
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub fecha: DateTime<Utc>,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub fecha_creacion: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retroalimentacion: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Importancia {
    Alta,
    Media,
    Baja,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Modalidad {
    Presencial,
    Linea,
}

/// Lifecycle states of a cita.
///
/// pendiente -> aceptado | rechazado (maestro inbox) and pendiente/aceptado
/// may still be resolved or cancelled; everything else is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EstadoCita {
    #[serde(rename = "pendiente")]
    Pendiente,
    #[serde(rename = "aceptado")]
    Aceptado,
    #[serde(rename = "rechazado")]
    Rechazado,
    #[serde(rename = "realizada")]
    Realizada,
    #[serde(rename = "no realizada")]
    NoRealizada,
    #[serde(rename = "cancelada")]
    Cancelada,
}

impl EstadoCita {
    pub fn as_str(&self) -> &str {
        match self {
            EstadoCita::Pendiente => "pendiente",
            EstadoCita::Aceptado => "aceptado",
            EstadoCita::Rechazado => "rechazado",
            EstadoCita::Realizada => "realizada",
            EstadoCita::NoRealizada => "no realizada",
            EstadoCita::Cancelada => "cancelada",
        }
    }

    pub fn es_terminal(&self) -> bool {
        matches!(
            self,
            EstadoCita::Rechazado
                | EstadoCita::Realizada
                | EstadoCita::NoRealizada
                | EstadoCita::Cancelada
        )
    }

    /// Transition matrix. No transition ever reopens a terminal state.
    pub fn puede_pasar_a(&self, destino: EstadoCita) -> bool {
        use EstadoCita::*;
        match (self, destino) {
            (Pendiente, Aceptado)
            | (Pendiente, Rechazado)
            | (Pendiente, Realizada)
            | (Pendiente, NoRealizada)
            | (Pendiente, Cancelada) => true,
            (Aceptado, Realizada) | (Aceptado, NoRealizada) | (Aceptado, Cancelada) => true,
            _ => false,
        }
    }

    /// States whose slot claim should be released when the cita leaves the
    /// active set (cancelled or rejected).
    pub fn libera_horario(&self) -> bool {
        matches!(self, EstadoCita::Cancelada | EstadoCita::Rechazado)
    }
}

/// Booking request. `tutor_id` comes from the JWT for tutors; admins agendando
/// on behalf of a tutor pass it explicitly.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCitaRequest {
    pub hijo_id: String,
    pub profesor_id: String,
    pub horario_id: String,

    #[validate(length(min = 1, max = 500, message = "Describe el motivo de la cita"))]
    pub motivo: String,

    pub importancia: Importancia,
    #[serde(default)]
    pub requiere_directora: bool,
    pub modalidad: Modalidad,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCitaRequest {
    #[validate(length(min = 1, max = 500, message = "Describe el motivo de la cita"))]
    pub motivo: Option<String>,
    pub importancia: Option<Importancia>,
    pub requiere_directora: Option<bool>,
    pub modalidad: Option<Modalidad>,
    /// Re-slot: claim this horario and release the previous one.
    pub horario_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RetroalimentacionRequest {
    #[validate(length(min = 1, max = 1000, message = "Escribe un comentario"))]
    pub comentario: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCitasQuery {
    pub estado: Option<String>,
    pub requiere_directora: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitaResponse {
    pub id: String,
    pub tutor_id: String,
    pub profesor_id: String,
    pub hijo_id: String,
    pub horario_id: String,
    pub nombre_alumno: String,
    pub grado: String,
    pub motivo: String,
    pub importancia: Importancia,
    pub requiere_directora: bool,
    pub modalidad: Modalidad,
    pub estado: EstadoCita,
    pub dia: String,
    pub hora: String,
    pub fecha: DateTime<Utc>,
    pub fecha_creacion: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retroalimentacion: Option<String>,
}

impl From<Cita> for CitaResponse {
    fn from(cita: Cita) -> Self {
        CitaResponse {
            id: cita.id.map(|id| id.to_hex()).unwrap_or_default(),
            tutor_id: cita.tutor_id,
            profesor_id: cita.profesor_id,
            hijo_id: cita.hijo_id,
            horario_id: cita.horario_id,
            nombre_alumno: cita.nombre_alumno,
            grado: cita.grado,
            motivo: cita.motivo,
            importancia: cita.importancia,
            requiere_directora: cita.requiere_directora,
            modalidad: cita.modalidad,
            estado: cita.estado,
            dia: cita.dia,
            hora: cita.hora,
            fecha: cita.fecha,
            fecha_creacion: cita.fecha_creacion,
            retroalimentacion: cita.retroalimentacion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transiciones_desde_pendiente() {
        let p = EstadoCita::Pendiente;
        assert!(p.puede_pasar_a(EstadoCita::Aceptado));
        assert!(p.puede_pasar_a(EstadoCita::Rechazado));
        assert!(p.puede_pasar_a(EstadoCita::Realizada));
        assert!(p.puede_pasar_a(EstadoCita::NoRealizada));
        assert!(p.puede_pasar_a(EstadoCita::Cancelada));
        assert!(!p.puede_pasar_a(EstadoCita::Pendiente));
    }

    #[test]
    fn test_transiciones_desde_aceptado() {
        let a = EstadoCita::Aceptado;
        assert!(a.puede_pasar_a(EstadoCita::Realizada));
        assert!(a.puede_pasar_a(EstadoCita::NoRealizada));
        assert!(a.puede_pasar_a(EstadoCita::Cancelada));
        assert!(!a.puede_pasar_a(EstadoCita::Rechazado));
        assert!(!a.puede_pasar_a(EstadoCita::Pendiente));
    }

    #[test]
    fn test_estados_terminales_no_reabren() {
        for terminal in [
            EstadoCita::Rechazado,
            EstadoCita::Realizada,
            EstadoCita::NoRealizada,
            EstadoCita::Cancelada,
        ] {
            assert!(terminal.es_terminal());
            for destino in [
                EstadoCita::Pendiente,
                EstadoCita::Aceptado,
                EstadoCita::Rechazado,
                EstadoCita::Realizada,
                EstadoCita::NoRealizada,
                EstadoCita::Cancelada,
            ] {
                assert!(
                    !terminal.puede_pasar_a(destino),
                    "{:?} -> {:?} should be rejected",
                    terminal,
                    destino
                );
            }
        }
    }

    #[test]
    fn test_libera_horario() {
        assert!(EstadoCita::Cancelada.libera_horario());
        assert!(EstadoCita::Rechazado.libera_horario());
        assert!(!EstadoCita::Realizada.libera_horario());
        assert!(!EstadoCita::Aceptado.libera_horario());
    }

    #[test]
    fn test_estado_wire_format() {
        // "no realizada" carries a space on the wire
        assert_eq!(
            serde_json::to_string(&EstadoCita::NoRealizada).unwrap(),
            "\"no realizada\""
        );
        let estado: EstadoCita = serde_json::from_str("\"no realizada\"").unwrap();
        assert_eq!(estado, EstadoCita::NoRealizada);
    }
}
