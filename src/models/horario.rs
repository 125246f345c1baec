use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use mongodb::bson::oid::ObjectId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Weekdays a maestro can open slots on.
pub const DIAS_SEMANA: [&str; 5] = ["Lunes", "Martes", "Miércoles", "Jueves", "Viernes"];

lazy_static! {
    static ref HORA_RE: Regex = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();
}

/// Availability slot stored in the "horarios_disponibles" collection.
///
/// `disponible` is the single source of truth for whether a slot can still be
/// claimed; it is only ever flipped through conditional updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Horario {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub profesor_id: String,
    pub nombre_profesor: String,
    pub dia: String,
    pub hora_inicio: String,
    pub hora_fin: String,
    pub disponible: bool,
    /// Next occurrence of `dia`, always strictly in the future at save time.
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub fecha: DateTime<Utc>,
}

impl Horario {
    /// Identity of a slot within one maestro's week.
    pub fn clave(&self) -> (String, String, String) {
        (
            self.dia.clone(),
            self.hora_inicio.clone(),
            self.hora_fin.clone(),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HorarioResponse {
    pub id: String,
    pub profesor_id: String,
    pub nombre_profesor: String,
    pub dia: String,
    pub hora_inicio: String,
    pub hora_fin: String,
    pub disponible: bool,
    pub fecha: DateTime<Utc>,
}

impl From<Horario> for HorarioResponse {
    fn from(h: Horario) -> Self {
        HorarioResponse {
            id: h.id.map(|id| id.to_hex()).unwrap_or_default(),
            profesor_id: h.profesor_id,
            nombre_profesor: h.nombre_profesor,
            dia: h.dia,
            hora_inicio: h.hora_inicio,
            hora_fin: h.hora_fin,
            disponible: h.disponible,
            fecha: h.fecha,
        }
    }
}

/// One (dia, horaInicio, horaFin) triple in a maestro's weekly selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct FranjaHoraria {
    pub dia: String,
    pub hora_inicio: String,
    pub hora_fin: String,
}

impl FranjaHoraria {
    pub fn clave(&self) -> (String, String, String) {
        (
            self.dia.clone(),
            self.hora_inicio.clone(),
            self.hora_fin.clone(),
        )
    }

    /// HH:MM format on both ends, fin strictly after inicio, dia Lunes..Viernes.
    pub fn validar(&self) -> Result<(), String> {
        if !DIAS_SEMANA.contains(&self.dia.as_str()) {
            return Err(format!("Día inválido: {}", self.dia));
        }
        if !es_hora_valida(&self.hora_inicio) {
            return Err(format!("Hora de inicio inválida: {}", self.hora_inicio));
        }
        if !es_hora_valida(&self.hora_fin) {
            return Err(format!("Hora de fin inválida: {}", self.hora_fin));
        }
        if self.hora_fin <= self.hora_inicio {
            return Err(format!(
                "La hora de fin ({}) debe ser posterior a la de inicio ({})",
                self.hora_fin, self.hora_inicio
            ));
        }
        Ok(())
    }
}

/// Full weekly selection submitted by a maestro (PUT semantics).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetHorariosRequest {
    #[validate(length(min = 1, message = "Selecciona al menos un horario"))]
    pub franjas: Vec<FranjaHoraria>,
}

pub fn es_hora_valida(hora: &str) -> bool {
    HORA_RE.is_match(hora)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn franja(dia: &str, inicio: &str, fin: &str) -> FranjaHoraria {
        FranjaHoraria {
            dia: dia.to_string(),
            hora_inicio: inicio.to_string(),
            hora_fin: fin.to_string(),
        }
    }

    #[test]
    fn test_formato_hora() {
        assert!(es_hora_valida("07:00"));
        assert!(es_hora_valida("23:59"));
        assert!(!es_hora_valida("7:00"));
        assert!(!es_hora_valida("24:00"));
        assert!(!es_hora_valida("12:60"));
        assert!(!es_hora_valida("12-30"));
        assert!(!es_hora_valida(""));
    }

    #[test]
    fn test_franja_valida() {
        assert!(franja("Lunes", "08:00", "09:00").validar().is_ok());
        assert!(franja("Viernes", "16:00", "17:00").validar().is_ok());
    }

    #[test]
    fn test_franja_fin_antes_de_inicio() {
        let err = franja("Lunes", "09:00", "08:00").validar().unwrap_err();
        assert!(err.contains("posterior"));
        // zero-length slots are rejected too
        assert!(franja("Lunes", "09:00", "09:00").validar().is_err());
    }

    #[test]
    fn test_franja_dia_invalido() {
        assert!(franja("Sábado", "08:00", "09:00").validar().is_err());
        assert!(franja("lunes", "08:00", "09:00").validar().is_err());
    }
}
