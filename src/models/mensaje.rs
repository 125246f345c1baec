use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One-way contact message ("contactos_admin" / "contactos_tutor").
/// No threading, no read receipts; deletion is a soft status flip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mensaje {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sender_id: String,
    pub sender_nombre: String,
    pub receptor_id: String,
    pub receptor_nombre: String,
    pub contenido: String,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub fecha: DateTime<Utc>,
    pub estado: EstadoMensaje,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EstadoMensaje {
    Enviado,
    Eliminado,
    Pendiente,
}

impl EstadoMensaje {
    pub fn as_str(&self) -> &str {
        match self {
            EstadoMensaje::Enviado => "enviado",
            EstadoMensaje::Eliminado => "eliminado",
            EstadoMensaje::Pendiente => "pendiente",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnviarMensajeRequest {
    pub receptor_id: String,

    #[validate(length(min = 1, max = 2000, message = "El mensaje no puede estar vacío"))]
    pub contenido: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MensajeResponse {
    pub id: String,
    pub sender_id: String,
    pub sender_nombre: String,
    pub receptor_id: String,
    pub receptor_nombre: String,
    pub contenido: String,
    pub fecha: DateTime<Utc>,
    pub estado: EstadoMensaje,
}

impl From<Mensaje> for MensajeResponse {
    fn from(m: Mensaje) -> Self {
        MensajeResponse {
            id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
            sender_id: m.sender_id,
            sender_nombre: m.sender_nombre,
            receptor_id: m.receptor_id,
            receptor_nombre: m.receptor_nombre,
            contenido: m.contenido,
            fecha: m.fecha,
            estado: m.estado,
        }
    }
}
