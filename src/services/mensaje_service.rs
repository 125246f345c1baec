use crate::models::mensaje::{EnviarMensajeRequest, EstadoMensaje, Mensaje, MensajeResponse};
use crate::services::user_service::UserService;
use crate::services::NoEncontrado;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

/// Which contact log a message lives in. Admin traffic and maestro->tutor
/// traffic are stored in separate collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buzon {
    Admin,
    Tutor,
}

impl Buzon {
    pub fn collection_name(&self) -> &str {
        match self {
            Buzon::Admin => "contactos_admin",
            Buzon::Tutor => "contactos_tutor",
        }
    }
}

pub struct MensajeService {
    mongo: Database,
    buzon: Buzon,
}

impl MensajeService {
    pub fn new(mongo: Database, buzon: Buzon) -> Self {
        Self { mongo, buzon }
    }

    fn mensajes(&self) -> mongodb::Collection<Mensaje> {
        self.mongo.collection::<Mensaje>(self.buzon.collection_name())
    }

    /// Fire-and-forget send. Receiver must exist and be active.
    pub async fn enviar(
        &self,
        sender_id: &str,
        req: EnviarMensajeRequest,
    ) -> Result<MensajeResponse> {
        let user_service = UserService::new(self.mongo.clone());

        let sender = user_service.get_user(sender_id).await?;
        let receptor = user_service.get_user(&req.receptor_id).await?;

        if receptor.estado.as_str() == "inactivo" {
            return Err(anyhow!("El destinatario está desactivado"));
        }

        let mensaje = Mensaje {
            id: None,
            sender_id: sender_id.to_string(),
            sender_nombre: sender.nombre_completo,
            receptor_id: req.receptor_id,
            receptor_nombre: receptor.nombre_completo,
            contenido: req.contenido.trim().to_string(),
            fecha: Utc::now(),
            estado: EstadoMensaje::Enviado,
        };

        let insert_result = self
            .mensajes()
            .insert_one(&mensaje)
            .await
            .context("Failed to insert mensaje")?;

        let mut enviado = mensaje;
        enviado.id = insert_result.inserted_id.as_object_id();
        Ok(MensajeResponse::from(enviado))
    }

    /// Messages visible to `user_id` (sent or received), soft-deleted ones
    /// filtered out, newest first.
    pub async fn listar(&self, user_id: &str) -> Result<Vec<MensajeResponse>> {
        let cursor = self
            .mensajes()
            .find(doc! {
                "$or": [
                    { "senderId": user_id },
                    { "receptorId": user_id },
                ],
                "estado": { "$ne": EstadoMensaje::Eliminado.as_str() },
            })
            .sort(doc! { "fecha": -1 })
            .limit(200)
            .await
            .context("Failed to query mensajes")?;

        let results: Vec<Mensaje> = cursor
            .try_collect()
            .await
            .context("Failed to collect mensajes")?;

        Ok(results.into_iter().map(MensajeResponse::from).collect())
    }

    /// Soft delete, only by one of the two participants.
    pub async fn eliminar(&self, user_id: &str, mensaje_id: &str) -> Result<()> {
        let object_id = ObjectId::parse_str(mensaje_id).context("Invalid mensaje ID format")?;

        let result = self
            .mensajes()
            .update_one(
                doc! {
                    "_id": object_id,
                    "$or": [
                        { "senderId": user_id },
                        { "receptorId": user_id },
                    ],
                },
                doc! { "$set": { "estado": EstadoMensaje::Eliminado.as_str() } },
            )
            .await
            .context("Failed to delete mensaje")?;

        if result.matched_count == 0 {
            return Err(NoEncontrado("Mensaje no encontrado".to_string()).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buzon_collections() {
        assert_eq!(Buzon::Admin.collection_name(), "contactos_admin");
        assert_eq!(Buzon::Tutor.collection_name(), "contactos_tutor");
    }
}
