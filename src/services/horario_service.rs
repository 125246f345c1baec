use crate::models::horario::{FranjaHoraria, Horario, HorarioResponse, SetHorariosRequest};
use crate::utils::time::{chrono_to_bson, proxima_fecha_dia};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use std::collections::BTreeSet;

/// Outcome of planning a weekly-availability save: which slot documents to
/// delete and which triples to insert. Booked slots are never part of either.
#[derive(Debug, Default, PartialEq)]
pub struct PlanReemplazo {
    pub a_borrar: Vec<ObjectId>,
    pub a_insertar: Vec<FranjaHoraria>,
}

/// Full-replace policy for a maestro's weekly grid:
/// - open (disponible) slots missing from the new selection are deleted;
/// - selected triples not present yet (in any state) are inserted;
/// - booked (no disponible) slots are left untouched so active citas keep a
///   valid horario reference.
pub fn planear_reemplazo(existentes: &[Horario], seleccion: &[FranjaHoraria]) -> PlanReemplazo {
    let deseadas: BTreeSet<_> = seleccion.iter().map(|f| f.clave()).collect();
    let actuales: BTreeSet<_> = existentes.iter().map(|h| h.clave()).collect();

    let a_borrar = existentes
        .iter()
        .filter(|h| h.disponible && !deseadas.contains(&h.clave()))
        .filter_map(|h| h.id)
        .collect();

    let mut vistas = BTreeSet::new();
    let a_insertar = seleccion
        .iter()
        .filter(|f| !actuales.contains(&f.clave()))
        .filter(|f| vistas.insert(f.clave()))
        .cloned()
        .collect();

    PlanReemplazo {
        a_borrar,
        a_insertar,
    }
}

pub struct HorarioService {
    mongo: Database,
}

impl HorarioService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Everything the maestro has registered, open and booked alike.
    pub async fn horarios_de_maestro(&self, profesor_id: &str) -> Result<Vec<HorarioResponse>> {
        let horarios = self.mongo.collection::<Horario>("horarios_disponibles");

        let cursor = horarios
            .find(doc! { "profesorId": profesor_id })
            .sort(doc! { "fecha": 1, "horaInicio": 1 })
            .await
            .context("Failed to query horarios")?;

        let results: Vec<Horario> = cursor
            .try_collect()
            .await
            .context("Failed to collect horarios")?;

        Ok(results.into_iter().map(HorarioResponse::from).collect())
    }

    /// Open slots of one maestro, what a tutor sees when booking.
    pub async fn horarios_disponibles(&self, profesor_id: &str) -> Result<Vec<HorarioResponse>> {
        let horarios = self.mongo.collection::<Horario>("horarios_disponibles");

        let cursor = horarios
            .find(doc! { "profesorId": profesor_id, "disponible": true })
            .sort(doc! { "fecha": 1, "horaInicio": 1 })
            .await
            .context("Failed to query horarios disponibles")?;

        let results: Vec<Horario> = cursor
            .try_collect()
            .await
            .context("Failed to collect horarios disponibles")?;

        Ok(results.into_iter().map(HorarioResponse::from).collect())
    }

    /// Saves the maestro's weekly selection with the replace-preserving-booked
    /// policy. Returns the resulting week.
    pub async fn guardar_horarios(
        &self,
        profesor_id: &str,
        nombre_profesor: &str,
        req: SetHorariosRequest,
    ) -> Result<Vec<HorarioResponse>> {
        for franja in &req.franjas {
            franja.validar().map_err(|e| anyhow!(e))?;
        }

        let horarios = self.mongo.collection::<Horario>("horarios_disponibles");

        let cursor = horarios
            .find(doc! { "profesorId": profesor_id })
            .await
            .context("Failed to query existing horarios")?;
        let existentes: Vec<Horario> = cursor
            .try_collect()
            .await
            .context("Failed to collect existing horarios")?;

        let plan = planear_reemplazo(&existentes, &req.franjas);
        let ahora = Utc::now();

        if !plan.a_borrar.is_empty() {
            horarios
                .delete_many(doc! {
                    "_id": { "$in": &plan.a_borrar },
                    // a slot claimed between our read and this delete survives
                    "disponible": true,
                })
                .await
                .context("Failed to delete deselected horarios")?;
        }

        if !plan.a_insertar.is_empty() {
            let nuevos = plan
                .a_insertar
                .iter()
                .map(|f| self.nuevo_horario(profesor_id, nombre_profesor, f, ahora))
                .collect::<Result<Vec<Horario>>>()?;

            horarios
                .insert_many(&nuevos)
                .await
                .context("Failed to insert horarios")?;
        }

        self.horarios_de_maestro(profesor_id).await
    }

    fn nuevo_horario(
        &self,
        profesor_id: &str,
        nombre_profesor: &str,
        franja: &FranjaHoraria,
        ahora: DateTime<Utc>,
    ) -> Result<Horario> {
        let fecha = proxima_fecha_dia(&franja.dia, &franja.hora_inicio, ahora)
            .ok_or_else(|| anyhow!("No se pudo calcular la fecha para {}", franja.dia))?;

        Ok(Horario {
            id: None,
            profesor_id: profesor_id.to_string(),
            nombre_profesor: nombre_profesor.to_string(),
            dia: franja.dia.clone(),
            hora_inicio: franja.hora_inicio.clone(),
            hora_fin: franja.hora_fin.clone(),
            disponible: true,
            fecha,
        })
    }

    /// Releases a claimed slot (cancellation / rejection path). The filter on
    /// disponible=false makes a double release harmless.
    pub async fn liberar_horario(&self, horario_id: &str) -> Result<bool> {
        let horarios = self.mongo.collection::<Horario>("horarios_disponibles");

        let object_id = ObjectId::parse_str(horario_id).context("Invalid horario ID format")?;

        let result = horarios
            .update_one(
                doc! { "_id": object_id, "disponible": false },
                doc! { "$set": { "disponible": true, "fecha": chrono_to_bson(Utc::now()) } },
            )
            .await
            .context("Failed to release horario")?;

        // refresh fecha so a released slot reappears on the next weekday
        if result.modified_count == 1 {
            if let Ok(Some(horario)) = horarios.find_one(doc! { "_id": object_id }).await {
                if let Some(fecha) = proxima_fecha_dia(&horario.dia, &horario.hora_inicio, Utc::now())
                {
                    let _ = horarios
                        .update_one(
                            doc! { "_id": object_id },
                            doc! { "$set": { "fecha": chrono_to_bson(fecha) } },
                        )
                        .await;
                }
            }
        }

        Ok(result.modified_count == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn franja(dia: &str, inicio: &str, fin: &str) -> FranjaHoraria {
        FranjaHoraria {
            dia: dia.to_string(),
            hora_inicio: inicio.to_string(),
            hora_fin: fin.to_string(),
        }
    }

    fn horario(id: u8, dia: &str, inicio: &str, fin: &str, disponible: bool) -> Horario {
        Horario {
            id: Some(ObjectId::from_bytes([id; 12])),
            profesor_id: "prof1".to_string(),
            nombre_profesor: "Profesora Uno".to_string(),
            dia: dia.to_string(),
            hora_inicio: inicio.to_string(),
            hora_fin: fin.to_string(),
            disponible,
            fecha: Utc.with_ymd_and_hms(2026, 8, 31, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_plan_borra_abiertos_deseleccionados() {
        let existentes = vec![
            horario(1, "Lunes", "08:00", "09:00", true),
            horario(2, "Martes", "08:00", "09:00", true),
        ];
        let seleccion = vec![franja("Lunes", "08:00", "09:00")];

        let plan = planear_reemplazo(&existentes, &seleccion);
        assert_eq!(plan.a_borrar, vec![ObjectId::from_bytes([2; 12])]);
        assert!(plan.a_insertar.is_empty());
    }

    #[test]
    fn test_plan_nunca_borra_reservados() {
        let existentes = vec![horario(1, "Lunes", "08:00", "09:00", false)];
        // Lunes deselected entirely
        let seleccion = vec![franja("Viernes", "10:00", "11:00")];

        let plan = planear_reemplazo(&existentes, &seleccion);
        assert!(plan.a_borrar.is_empty());
        assert_eq!(plan.a_insertar, vec![franja("Viernes", "10:00", "11:00")]);
    }

    #[test]
    fn test_plan_no_reinserta_existentes() {
        // slot already exists booked; re-selecting it must not duplicate it
        let existentes = vec![horario(1, "Lunes", "08:00", "09:00", false)];
        let seleccion = vec![
            franja("Lunes", "08:00", "09:00"),
            franja("Lunes", "09:00", "10:00"),
        ];

        let plan = planear_reemplazo(&existentes, &seleccion);
        assert!(plan.a_borrar.is_empty());
        assert_eq!(plan.a_insertar, vec![franja("Lunes", "09:00", "10:00")]);
    }

    #[test]
    fn test_plan_deduplica_seleccion() {
        let existentes = vec![];
        let seleccion = vec![
            franja("Lunes", "08:00", "09:00"),
            franja("Lunes", "08:00", "09:00"),
        ];

        let plan = planear_reemplazo(&existentes, &seleccion);
        assert_eq!(plan.a_insertar.len(), 1);
    }

    #[test]
    fn test_plan_vacio_sin_cambios() {
        let existentes = vec![horario(1, "Lunes", "08:00", "09:00", true)];
        let seleccion = vec![franja("Lunes", "08:00", "09:00")];

        let plan = planear_reemplazo(&existentes, &seleccion);
        assert_eq!(plan, PlanReemplazo::default());
    }
}
