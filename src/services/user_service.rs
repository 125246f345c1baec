use crate::models::user::{
    validar_password, CreateUserRequest, EstadoUsuario, Hijo, HijoResponse, ListUsersQuery,
    PerfilUsuario, Rol, UpdateUserRequest, User,
};
use crate::services::NoEncontrado;
use anyhow::{anyhow, Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document, Regex};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Database;

/// Allocates the next sequential human-readable ID (PROF{n} / TUT0{n}).
///
/// Reading the current maximum and incrementing it loses under concurrent
/// creation; a $inc on a per-role counter document allocates atomically.
pub async fn siguiente_id_unico(mongo: &Database, rol: Rol) -> Result<String> {
    let counters = mongo.collection::<Document>("counters");

    let counter = counters
        .find_one_and_update(
            doc! { "_id": format!("idUnico:{}", rol.as_str()) },
            doc! { "$inc": { "seq": 1i64 } },
        )
        .with_options(
            FindOneAndUpdateOptions::builder()
                .upsert(true)
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await
        .context("Failed to increment idUnico counter")?
        .ok_or_else(|| anyhow!("Counter document missing after upsert"))?;

    let seq = counter
        .get_i64("seq")
        .context("Counter document without seq")?;

    Ok(formatear_id_unico(rol, seq))
}

pub fn formatear_id_unico(rol: Rol, n: i64) -> String {
    // TUT0 keeps its historic trailing zero (TUT01, TUT02, ... TUT010).
    let prefix = match rol {
        Rol::Maestro => "PROF",
        _ => "TUT0",
    };
    format!("{}{}", prefix, n)
}

pub struct UserService {
    mongo: Database,
}

impl UserService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Admin-side account creation for maestros and tutores.
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<PerfilUsuario> {
        let users = self.mongo.collection::<User>("users");

        match req.rol {
            Rol::Admin => return Err(anyhow!("No se pueden crear cuentas de administrador")),
            Rol::Maestro => {
                if req
                    .grado_asignado
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .is_empty()
                {
                    return Err(anyhow!("Ingresa el grado asignado para el maestro"));
                }
            }
            Rol::Tutor => {
                if req.hijos.is_empty() {
                    return Err(anyhow!("Agrega al menos un hijo para el tutor"));
                }
            }
        }

        if !validar_password(&req.password) {
            return Err(anyhow!(
                "La contraseña debe tener al menos 12 caracteres, incluyendo una mayúscula, un número y un símbolo"
            ));
        }

        let existing = users
            .find_one(doc! { "correo": &req.correo })
            .await
            .context("Failed to check existing user")?;

        if existing.is_some() {
            return Err(anyhow!("El correo ya está en uso por otro usuario"));
        }

        let password_hash = hash(&req.password, DEFAULT_COST).context("Failed to hash password")?;
        let id_unico = siguiente_id_unico(&self.mongo, req.rol).await?;

        let user = User {
            id: None,
            nombre_completo: req.nombre_completo,
            correo: req.correo,
            password_hash,
            rol: req.rol,
            estado: EstadoUsuario::Activo,
            grado_asignado: match req.rol {
                Rol::Maestro => req.grado_asignado.map(|g| g.trim().to_string()),
                _ => None,
            },
            id_unico,
            fecha_registro: Utc::now(),
            ultimo_acceso: None,
        };

        let insert_result = users
            .insert_one(&user)
            .await
            .context("Failed to insert user")?;

        let user_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Failed to get inserted user ID"))?;

        if user.rol == Rol::Tutor {
            let hijos = self.mongo.collection::<Hijo>("hijos");
            let docs: Vec<Hijo> = req
                .hijos
                .into_iter()
                .map(|h| Hijo {
                    id: None,
                    tutor_id: user_id.to_hex(),
                    nombre: h.nombre,
                    grado: h.grado,
                })
                .collect();
            hijos
                .insert_many(&docs)
                .await
                .context("Failed to insert hijos")?;
        }

        let mut user_with_id = user;
        user_with_id.id = Some(user_id);
        Ok(PerfilUsuario::from(user_with_id))
    }

    pub async fn list_users(&self, query: ListUsersQuery) -> Result<Vec<PerfilUsuario>> {
        let users = self.mongo.collection::<User>("users");

        let mut filter = doc! {};
        if let Some(rol) = query.rol {
            filter.insert("rol", rol);
        }
        if let Some(estado) = query.estado {
            filter.insert("estado", estado);
        }
        if let Some(buscar) = query.buscar {
            let regex = Regex {
                pattern: regex::escape(&buscar),
                options: "i".to_string(),
            };
            filter.insert(
                "$or",
                vec![
                    doc! { "nombreCompleto": &regex },
                    doc! { "correo": &regex },
                    doc! { "idUnico": &regex },
                ],
            );
        }

        let limit = query.limit.unwrap_or(50).min(100) as i64;
        let offset = query.offset.unwrap_or(0) as u64;

        let cursor = users
            .find(filter)
            .sort(doc! { "idUnico": 1 })
            .skip(offset)
            .limit(limit)
            .await
            .context("Failed to query users")?;

        let results: Vec<User> = cursor
            .try_collect()
            .await
            .context("Failed to collect users")?;

        Ok(results.into_iter().map(PerfilUsuario::from).collect())
    }

    /// Active maestros for a grade, the only profesores a tutor can book with.
    pub async fn maestros_activos_por_grado(&self, grado: &str) -> Result<Vec<PerfilUsuario>> {
        let users = self.mongo.collection::<User>("users");

        let cursor = users
            .find(doc! {
                "rol": "maestro",
                "estado": "activo",
                "gradoAsignado": grado,
            })
            .sort(doc! { "nombreCompleto": 1 })
            .await
            .context("Failed to query maestros")?;

        let results: Vec<User> = cursor
            .try_collect()
            .await
            .context("Failed to collect maestros")?;

        Ok(results.into_iter().map(PerfilUsuario::from).collect())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        let users = self.mongo.collection::<User>("users");

        let object_id = ObjectId::parse_str(user_id).context("Invalid user ID format")?;

        users
            .find_one(doc! { "_id": object_id })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow::Error::new(NoEncontrado("Usuario no encontrado".to_string())))
    }

    pub async fn get_perfil(&self, user_id: &str) -> Result<PerfilUsuario> {
        self.get_user(user_id).await.map(PerfilUsuario::from)
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        req: UpdateUserRequest,
    ) -> Result<PerfilUsuario> {
        let users = self.mongo.collection::<User>("users");

        let object_id = ObjectId::parse_str(user_id).context("Invalid user ID format")?;

        let mut set = doc! {};
        if let Some(nombre) = req.nombre_completo {
            set.insert("nombreCompleto", nombre);
        }
        if let Some(correo) = req.correo {
            let duplicado = users
                .find_one(doc! { "correo": &correo, "_id": { "$ne": object_id } })
                .await
                .context("Failed to check duplicate correo")?;
            if duplicado.is_some() {
                return Err(anyhow!("El correo ya está en uso por otro usuario"));
            }
            set.insert("correo", correo);
        }
        if let Some(grado) = req.grado_asignado {
            set.insert("gradoAsignado", grado.trim().to_string());
        }

        if set.is_empty() {
            return self.get_perfil(user_id).await;
        }

        let result = users
            .update_one(doc! { "_id": object_id }, doc! { "$set": set })
            .await
            .context("Failed to update user")?;

        if result.matched_count == 0 {
            return Err(NoEncontrado("Usuario no encontrado".to_string()).into());
        }

        self.get_perfil(user_id).await
    }

    /// Soft deactivation: the account disappears from every active listing but
    /// its citas stay readable.
    pub async fn deactivate_user(&self, user_id: &str) -> Result<PerfilUsuario> {
        self.set_estado(user_id, EstadoUsuario::Inactivo).await
    }

    pub async fn reactivate_user(&self, user_id: &str) -> Result<PerfilUsuario> {
        self.set_estado(user_id, EstadoUsuario::Activo).await
    }

    async fn set_estado(&self, user_id: &str, estado: EstadoUsuario) -> Result<PerfilUsuario> {
        let users = self.mongo.collection::<User>("users");

        let object_id = ObjectId::parse_str(user_id).context("Invalid user ID format")?;

        let result = users
            .update_one(
                doc! { "_id": object_id },
                doc! { "$set": { "estado": estado.as_str() } },
            )
            .await
            .context("Failed to update estado")?;

        if result.matched_count == 0 {
            return Err(NoEncontrado("Usuario no encontrado".to_string()).into());
        }

        self.get_perfil(user_id).await
    }

    pub async fn hijos_de_tutor(&self, tutor_id: &str) -> Result<Vec<HijoResponse>> {
        let hijos = self.mongo.collection::<Hijo>("hijos");

        let cursor = hijos
            .find(doc! { "tutorId": tutor_id })
            .sort(doc! { "nombre": 1 })
            .await
            .context("Failed to query hijos")?;

        let results: Vec<Hijo> = cursor
            .try_collect()
            .await
            .context("Failed to collect hijos")?;

        Ok(results.into_iter().map(HijoResponse::from).collect())
    }

    pub async fn get_hijo(&self, tutor_id: &str, hijo_id: &str) -> Result<Hijo> {
        let hijos = self.mongo.collection::<Hijo>("hijos");

        let object_id = ObjectId::parse_str(hijo_id).context("Invalid hijo ID format")?;

        hijos
            .find_one(doc! { "_id": object_id, "tutorId": tutor_id })
            .await
            .context("Failed to query hijo")?
            .ok_or_else(|| anyhow::Error::new(NoEncontrado("Alumno no encontrado".to_string())))
    }

    /// Tutores with at least one hijo in the given grade; used by maestros to
    /// pick a message recipient. Inactive tutors are excluded.
    pub async fn tutores_activos_por_grado(&self, grado: &str) -> Result<Vec<PerfilUsuario>> {
        let hijos = self.mongo.collection::<Hijo>("hijos");
        let users = self.mongo.collection::<User>("users");

        let cursor = hijos
            .find(doc! { "grado": grado })
            .await
            .context("Failed to query hijos by grado")?;
        let matching: Vec<Hijo> = cursor
            .try_collect()
            .await
            .context("Failed to collect hijos")?;

        let mut tutor_ids: Vec<ObjectId> = matching
            .iter()
            .filter_map(|h| ObjectId::parse_str(&h.tutor_id).ok())
            .collect();
        tutor_ids.sort();
        tutor_ids.dedup();

        if tutor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = users
            .find(doc! {
                "_id": { "$in": tutor_ids },
                "rol": "tutor",
                "estado": "activo",
            })
            .sort(doc! { "nombreCompleto": 1 })
            .await
            .context("Failed to query tutores")?;

        let results: Vec<User> = cursor
            .try_collect()
            .await
            .context("Failed to collect tutores")?;

        Ok(results.into_iter().map(PerfilUsuario::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatear_id_unico_maestro() {
        assert_eq!(formatear_id_unico(Rol::Maestro, 1), "PROF1");
        assert_eq!(formatear_id_unico(Rol::Maestro, 12), "PROF12");
    }

    #[test]
    fn test_formatear_id_unico_tutor() {
        assert_eq!(formatear_id_unico(Rol::Tutor, 1), "TUT01");
        assert_eq!(formatear_id_unico(Rol::Tutor, 9), "TUT09");
        // historic quirk: the prefix zero is literal, n=10 renders TUT010
        assert_eq!(formatear_id_unico(Rol::Tutor, 10), "TUT010");
    }
}
