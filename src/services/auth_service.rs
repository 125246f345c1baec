use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::user::{
    validar_password, AuthResponse, EstadoUsuario, Hijo, LoginRequest, PerfilUsuario,
    RegisterRequest, Rol, User,
};
use crate::services::user_service;
use crate::utils::time::chrono_to_bson;
use anyhow::{anyhow, Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::doc;
use mongodb::Database;
use rand::{distr::Alphanumeric, Rng};

pub struct AuthService {
    mongo: Database,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(mongo: Database, jwt_service: JwtService) -> Self {
        let access_token_ttl_seconds = std::env::var("JWT_ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(3600);

        Self {
            mongo,
            jwt_service,
            access_token_ttl_seconds,
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        hash(password, DEFAULT_COST).context("Failed to hash password")
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        verify(password, hash).context("Failed to verify password")
    }

    /// Tutor self-registration: creates the user, its hijos and a session token.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse> {
        let users = self.mongo.collection::<User>("users");

        if !validar_password(&req.password) {
            return Err(anyhow!(
                "La contraseña debe tener al menos 12 caracteres, incluyendo una mayúscula, un número y un símbolo"
            ));
        }

        if req.hijos.is_empty() {
            return Err(anyhow!("Agrega al menos un hijo para registrarte"));
        }

        let existing = users
            .find_one(doc! { "correo": &req.correo })
            .await
            .context("Failed to check existing user")?;

        if existing.is_some() {
            return Err(anyhow!("El correo ya está en uso por otro usuario"));
        }

        let password_hash = self.hash_password(&req.password)?;
        let id_unico = user_service::siguiente_id_unico(&self.mongo, Rol::Tutor).await?;

        let user = User {
            id: None,
            nombre_completo: req.nombre_completo,
            correo: req.correo,
            password_hash,
            rol: Rol::Tutor,
            estado: EstadoUsuario::Activo,
            grado_asignado: None,
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

        let access_token = self.generate_access_token(&user_id.to_hex(), user.rol)?;

        let mut user_with_id = user;
        user_with_id.id = Some(user_id);

        Ok(AuthResponse {
            access_token,
            user: PerfilUsuario::from(user_with_id),
        })
    }

    /// Email/password login. The estado check runs after the password is
    /// verified, so only a caller holding valid credentials learns that the
    /// account was deactivated.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
        let users = self.mongo.collection::<User>("users");

        let user = users
            .find_one(doc! { "correo": &req.correo })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow!("Correo o contraseña incorrectos"))?;

        if !self.verify_password(&req.password, &user.password_hash)? {
            return Err(anyhow!("Correo o contraseña incorrectos"));
        }

        if user.estado == EstadoUsuario::Inactivo {
            return Err(anyhow!("La cuenta está desactivada"));
        }

        let user_id = user
            .id
            .ok_or_else(|| anyhow!("User document without _id"))?;

        let ahora = Utc::now();
        users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "ultimoAcceso": chrono_to_bson(ahora) } },
            )
            .await
            .context("Failed to stamp ultimoAcceso")?;

        let access_token = self.generate_access_token(&user_id.to_hex(), user.rol)?;

        let mut user = user;
        user.ultimo_acceso = Some(ahora);

        Ok(AuthResponse {
            access_token,
            user: PerfilUsuario::from(user),
        })
    }

    /// Replaces the password with a random temporary one and returns it so the
    /// caller can mail it (or hand it back when email sending is disabled).
    pub async fn reset_password(&self, correo: &str) -> Result<(PerfilUsuario, String)> {
        let users = self.mongo.collection::<User>("users");

        let user = users
            .find_one(doc! { "correo": correo })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow!("No existe una cuenta con ese correo"))?;

        let temporal = generar_password_temporal();
        let password_hash = self.hash_password(&temporal)?;

        users
            .update_one(
                doc! { "correo": correo },
                doc! { "$set": { "passwordHash": &password_hash } },
            )
            .await
            .context("Failed to store temporary password")?;

        Ok((PerfilUsuario::from(user), temporal))
    }

    pub fn generate_access_token(&self, user_id: &str, rol: Rol) -> Result<String> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            rol: rol.as_str().to_string(),
            exp: (now + Duration::seconds(self.access_token_ttl_seconds)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(claims)
            .map_err(|e| anyhow!("Failed to generate access token: {}", e))
    }
}

fn generar_password_temporal() -> String {
    // Alphanumeric base plus a fixed suffix so the result satisfies the
    // password policy (uppercase + digit come from the pool often enough,
    // the symbol never does).
    let base: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("A1!{}", base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::validar_password;

    #[test]
    fn test_password_temporal_cumple_politica() {
        for _ in 0..20 {
            let pw = generar_password_temporal();
            assert!(validar_password(&pw), "weak temp password: {}", pw);
        }
    }

    #[test]
    fn test_token_round_trip() {
        let jwt = JwtService::new("test-secret");
        let service_claims = JwtClaims {
            sub: "abc123".to_string(),
            rol: "tutor".to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
            iat: Utc::now().timestamp() as usize,
        };
        let token = jwt.generate_token(service_claims).unwrap();
        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "abc123");
        assert_eq!(claims.rol, "tutor");
    }
}
