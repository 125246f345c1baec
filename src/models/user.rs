use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User document stored in the "users" collection.
///
/// Field names stay camelCase on the wire to remain compatible with the data
/// the school has already accumulated (nombreCompleto, gradoAsignado, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub nombre_completo: String,
    pub correo: String,
    pub password_hash: String,
    pub rol: Rol,
    pub estado: EstadoUsuario,
    /// Grade a maestro teaches. Absent for tutors and admins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grado_asignado: Option<String>,
    /// Human-readable sequential ID (PROF{n} / TUT0{n}).
    pub id_unico: String,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub fecha_registro: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "super::bson_datetime_as_chrono_option"
    )]
    pub ultimo_acceso: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rol {
    Admin,
    Maestro,
    Tutor,
}

impl Rol {
    pub fn as_str(&self) -> &str {
        match self {
            Rol::Admin => "admin",
            Rol::Maestro => "maestro",
            Rol::Tutor => "tutor",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EstadoUsuario {
    #[default]
    Activo,
    Inactivo,
}

impl EstadoUsuario {
    pub fn as_str(&self) -> &str {
        match self {
            EstadoUsuario::Activo => "activo",
            EstadoUsuario::Inactivo => "inactivo",
        }
    }
}

/// Child registered under a tutor ("hijos" collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hijo {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub tutor_id: String,
    pub nombre: String,
    pub grado: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HijoResponse {
    pub id: String,
    pub nombre: String,
    pub grado: String,
}

impl From<Hijo> for HijoResponse {
    fn from(hijo: Hijo) -> Self {
        HijoResponse {
            id: hijo.id.map(|id| id.to_hex()).unwrap_or_default(),
            nombre: hijo.nombre,
            grado: hijo.grado,
        }
    }
}

/// Profile returned to clients (never exposes the password hash).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfilUsuario {
    pub id: String,
    pub nombre_completo: String,
    pub correo: String,
    pub rol: Rol,
    pub estado: EstadoUsuario,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grado_asignado: Option<String>,
    pub id_unico: String,
    pub fecha_registro: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ultimo_acceso: Option<DateTime<Utc>>,
}

impl From<User> for PerfilUsuario {
    fn from(user: User) -> Self {
        PerfilUsuario {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            nombre_completo: user.nombre_completo,
            correo: user.correo,
            rol: user.rol,
            estado: user.estado,
            grado_asignado: user.grado_asignado,
            id_unico: user.id_unico,
            fecha_registro: user.fecha_registro,
            ultimo_acceso: user.ultimo_acceso,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HijoInput {
    #[validate(length(min = 1, max = 100, message = "Nombre del hijo requerido"))]
    pub nombre: String,
    #[validate(length(min = 1, max = 30, message = "Grado del hijo requerido"))]
    pub grado: String,
}

/// Tutor self-registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Nombre completo requerido"))]
    pub nombre_completo: String,

    #[validate(email(message = "Correo electrónico inválido"))]
    pub correo: String,

    pub password: String,

    #[validate(nested)]
    pub hijos: Vec<HijoInput>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Correo electrónico inválido"))]
    pub correo: String,

    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Correo electrónico inválido"))]
    pub correo: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: PerfilUsuario,
}

/// Admin-initiated account creation (maestro or tutor).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Nombre completo requerido"))]
    pub nombre_completo: String,

    #[validate(email(message = "Correo electrónico inválido"))]
    pub correo: String,

    pub password: String,

    pub rol: Rol,

    /// Required when rol == maestro.
    pub grado_asignado: Option<String>,

    /// Required (non-empty) when rol == tutor.
    #[serde(default)]
    #[validate(nested)]
    pub hijos: Vec<HijoInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Nombre completo requerido"))]
    pub nombre_completo: Option<String>,

    #[validate(email(message = "Correo electrónico inválido"))]
    pub correo: Option<String>,

    pub grado_asignado: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub rol: Option<String>,
    pub estado: Option<String>,
    /// Search by nombreCompleto, correo or idUnico (case-insensitive).
    pub buscar: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Password policy for school accounts: at least 12 characters including an
/// uppercase letter, a digit and a symbol.
pub fn validar_password(password: &str) -> bool {
    password.len() >= 12
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_policy() {
        assert!(validar_password("Contrasena1!extra"));
        assert!(validar_password("Abcdefghijk1#"));

        // too short
        assert!(!validar_password("Abc1#"));
        // missing uppercase
        assert!(!validar_password("contrasena123!aa"));
        // missing digit
        assert!(!validar_password("Contrasena!!!aaa"));
        // missing symbol
        assert!(!validar_password("Contrasena12345"));
    }

    #[test]
    fn test_rol_wire_format() {
        assert_eq!(serde_json::to_string(&Rol::Maestro).unwrap(), "\"maestro\"");
        assert_eq!(serde_json::to_string(&Rol::Tutor).unwrap(), "\"tutor\"");
        let rol: Rol = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(rol, Rol::Admin);
    }

    #[test]
    fn test_estado_default_activo() {
        assert_eq!(EstadoUsuario::default(), EstadoUsuario::Activo);
        assert_eq!(EstadoUsuario::Inactivo.as_str(), "inactivo");
    }
}
