use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::user;
use crate::error::AppError;

/// Username and password, used for both registration and login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct Credentials {
    /// 1-32 characters, letters, digits and underscores.
    #[schema(example = "pekka_demo")]
    pub username: String,
    /// 8-128 characters.
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

const USERNAME_MAX: usize = 32;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=128;

/// Rules for a new account.
pub fn validate_new_account(creds: &Credentials) -> Result<(), AppError> {
    let username = creds.username.trim();
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX {
        return Err(AppError::Validation(format!(
            "Username must be 1-{USERNAME_MAX} characters"
        )));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(AppError::Validation(format!(
            "Username may not contain '{bad}'"
        )));
    }
    if !PASSWORD_LEN.contains(&creds.password.len()) {
        return Err(AppError::Validation(format!(
            "Password must be {}-{} characters",
            PASSWORD_LEN.start(),
            PASSWORD_LEN.end()
        )));
    }
    Ok(())
}

/// Login only needs both fields present; wrong values are a credentials error.
pub fn validate_login(creds: &Credentials) -> Result<(), AppError> {
    if creds.username.trim().is_empty() || creds.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".into(),
        ));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "pekka_demo")]
    pub username: String,
}

impl From<user::Model> for RegisterResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
        }
    }
}

/// Who the token holder is and what they may manage.
#[derive(Serialize, utoipa::ToSchema)]
pub struct Profile {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "pekka_demo")]
    pub username: String,
    #[schema(example = "staff")]
    pub role: String,
    #[schema(example = json!(["compo:manage", "entry:manage"]))]
    pub permissions: Vec<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// Bearer token, valid for `auth.token_ttl_hours`.
    pub token: String,
    #[serde(flatten)]
    pub profile: Profile,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SetUserRoleRequest {
    /// One of the seeded roles: `admin`, `staff` or `user`.
    #[schema(example = "staff")]
    pub role: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            role: u.role,
            created_at: u.created_at,
        }
    }
}
