use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication.
/// Permission checks happen via `require_permission()` in the handler body.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Returns `Ok(())` if the user has the given permission, `Err(PermissionDenied)` otherwise.
    pub fn require_permission(&self, permission: &str) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }
}

/// Optional authentication for public endpoints that show more to
/// logged-in users or staff. A malformed token is still an error.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.0.as_ref().is_some_and(|u| u.has_permission(permission))
    }

    pub fn user_id(&self) -> Option<i32> {
        self.0.as_ref().map(|u| u.user_id)
    }
}

fn decode_bearer(parts: &Parts, secret: &str) -> Result<Option<AuthUser>, AppError> {
    let Some(auth_header) = parts.headers.get("Authorization") else {
        return Ok(None);
    };
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::TokenInvalid)?;

    let claims = jwt::verify(token, secret).map_err(|_| AppError::TokenInvalid)?;

    Ok(Some(AuthUser {
        user_id: claims.uid,
        username: claims.sub,
        role: claims.role,
        permissions: claims.permissions,
    }))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        decode_bearer(parts, &state.config.auth.jwt_secret)?.ok_or(AppError::TokenMissing)
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(decode_bearer(
            parts,
            &state.config.auth.jwt_secret,
        )?))
    }
}
