//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: read the bearer token, verify it, and for admins resolve the
//! account again so deactivation and role changes apply immediately.

use axum::http::HeaderMap;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::{
    token::{bearer_token, verify, PrincipalKind},
    ROLE_SUPERADMIN,
};
use crate::{api::response::ApiError, cli::globals::GlobalArgs};

/// Admin resolved from a bearer token and the current `admins` row.
#[derive(Clone, Debug)]
pub struct AdminPrincipal {
    pub admin_id: Uuid,
    pub email: String,
    pub role: String,
}

/// User resolved from a bearer token.
#[derive(Clone, Debug)]
pub struct UserPrincipal {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
}

fn no_token() -> ApiError {
    ApiError::Unauthorized("No token provided, authorization denied".to_string())
}

fn unknown_admin() -> ApiError {
    ApiError::Unauthorized("Admin not found, authorization denied".to_string())
}

/// Requires an active `superadmin`.
///
/// # Errors
/// `401` for a missing, invalid or expired token and for unknown or inactive
/// admins; `403` when the admin is not a superadmin.
pub async fn require_admin(
    headers: &HeaderMap,
    pool: &PgPool,
    globals: &GlobalArgs,
) -> Result<AdminPrincipal, ApiError> {
    let token = bearer_token(headers).ok_or_else(no_token)?;
    let claims = verify(&globals.jwt_secret, token)?;

    if claims.kind != PrincipalKind::Admin {
        return Err(unknown_admin());
    }

    let row = sqlx::query("SELECT email, role, is_active FROM admins WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(pool)
        .await?
        .ok_or_else(unknown_admin)?;

    if !row.try_get::<bool, _>("is_active")? {
        debug!(admin_id = %claims.sub, "inactive admin rejected");
        return Err(unknown_admin());
    }

    let role: String = row.try_get("role")?;
    if role != ROLE_SUPERADMIN {
        return Err(ApiError::Forbidden("Access denied, admin only".to_string()));
    }

    Ok(AdminPrincipal {
        admin_id: claims.sub,
        email: row.try_get("email")?,
        role,
    })
}

/// Requires a user token.
///
/// # Errors
/// `401` for a missing, invalid, expired or admin token.
pub fn require_user(headers: &HeaderMap, globals: &GlobalArgs) -> Result<UserPrincipal, ApiError> {
    let token = bearer_token(headers).ok_or_else(no_token)?;
    let claims = verify(&globals.jwt_secret, token)?;

    if claims.kind != PrincipalKind::User {
        return Err(ApiError::Unauthorized(
            "User token required, authorization denied".to_string(),
        ));
    }

    Ok(UserPrincipal {
        user_id: claims.sub,
        email: claims.email,
        name: claims.name,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::token::{issue, Claims};
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use secrecy::SecretString;
    use std::path::PathBuf;

    fn globals() -> GlobalArgs {
        GlobalArgs::new(
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            PathBuf::from("uploads"),
        )
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn user_token_resolves() {
        let globals = globals();
        let id = Uuid::new_v4();
        let claims = Claims::new(id, "u@example.com", "Una", PrincipalKind::User, 60);
        let token = issue(&globals.jwt_secret, &claims).unwrap();

        let principal = require_user(&headers_with(&token), &globals).unwrap();
        assert_eq!(principal.user_id, id);
        assert_eq!(principal.name, "Una");
    }

    #[test]
    fn admin_token_is_not_a_user_token() {
        let globals = globals();
        let claims = Claims::new(Uuid::new_v4(), "a@example.com", "A", PrincipalKind::Admin, 60);
        let token = issue(&globals.jwt_secret, &claims).unwrap();

        assert!(matches!(
            require_user(&headers_with(&token), &globals),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn missing_token_is_unauthorized() {
        assert!(matches!(
            require_user(&HeaderMap::new(), &globals()),
            Err(ApiError::Unauthorized(message)) if message.starts_with("No token")
        ));
    }
}
