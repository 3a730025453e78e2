//! Admin bootstrap, login and the token check route.
//!
//! Only the first admin can register; it becomes the `superadmin` with every
//! permission. Later registrations are refused with `409`.

use axum::{extract::Extension, http::HeaderMap, response::Response, Json};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    password::{hash_password, verify_password},
    principal::require_admin,
    token::{issue, Claims, PrincipalKind},
    MIN_PASSWORD_LEN, ROLE_SUPERADMIN,
};
use crate::{
    api::{
        handlers::{require_fields, valid_email},
        response::{created, ok, ApiError, ErrorBody},
    },
    cli::globals::GlobalArgs,
};

const BOOTSTRAP_LOCK: &str = "admins:bootstrap";

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminRegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminPermissions {
    pub can_create_user: bool,
    pub can_delete_user: bool,
    pub can_update_settings: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminInfo {
    pub email: String,
    pub name: String,
    pub role: String,
    pub permissions: AdminPermissions,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminLoginResponse {
    pub token: String,
    pub user_data: AdminInfo,
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/register",
    request_body = AdminRegisterRequest,
    responses(
        (status = 201, description = "Superadmin created."),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 409, description = "An admin already exists.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    pool: Extension<PgPool>,
    Json(payload): Json<AdminRegisterRequest>,
) -> Result<Response, ApiError> {
    require_fields(&[
        ("name", payload.name.as_deref()),
        ("email", payload.email.as_deref()),
        ("password", payload.password.as_deref()),
    ])?;

    let name = payload.name.as_deref().unwrap_or_default().trim();
    let email = payload
        .email
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    let password = payload.password.as_deref().unwrap_or_default();

    if !valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_password(password)?;

    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(BOOTSTRAP_LOCK)
        .execute(&mut *tx)
        .await?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM admins)")
        .fetch_one(&mut *tx)
        .await?;
    if exists {
        return Err(ApiError::conflict("No need for new admins"));
    }

    let admin_id: Uuid = sqlx::query_scalar(
        r"
        INSERT INTO admins (name, email, password_hash, role,
                            can_create_user, can_delete_user, can_update_settings)
        VALUES ($1, $2, $3, $4, TRUE, TRUE, TRUE)
        RETURNING id
        ",
    )
    .bind(name)
    .bind(&email)
    .bind(&password_hash)
    .bind(ROLE_SUPERADMIN)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(%admin_id, "superadmin registered");

    Ok(created("Admin created successfully", serde_json::json!({})))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued.", body = AdminLoginResponse),
        (status = 400, description = "Missing fields.", body = ErrorBody),
        (status = 401, description = "Incorrect credentials.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (
        payload.email.as_deref().map(str::trim).filter(|e| !e.is_empty()),
        payload.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Incomplete data"));
    };
    let email = email.to_lowercase();

    let incorrect = || ApiError::Unauthorized("Incorrect credentials".to_string());

    let row = sqlx::query(
        r"
        SELECT id, name, email, password_hash, role, is_active,
               can_create_user, can_delete_user, can_update_settings
        FROM admins
        WHERE email = $1
        ",
    )
    .bind(&email)
    .fetch_optional(&*pool)
    .await?
    .ok_or_else(incorrect)?;

    let password_hash: String = row.try_get("password_hash")?;
    if !row.try_get::<bool, _>("is_active")? || !verify_password(password, &password_hash) {
        return Err(incorrect());
    }

    let admin_id: Uuid = row.try_get("id")?;
    let info = AdminInfo {
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        permissions: AdminPermissions {
            can_create_user: row.try_get("can_create_user")?,
            can_delete_user: row.try_get("can_delete_user")?,
            can_update_settings: row.try_get("can_update_settings")?,
        },
    };

    let claims = Claims::new(
        admin_id,
        &info.email,
        &info.name,
        PrincipalKind::Admin,
        globals.jwt_ttl_seconds,
    )
    .with_role(&info.role);
    let token = issue(&globals.jwt_secret, &claims)?;

    sqlx::query("UPDATE admins SET last_login = NOW() WHERE id = $1")
        .bind(admin_id)
        .execute(&*pool)
        .await?;

    Ok(ok(
        "Login successful",
        AdminLoginResponse {
            token,
            user_data: info,
        },
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/protected-route",
    responses(
        (status = 200, description = "Token belongs to an active superadmin."),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 403, description = "Not a superadmin.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn protected_route(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Result<Response, ApiError> {
    let admin = require_admin(&headers, &pool, &globals).await?;
    Ok(ok(
        "ok",
        serde_json::json!({ "email": admin.email, "role": admin.role }),
    ))
}
