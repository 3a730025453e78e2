//! End-user registration and login.

use axum::{extract::Extension, response::Response, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    auth::{
        password::{hash_password, verify_password},
        token::{issue, Claims, PrincipalKind},
        MIN_PASSWORD_LEN,
    },
    require_fields, valid_email, valid_phone,
};
use crate::{
    api::response::{created, ok, ApiError, ErrorBody},
    cli::globals::GlobalArgs,
};

const GENDERS: &[&str] = &["MALE", "FEMALE", "OTHER"];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    /// `YYYY-MM-DD`
    pub dob: Option<String>,
    /// `MALE`, `FEMALE` or `OTHER`
    pub gender: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserLoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address1: Option<String>,
    pub address2: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub pincode: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserLoginResponse {
    pub data: UserProfile,
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/user/register",
    request_body = UserRegisterRequest,
    responses(
        (status = 201, description = "Account created."),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 409, description = "Email already exists.", body = ErrorBody),
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn register(
    pool: Extension<PgPool>,
    Json(payload): Json<UserRegisterRequest>,
) -> Result<Response, ApiError> {
    require_fields(&[
        ("name", payload.name.as_deref()),
        ("email", payload.email.as_deref()),
        ("phoneNumber", payload.phone_number.as_deref()),
        ("password", payload.password.as_deref()),
        ("dob", payload.dob.as_deref()),
        ("gender", payload.gender.as_deref()),
        ("address1", payload.address1.as_deref()),
        ("address2", payload.address2.as_deref()),
        ("country", payload.country.as_deref()),
        ("state", payload.state.as_deref()),
        ("city", payload.city.as_deref()),
        ("pincode", payload.pincode.as_deref()),
    ])?;

    let field = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();

    let email = field(&payload.email).to_lowercase();
    let phone = field(&payload.phone_number);
    let password = payload.password.as_deref().unwrap_or_default();

    if !valid_phone(&phone) {
        return Err(ApiError::bad_request("Invalid phone number"));
    }
    if !valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let dob = NaiveDate::parse_from_str(&field(&payload.dob), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid dob, expected YYYY-MM-DD"))?;
    let gender = field(&payload.gender).to_uppercase();
    if !GENDERS.contains(&gender.as_str()) {
        return Err(ApiError::bad_request("Invalid gender"));
    }

    let password_hash = hash_password(password)?;

    let user_id: Uuid = sqlx::query_scalar(
        r"
        INSERT INTO users (name, email, phone_number, dob, gender, address1, address2,
                           country, state, city, pincode, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        ",
    )
    .bind(field(&payload.name))
    .bind(&email)
    .bind(&phone)
    .bind(dob)
    .bind(&gender)
    .bind(field(&payload.address1))
    .bind(field(&payload.address2))
    .bind(field(&payload.country))
    .bind(field(&payload.state))
    .bind(field(&payload.city))
    .bind(field(&payload.pincode))
    .bind(&password_hash)
    .fetch_one(&*pool)
    .await?;

    info!(%user_id, "user registered");
    Ok(created("Account created successfully", serde_json::json!({})))
}

#[utoipa::path(
    post,
    path = "/api/v1/user/login",
    request_body = UserLoginRequest,
    responses(
        (status = 200, description = "Token issued.", body = UserLoginResponse),
        (status = 400, description = "Missing fields.", body = ErrorBody),
        (status = 401, description = "Incorrect credentials.", body = ErrorBody),
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn login(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Json(payload): Json<UserLoginRequest>,
) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (
        payload.email.as_deref().map(str::trim).filter(|e| !e.is_empty()),
        payload.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Incomplete data"));
    };
    let email = email.to_lowercase();

    let incorrect = || ApiError::Unauthorized("Incorrect credentials".to_string());

    let found: Option<(String, bool)> =
        sqlx::query_as("SELECT password_hash, is_active FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&*pool)
            .await?;
    let (password_hash, is_active) = found.ok_or_else(incorrect)?;
    if !is_active || !verify_password(password, &password_hash) {
        return Err(incorrect());
    }

    let profile: UserProfile = sqlx::query_as(
        r"
        UPDATE users SET last_login = NOW()
        WHERE email = $1
        RETURNING id AS user_id, name, email, phone_number, dob, gender, address1, address2,
                  country, state, city, pincode
        ",
    )
    .bind(&email)
    .fetch_one(&*pool)
    .await?;

    let claims = Claims::new(
        profile.user_id,
        &profile.email,
        &profile.name,
        PrincipalKind::User,
        globals.jwt_ttl_seconds,
    );
    let token = issue(&globals.jwt_secret, &claims)?;

    Ok(ok(
        "Logged in successfully",
        UserLoginResponse {
            data: profile,
            token,
        },
    ))
}
