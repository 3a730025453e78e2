//! HS256 bearer tokens.
//!
//! Claims: `sub` (principal id), `email`, `name`, `role` (admins only),
//! `kind` (`admin` or `user`), `iat` and `exp` as Unix seconds.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::response::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub kind: PrincipalKind,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    #[must_use]
    pub fn new(sub: Uuid, email: &str, name: &str, kind: PrincipalKind, ttl_seconds: u64) -> Self {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        Self {
            sub,
            email: email.to_string(),
            name: name.to_string(),
            role: None,
            kind,
            iat: now,
            exp: now.saturating_add(ttl_seconds),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }
}

/// Signs `claims` with the shared HMAC secret.
///
/// # Errors
/// `Internal` if encoding fails.
pub fn issue(secret: &SecretString, claims: &Claims) -> Result<String, ApiError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|err| ApiError::internal(format!("failed to sign token: {err}")))
}

/// Verifies signature and expiry.
///
/// # Errors
/// `Unauthorized` for any invalid, tampered or expired token.
pub fn verify(secret: &SecretString, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid session or session expired".to_string()))
}

/// Extracts the token from `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn secret() -> SecretString {
        SecretString::from("0123456789abcdef0123456789abcdef".to_string())
    }

    #[test]
    fn issue_then_verify() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, "ada@example.com", "Ada", PrincipalKind::Admin, 3600)
            .with_role("superadmin");
        let token = issue(&secret(), &claims).unwrap();

        let verified = verify(&secret(), &token).unwrap();
        assert_eq!(verified.sub, id);
        assert_eq!(verified.kind, PrincipalKind::Admin);
        assert_eq!(verified.role.as_deref(), Some("superadmin"));
        assert_eq!(verified.exp - verified.iat, 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims::new(Uuid::new_v4(), "u@example.com", "U", PrincipalKind::User, 3600);
        let token = issue(&secret(), &claims).unwrap();
        let other = SecretString::from("ffffffffffffffffffffffffffffffff".to_string());
        assert!(matches!(verify(&other, &token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), "u@example.com", "U", PrincipalKind::User, 0);
        claims.iat -= 7200;
        claims.exp -= 3600;
        let token = issue(&secret(), &claims).unwrap();
        assert!(verify(&secret(), &token).is_err());
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
