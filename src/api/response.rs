//! JSON envelope shared by every endpoint.
//!
//! Successes render as `{ "success": true, "message": ..., "data": ... }` and
//! failures as `{ "success": false, "error": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::catalog::CatalogError;

#[derive(Debug, Serialize, ToSchema)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// `200 OK` with the success envelope.
pub fn ok<T: Serialize>(message: &str, data: T) -> Response {
    respond(StatusCode::OK, message, data)
}

/// `201 Created` with the success envelope.
pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    respond(StatusCode::CREATED, message, data)
}

fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    let body = Envelope {
        success: true,
        message: message.to_string(),
        data,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Logs `detail` and hides it from the client.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!("Internal error: {detail}");
        Self::Internal("Internal server error".to_string())
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Unavailable(msg)
            | Self::Internal(msg) => msg,
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Invalid(msg) => Self::BadRequest(msg),
            CatalogError::NotFound(msg) => Self::NotFound(msg),
            CatalogError::Conflict(msg) => Self::Conflict(msg),
            CatalogError::Transient(source) => {
                error!("Catalog write still contended after retries: {source}");
                Self::Unavailable("Resource busy, please retry".to_string())
            }
            CatalogError::Database(source) => Self::internal(source),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }

    #[tokio::test]
    async fn success_envelope() {
        let response = created("Banner created successfully", serde_json::json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Banner created successfully");
        assert_eq!(body["data"]["id"], 1);
    }

    #[tokio::test]
    async fn error_envelope() {
        let response = ApiError::conflict("SKU already exists").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "SKU already exists");
    }

    #[test]
    fn catalog_errors_map_to_status() {
        let cases = [
            (CatalogError::invalid("bad"), StatusCode::BAD_REQUEST),
            (CatalogError::not_found("gone"), StatusCode::NOT_FOUND),
            (CatalogError::conflict("dup"), StatusCode::CONFLICT),
            (
                CatalogError::Transient(sqlx::Error::PoolTimedOut),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CatalogError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn database_detail_is_hidden() {
        let response = ApiError::from(sqlx::Error::PoolClosed).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
    }
}
