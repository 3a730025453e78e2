//! Failure taxonomy for catalog writes.
//!
//! Storage errors are classified by SQLSTATE and constraint name so callers can
//! tell contention (retry) apart from invariant violations (report).

use thiserror::Error;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Constraints that only trip when a concurrent writer committed first.
const CONTENDED_CONSTRAINTS: &[&str] = &[
    "banners_sort_order_key",
    "testimonials_sort_order_key",
    "products_sort_order_key",
    "variants_single_default",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed or missing input. Never retried.
    #[error("{0}")]
    Invalid(String),
    /// A referenced parent or entity is absent.
    #[error("{0}")]
    NotFound(String),
    /// The write would break a uniqueness rule (name, email, SKU).
    #[error("{0}")]
    Conflict(String),
    /// Lock timeout, serialization failure or a lost race on an ordering constraint.
    #[error("storage contention, try again")]
    Transient(#[source] sqlx::Error),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl CatalogError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        let (code, constraint) = match err.as_database_error() {
            Some(db) => (
                db.code().map(|code| code.into_owned()),
                db.constraint().map(str::to_string),
            ),
            None => return Self::Database(err),
        };

        match code.as_deref() {
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE) => {
                Self::Transient(err)
            }
            Some(UNIQUE_VIOLATION) => match constraint.as_deref() {
                Some(name) if CONTENDED_CONSTRAINTS.contains(&name) => Self::Transient(err),
                other => Self::Conflict(conflict_message(other).to_string()),
            },
            Some(FOREIGN_KEY_VIOLATION) => Self::NotFound("Referenced resource not found".into()),
            Some(CHECK_VIOLATION) => Self::Invalid("Value out of the accepted range".into()),
            _ => Self::Database(err),
        }
    }
}

fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("variants_sku_key") => "SKU already exists",
        Some("admins_email_key" | "users_email_key") => "Email already exists",
        Some("categories_slug_key" | "products_slug_key") => "Slug already exists",
        _ => "Resource already exists",
    }
}
