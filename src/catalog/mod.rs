//! Catalog invariants shared by the banner, testimonial, product and variant
//! endpoints.
//!
//! Two rules live here and nowhere else:
//!
//! - **Dense ordering** (`ordering`): inside a partition (all banners, all
//!   testimonials, the products of one category) the `sort_order` values are
//!   always exactly `1..=N`. Placing or moving an entity shifts its siblings in
//!   the same transaction, under a partition-scoped advisory lock.
//! - **Single default** (`defaults`): a product has at most one variant with
//!   `is_default`. Clearing the siblings and setting the target happen in one
//!   transaction, serialized on the parent product row.
//!
//! Both operate on an explicit `&mut PgConnection` borrowed from a caller-owned
//! `sqlx::Transaction`, so the caller decides what else commits atomically with
//! them (the entity insert, an image reference swap, ...). Dropping the
//! transaction without `commit` rolls everything back.

pub mod defaults;
pub mod error;
pub mod ordering;

pub use error::CatalogError;

use sqlx::PgConnection;
use std::{future::Future, time::Duration};
use tracing::warn;

/// Attempts made by `retry_transient` before contention is surfaced to the caller.
pub const MAX_ATTEMPTS: u32 = 3;

const RETRY_BACKOFF_MS: u64 = 25;

/// Upper bound for any lock wait inside a catalog transaction.
const LOCK_TIMEOUT: &str = "SET LOCAL lock_timeout = '5s'";

/// Bounds lock waits for the rest of the current transaction. A wait that hits
/// the bound fails with `55P03`, which classifies as `Transient`.
pub(crate) async fn bound_lock_wait(conn: &mut PgConnection) -> Result<(), CatalogError> {
    sqlx::query(LOCK_TIMEOUT).execute(&mut *conn).await?;
    Ok(())
}

/// Runs `op` until it succeeds, fails with a non-transient error, or
/// `MAX_ATTEMPTS` is reached. `op` must open and commit its own transaction so
/// every attempt starts from a clean snapshot.
///
/// # Errors
/// Returns the last error produced by `op`.
pub async fn retry_transient<T, F, Fut>(mut op: F) -> Result<T, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, error = %err, "catalog write contended, retrying");
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)))
                    .await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn contention() -> CatalogError {
        CatalogError::Transient(sqlx::Error::PoolTimedOut)
    }

    #[tokio::test]
    async fn retry_stops_after_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_transient(move || async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < 2 {
                Err(contention())
            } else {
                Ok(call)
            }
        })
        .await;
        assert_eq!(result.ok(), Some(2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_transient(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(contention())
        })
        .await;
        assert!(matches!(result, Err(CatalogError::Transient(_))));
        assert_eq!(counter.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn retry_never_repeats_client_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_transient(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CatalogError::invalid("bad order"))
        })
        .await;
        assert!(matches!(result, Err(CatalogError::Invalid(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
