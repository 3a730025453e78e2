//! At most one default variant per product.
//!
//! Every path that can turn `is_default` on goes through `claim_default`, which
//! locks the parent product row and clears the flag on the siblings. Holding
//! the row lock until commit serializes concurrent claims for the same product,
//! so the last committed claim wins and no reader ever sees two defaults. The
//! partial unique index `variants_single_default` backs this up in the schema.

use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{bound_lock_wait, CatalogError};

/// Locks `product_id` for the rest of the transaction.
///
/// # Errors
/// `NotFound` when the product does not exist; nothing is written in that case.
pub async fn lock_product(conn: &mut PgConnection, product_id: Uuid) -> Result<(), CatalogError> {
    bound_lock_wait(conn).await?;
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| CatalogError::not_found("Product not found"))
}

/// Locks the parent product and clears `is_default` on all of its variants
/// except `keep`. The caller then inserts or updates the target with
/// `is_default = true` in the same transaction.
///
/// Returns how many siblings lost the flag.
///
/// # Errors
/// `NotFound` when the product does not exist.
#[instrument(skip(conn))]
pub async fn claim_default(
    conn: &mut PgConnection,
    product_id: Uuid,
    keep: Option<Uuid>,
) -> Result<u64, CatalogError> {
    lock_product(conn, product_id).await?;

    let cleared = sqlx::query(
        r"
        UPDATE variants
        SET is_default = FALSE, updated_at = NOW()
        WHERE product_id = $1 AND is_default AND id IS DISTINCT FROM $2
        ",
    )
    .bind(product_id)
    .bind(keep)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    debug!(cleared, "cleared sibling defaults");
    Ok(cleared)
}

/// Makes `variant_id` the only default variant of `product_id`.
///
/// Clear and set commit together or not at all. Contention is not retried
/// here; a concurrent claim simply waits for the product row lock.
///
/// # Errors
/// `NotFound` when the product is missing or the variant does not belong to it.
#[instrument(skip(pool))]
pub async fn set_default(
    pool: &PgPool,
    product_id: Uuid,
    variant_id: Uuid,
) -> Result<(), CatalogError> {
    let mut tx = pool.begin().await?;

    claim_default(&mut tx, product_id, Some(variant_id)).await?;

    let updated = sqlx::query(
        r"
        UPDATE variants
        SET is_default = TRUE, updated_at = NOW()
        WHERE id = $1 AND product_id = $2
        ",
    )
    .bind(variant_id)
    .bind(product_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        // `tx` rolls back on drop, restoring the cleared siblings.
        return Err(CatalogError::not_found("Variant not found"));
    }

    tx.commit().await?;
    Ok(())
}
