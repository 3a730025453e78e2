//! Public product catalog. No token required; inactive products and variants
//! are hidden.

use axum::{
    extract::{Extension, Path},
    response::Response,
};
use sqlx::PgPool;
use tracing::instrument;

use super::{
    storage,
    types::{ProductDetail, StorefrontProduct},
};
use crate::api::{
    handlers::parse_id,
    response::{ok, ApiError, ErrorBody},
};

#[utoipa::path(
    get,
    path = "/api/v1/front/product",
    responses(
        (status = 200, description = "Active products by category name, then order.", body = [ProductDetail]),
    ),
    tag = "storefront"
)]
#[instrument(skip_all)]
pub async fn products(pool: Extension<PgPool>) -> Result<Response, ApiError> {
    let products = storage::storefront_products(&pool).await?;
    Ok(ok("Product list get successfully", products))
}

#[utoipa::path(
    get,
    path = "/api/v1/front/product/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Active product with its active variants.", body = StorefrontProduct),
        (status = 404, description = "Product not found.", body = ErrorBody),
    ),
    tag = "storefront"
)]
#[instrument(skip_all)]
pub async fn product(
    pool: Extension<PgPool>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let not_found = || ApiError::not_found("Product not found");

    let product = storage::find_product(&pool, id, true)
        .await?
        .ok_or_else(not_found)?;
    let variants = storage::product_variants(&pool, id, true)
        .await?
        .ok_or_else(not_found)?;

    Ok(ok(
        "Product get successfully",
        StorefrontProduct { product, variants },
    ))
}
