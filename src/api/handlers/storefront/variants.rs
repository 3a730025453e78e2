//! Admin variant endpoints. A product has at most one default variant; every
//! write that sets `isDefault` clears it on the siblings in the same
//! transaction.

use axum::{
    extract::{Extension, Multipart, Path},
    http::HeaderMap,
    response::Response,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    storage,
    types::{Attribute, Variant, VariantFields, VariantForm},
};
use crate::{
    api::{
        handlers::{auth::principal::require_admin, parse_id},
        response::{created, ok, ApiError, ErrorBody},
        uploads::{remove_images, UploadForm},
    },
    catalog::defaults::set_default,
    cli::globals::GlobalArgs,
};

#[derive(Debug, Default, Deserialize)]
struct Dimensions {
    length: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefaultVariant {
    pub product_id: Uuid,
    pub variant_id: Uuid,
}

fn variant_fields(form: &UploadForm) -> Result<VariantFields, ApiError> {
    let attributes = form
        .text("attributes")
        .map(|raw| {
            serde_json::from_str::<Vec<Attribute>>(raw).map_err(|_| {
                ApiError::bad_request("attributes must be a JSON array of {key, value}")
            })
        })
        .transpose()?;

    let dimensions = form
        .text("dimensions")
        .map(|raw| {
            serde_json::from_str::<Dimensions>(raw)
                .map_err(|_| ApiError::bad_request("Invalid value for dimensions"))
        })
        .transpose()?
        .unwrap_or_default();

    let quantity: Option<i32> = form.parse_opt("quantity")?;
    if quantity.is_some_and(|q| q < 0) {
        return Err(ApiError::bad_request("quantity must not be negative"));
    }

    let images = form.images("image");

    Ok(VariantFields {
        sku: form.text("sku").map(str::to_string),
        price: form.parse_opt("price")?,
        quantity,
        attributes,
        weight: form.parse_opt("weight")?,
        length: form.parse_opt("length")?.or(dimensions.length),
        width: form.parse_opt("width")?.or(dimensions.width),
        height: form.parse_opt("height")?.or(dimensions.height),
        status: form.flag("status")?,
        discounted_price: form.parse_opt("discountedPrice")?,
        is_default: form.flag("isDefault")?,
        image_thumbnail: form.image("imageThumbnail").map(str::to_string),
        images: (!images.is_empty()).then(|| images.to_vec()),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/variant",
    request_body(content = VariantForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Variant added; with isDefault the siblings lose the flag.", body = Variant),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 404, description = "Product not found.", body = ErrorBody),
        (status = 409, description = "SKU already exists.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "variants"
)]
#[instrument(skip_all)]
pub async fn create(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let mut form = UploadForm::from_multipart(multipart, &globals.image_dir()).await?;

    form.require(&["productId", "sku", "price", "quantity"])?;
    let product_id = Uuid::parse_str(form.text("productId").unwrap_or_default())
        .map_err(|_| ApiError::bad_request("Invalid productId"))?;
    let fields = variant_fields(&form)?;

    let variant = storage::insert_variant(&pool, product_id, &fields).await?;
    form.commit();

    info!(variant_id = %variant.id, %product_id, is_default = variant.is_default, "variant added");
    Ok(created("Variant added successfully", variant))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/variant/{id}",
    params(("id" = String, Path, description = "Variant id")),
    request_body(content = VariantForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Variant updated.", body = Variant),
        (status = 400, description = "Invalid fields.", body = ErrorBody),
        (status = 404, description = "Variant not found.", body = ErrorBody),
        (status = 409, description = "SKU already exists.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "variants"
)]
#[instrument(skip_all)]
pub async fn update(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let id = parse_id(&id)?;
    let image_dir = globals.image_dir();
    let mut form = UploadForm::from_multipart(multipart, &image_dir).await?;

    let fields = variant_fields(&form)?;
    let (variant, replaced) = storage::update_variant(&pool, id, &fields).await?;
    form.commit();
    remove_images(&image_dir, &replaced).await;

    info!(variant_id = %id, is_default = variant.is_default, "variant updated");
    Ok(ok("Variant updated successfully", variant))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/variant/{id}/default",
    params(("id" = String, Path, description = "Variant id")),
    responses(
        (status = 200, description = "The variant is now the only default of its product.", body = DefaultVariant),
        (status = 404, description = "Variant not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "variants"
)]
#[instrument(skip_all)]
pub async fn make_default(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let variant_id = parse_id(&id)?;

    let product_id = storage::variant_product(&pool, variant_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Variant not found"))?;
    set_default(&pool, product_id, variant_id).await?;

    info!(%variant_id, %product_id, "default variant set");
    Ok(ok(
        "Default variant updated successfully",
        DefaultVariant {
            product_id,
            variant_id,
        },
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/product/{id}/variants",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Variants of the product, default first.", body = [Variant]),
        (status = 404, description = "Product not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "variants"
)]
#[instrument(skip_all)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let product_id = parse_id(&id)?;

    let variants = storage::product_variants(&pool, product_id, false)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(ok("Variants get successfully", variants))
}
