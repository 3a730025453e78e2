//! Admin product endpoints. Products are ordered per category: create and
//! update both place the product at the requested order, shifting siblings.

use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, instrument};
use utoipa::IntoParams;
use uuid::Uuid;

use super::{
    parse_status,
    storage::{self, ProductFilter},
    types::{NextOrder, Product, ProductDetail, ProductFields, ProductForm},
};
use crate::{
    api::{
        handlers::{auth::principal::require_admin, parse_id, ListQuery},
        response::{ok, ApiError, ErrorBody},
        uploads::{remove_images, UploadForm},
    },
    catalog::{ordering::RequestedOrder, retry_transient},
    cli::globals::GlobalArgs,
};

/// Fields every product form carries, create or update.
const SHARED_FIELDS: &[&str] = &[
    "title",
    "order",
    "description",
    "specification",
    "uses",
    "actualPrice",
    "discountedPrice",
    "taxPercent",
    "totalTax",
    "basePrice",
    "minQuantity",
    "maxQuantity",
    "currentAvailableQuantity",
    "tags",
    "metaDescription",
    "metaTitle",
];

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderQuery {
    /// Category id.
    pub category: Option<String>,
}

fn non_negative<T: PartialOrd + Default>(form: &UploadForm, name: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
{
    let value: T = form.parse(name)?;
    if value < T::default() {
        return Err(ApiError::bad_request(format!("{name} must not be negative")));
    }
    Ok(value)
}

fn product_fields(form: &UploadForm) -> Result<ProductFields, ApiError> {
    let text = |name: &str| form.text(name).unwrap_or_default().to_string();

    let fields = ProductFields {
        title: text("title"),
        order: RequestedOrder::parse(form.text("order").unwrap_or_default())?,
        description: text("description"),
        specification: text("specification"),
        uses: form.list("uses"),
        actual_price: non_negative(form, "actualPrice")?,
        discounted_price: non_negative(form, "discountedPrice")?,
        tax_percent: non_negative(form, "taxPercent")?,
        total_tax: non_negative(form, "totalTax")?,
        base_price: non_negative(form, "basePrice")?,
        min_quantity: non_negative(form, "minQuantity")?,
        max_quantity: non_negative(form, "maxQuantity")?,
        current_available_quantity: non_negative(form, "currentAvailableQuantity")?,
        tags: form.list("tags"),
        meta_description: text("metaDescription"),
        meta_title: text("metaTitle"),
        thumbnail1: form.image("thumbnail1").map(str::to_string),
        thumbnail2: form.image("thumbnail2").map(str::to_string),
    };

    if fields.min_quantity > fields.max_quantity {
        return Err(ApiError::bad_request(
            "minQuantity must not exceed maxQuantity",
        ));
    }
    Ok(fields)
}

fn parse_category(raw: Option<&str>) -> Result<Uuid, ApiError> {
    raw.and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| ApiError::bad_request("Invalid category id"))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/product",
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Product saved at the requested order.", body = Product),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 404, description = "Category not found.", body = ErrorBody),
        (status = 503, description = "Category ordering stayed contended.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "products"
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

    let mut required = SHARED_FIELDS.to_vec();
    required.extend(["status", "category", "thumbnail1"]);
    form.require(&required)?;

    let fields = product_fields(&form)?;
    let category_id = parse_category(form.text("category"))?;
    let status = parse_status(form.text("status").unwrap_or_default())
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    let pool = &*pool;
    let fields = &fields;
    let product = retry_transient(move || {
        storage::insert_product(pool, category_id, status, fields)
    })
    .await?;
    form.commit();

    info!(product_id = %product.id, %category_id, order = product.order, "product created");
    Ok(ok("Product saved successfully", product))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/product/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Product updated and moved to the requested order.", body = Product),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 404, description = "Product not found.", body = ErrorBody),
        (status = 503, description = "Category ordering stayed contended.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "products"
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

    form.require(SHARED_FIELDS)?;
    let fields = product_fields(&form)?;

    let pool = &*pool;
    let fields = &fields;
    let (product, replaced) =
        retry_transient(move || storage::update_product(pool, id, fields)).await?;
    form.commit();
    remove_images(&image_dir, &replaced).await;

    info!(product_id = %id, order = product.order, "product updated");
    Ok(ok("Product updated successfully", product))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/product/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Status toggled between ACTIVE and INACTIVE.", body = Product),
        (status = 404, description = "Product not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn toggle(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let id = parse_id(&id)?;

    let product = storage::toggle_product(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    info!(product_id = %id, status = %product.status, "product status toggled");
    Ok(ok("Product status updated successfully", product))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/product/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with its category name and colour.", body = ProductDetail),
        (status = 404, description = "Product not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn get(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let id = parse_id(&id)?;

    let product = storage::find_product(&pool, id, false)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(ok("Product get successfully", product))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/products",
    params(ListQuery),
    responses(
        (status = 200, description = "`{ count, totalPages, currentPage, products }`, newest first."),
        (status = 400, description = "Invalid date filter.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;

    let (from, to) = query.date_bounds()?;
    let filter = ProductFilter {
        from,
        to,
        keyword: query.keyword_pattern(),
        category_name: query
            .category_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
    };
    let paging = query.paging();

    let (count, products) = storage::list_products(&pool, &filter, paging).await?;
    Ok(ok(
        "Product list fetched successfully",
        paging.body(count, "products", products),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/product-order",
    params(OrderQuery),
    responses(
        (status = 200, description = "Next free order in the category.", body = NextOrder),
        (status = 400, description = "Missing or invalid category id.", body = ErrorBody),
        (status = 404, description = "Category not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn next_order(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Query(query): Query<OrderQuery>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let category_id = parse_category(query.category.as_deref())?;

    let order = storage::next_product_order(&pool, category_id).await?;
    Ok(ok("Product order get successfully", NextOrder { order }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: &[(&str, &str)] = &[
        ("title", "Cast iron pan"),
        ("order", "2"),
        ("status", "ACTIVE"),
        ("description", "Heavy"),
        ("specification", "26 cm"),
        ("uses", "frying, baking"),
        ("actualPrice", "40"),
        ("discountedPrice", "35.5"),
        ("taxPercent", "18"),
        ("totalTax", "6.39"),
        ("basePrice", "29.11"),
        ("minQuantity", "1"),
        ("maxQuantity", "5"),
        ("currentAvailableQuantity", "12"),
        ("tags[]", "kitchen"),
        ("tags[]", "iron"),
        ("metaDescription", "A pan"),
        ("metaTitle", "Pan"),
    ];

    fn with(overrides: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        COMPLETE
            .iter()
            .filter(|(name, _)| !overrides.iter().any(|(o, _)| o == name))
            .chain(overrides.iter())
            .copied()
            .collect()
    }

    #[test]
    fn parses_complete_form() {
        let form = UploadForm::from_pairs(COMPLETE, &[("thumbnail1", "thumbnail1-1-2.png")]);
        let Ok(fields) = product_fields(&form) else {
            panic!("complete form should parse");
        };
        assert_eq!(fields.order.get(), 2);
        assert_eq!(fields.uses, vec!["frying", "baking"]);
        assert_eq!(fields.tags, vec!["kitchen", "iron"]);
        assert!((fields.discounted_price - 35.5).abs() < f64::EPSILON);
        assert_eq!(fields.thumbnail1.as_deref(), Some("thumbnail1-1-2.png"));
        assert_eq!(fields.thumbnail2, None);
    }

    #[test]
    fn shared_fields_accept_bracketed_lists() {
        let form = UploadForm::from_pairs(COMPLETE, &[]);
        assert!(form.require(SHARED_FIELDS).is_ok());
    }

    #[test]
    fn create_requires_thumbnail_and_category() {
        let form = UploadForm::from_pairs(COMPLETE, &[]);
        let mut required = SHARED_FIELDS.to_vec();
        required.extend(["status", "category", "thumbnail1"]);
        match form.require(&required) {
            Err(ApiError::BadRequest(message)) => assert_eq!(
                message,
                "Invalid or incomplete data: Missing fields category, thumbnail1"
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_order() {
        for order in ["0", "-1", "1.5", "first"] {
            let form = UploadForm::from_pairs(&with(&[("order", order)]), &[]);
            assert!(
                matches!(product_fields(&form), Err(ApiError::BadRequest(_))),
                "order {order} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_negative_and_inverted_quantities() {
        let form = UploadForm::from_pairs(&with(&[("actualPrice", "-3")]), &[]);
        assert!(matches!(product_fields(&form), Err(ApiError::BadRequest(_))));

        let form = UploadForm::from_pairs(&with(&[("minQuantity", "9")]), &[]);
        match product_fields(&form) {
            Err(ApiError::BadRequest(message)) => {
                assert_eq!(message, "minQuantity must not exceed maxQuantity");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn category_id_must_be_uuid() {
        assert!(parse_category(None).is_err());
        assert!(parse_category(Some("kitchen")).is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_category(Some(&id.to_string())).ok(), Some(id));
    }
}
