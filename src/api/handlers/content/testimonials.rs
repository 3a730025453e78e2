//! Customer testimonials, one global ordering like banners.

use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::HeaderMap,
    response::Response,
};
use sqlx::PgPool;
use tracing::{info, instrument};

use super::{
    status_filter,
    storage::{self, ContentFilter},
    types::{Testimonial, TestimonialFields, TestimonialForm},
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

const REQUIRED: &[&str] = &["name", "text", "color", "order", "status", "rating"];

fn testimonial_fields(form: &UploadForm) -> Result<TestimonialFields, ApiError> {
    let text = |name: &str| form.text(name).unwrap_or_default().to_string();
    Ok(TestimonialFields {
        name: text("name"),
        text: text("text"),
        rating: text("rating"),
        color: text("color"),
        order: RequestedOrder::parse(form.text("order").unwrap_or_default())?,
        status: form
            .flag("status")?
            .ok_or_else(|| ApiError::bad_request("Missing field status"))?,
        image: form.image("image").map(str::to_string),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/testimonial",
    request_body(content = TestimonialForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Testimonial created at the requested order.", body = Testimonial),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 503, description = "Testimonial ordering stayed contended.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "testimonials"
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

    let mut required = REQUIRED.to_vec();
    required.push("image");
    form.require(&required)?;
    let fields = testimonial_fields(&form)?;

    let pool = &*pool;
    let fields = &fields;
    let testimonial = retry_transient(move || storage::insert_testimonial(pool, fields)).await?;
    form.commit();

    info!(testimonial_id = %testimonial.id, order = testimonial.order, "testimonial created");
    Ok(ok("Testimonial created successfully", testimonial))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/testimonial/{id}",
    params(("id" = String, Path, description = "Testimonial id")),
    request_body(content = TestimonialForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Testimonial updated and moved to the requested order.", body = Testimonial),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 404, description = "Testimonial not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "testimonials"
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

    form.require(REQUIRED)?;
    let fields = testimonial_fields(&form)?;

    let pool = &*pool;
    let fields = &fields;
    let (testimonial, replaced) =
        retry_transient(move || storage::update_testimonial(pool, id, fields)).await?;
    form.commit();
    remove_images(&image_dir, replaced).await;

    info!(testimonial_id = %id, order = testimonial.order, "testimonial updated");
    Ok(ok("Testimonial updated successfully", testimonial))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/testimonial/{id}",
    params(("id" = String, Path, description = "Testimonial id")),
    responses(
        (status = 200, description = "Status flipped."),
        (status = 404, description = "Testimonial not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "testimonials"
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

    let status = storage::toggle_testimonial(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Testimonial not found"))?;

    info!(testimonial_id = %id, status, "testimonial status toggled");
    let message = if status {
        "Testimonial status changed to Active successfully"
    } else {
        "Testimonial status changed to Inactive successfully"
    };
    Ok(ok(message, serde_json::json!({})))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/testimonial/{id}",
    params(("id" = String, Path, description = "Testimonial id")),
    responses(
        (status = 200, description = "Testimonial.", body = Testimonial),
        (status = 404, description = "Testimonial not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "testimonials"
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

    let testimonial = storage::find_testimonial(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Testimonial not found"))?;
    Ok(ok("Testimonial get successfully", testimonial))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/testimonial",
    params(ListQuery),
    responses(
        (status = 200, description = "`{ count, totalPages, currentPage, testimonials }`, newest first."),
        (status = 400, description = "Invalid filter.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "testimonials"
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
    let filter = ContentFilter {
        from,
        to,
        keyword: query.keyword_pattern(),
        status: status_filter(&query)?,
    };
    let paging = query.paging();

    let (count, testimonials) = storage::list_testimonials(&pool, &filter, paging).await?;
    Ok(ok(
        "Get Testimonials successfully",
        paging.body(count, "testimonials", testimonials),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/front/testimonial",
    responses(
        (status = 200, description = "Active testimonials by order.", body = [Testimonial]),
    ),
    tag = "storefront"
)]
#[instrument(skip_all)]
pub async fn active(pool: Extension<PgPool>) -> Result<Response, ApiError> {
    let testimonials = storage::active_testimonials(&pool).await?;
    Ok(ok("Testimonials get successfully", testimonials))
}
