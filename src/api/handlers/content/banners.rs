//! Home page banners. All banners share one ordering.

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
    types::{Banner, BannerFields, BannerForm},
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

const REQUIRED: &[&str] = &[
    "bannerName",
    "bannerBtnText",
    "bannerBtnLink",
    "order",
    "status",
    "bannerDescription",
];

fn banner_fields(form: &UploadForm) -> Result<BannerFields, ApiError> {
    let text = |name: &str| form.text(name).unwrap_or_default().to_string();
    Ok(BannerFields {
        banner_name: text("bannerName"),
        banner_btn_text: text("bannerBtnText"),
        banner_btn_link: text("bannerBtnLink"),
        banner_description: text("bannerDescription"),
        order: RequestedOrder::parse(form.text("order").unwrap_or_default())?,
        status: form
            .flag("status")?
            .ok_or_else(|| ApiError::bad_request("Missing field status"))?,
        banner_image: form.image("bannerImage").map(str::to_string),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/banner",
    request_body(content = BannerForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Banner created at the requested order.", body = Banner),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 503, description = "Banner ordering stayed contended.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "banners"
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
    required.push("bannerImage");
    form.require(&required)?;
    let fields = banner_fields(&form)?;

    let pool = &*pool;
    let fields = &fields;
    let banner = retry_transient(move || storage::insert_banner(pool, fields)).await?;
    form.commit();

    info!(banner_id = %banner.id, order = banner.order, "banner created");
    Ok(ok("Banner created successfully", banner))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/banner/{id}",
    params(("id" = String, Path, description = "Banner id")),
    request_body(content = BannerForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Banner updated and moved to the requested order.", body = Banner),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 404, description = "Banner not found.", body = ErrorBody),
        (status = 503, description = "Banner ordering stayed contended.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "banners"
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
    let fields = banner_fields(&form)?;

    let pool = &*pool;
    let fields = &fields;
    let (banner, replaced) =
        retry_transient(move || storage::update_banner(pool, id, fields)).await?;
    form.commit();
    remove_images(&image_dir, replaced).await;

    info!(banner_id = %id, order = banner.order, "banner updated");
    Ok(ok("Banner updated successfully", banner))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/banner/{id}",
    params(("id" = String, Path, description = "Banner id")),
    responses(
        (status = 200, description = "Status flipped."),
        (status = 404, description = "Banner not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "banners"
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

    let status = storage::toggle_banner(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Banner not found"))?;

    info!(banner_id = %id, status, "banner status toggled");
    let message = if status {
        "Banner status changed to Active successfully"
    } else {
        "Banner status changed to Inactive successfully"
    };
    Ok(ok(message, serde_json::json!({})))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/banner/{id}",
    params(("id" = String, Path, description = "Banner id")),
    responses(
        (status = 200, description = "Banner.", body = Banner),
        (status = 404, description = "Banner not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "banners"
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

    let banner = storage::find_banner(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Banner not found"))?;
    Ok(ok("Banner get successfully", banner))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/banner",
    params(ListQuery),
    responses(
        (status = 200, description = "`{ count, totalPages, currentPage, banners }`, newest first."),
        (status = 400, description = "Invalid filter.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "banners"
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

    let (count, banners) = storage::list_banners(&pool, &filter, paging).await?;
    Ok(ok(
        "Get banners successfully",
        paging.body(count, "banners", banners),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/front/banner",
    responses(
        (status = 200, description = "Active banners by order.", body = [Banner]),
    ),
    tag = "storefront"
)]
#[instrument(skip_all)]
pub async fn active(pool: Extension<PgPool>) -> Result<Response, ApiError> {
    let banners = storage::active_banners(&pool).await?;
    Ok(ok("Banners get successfully", banners))
}
