//! Singleton site configuration. The first write must carry a logo; later
//! writes only touch the counters when `changeCounts=true`.

use axum::{
    extract::{Extension, Multipart},
    http::HeaderMap,
    response::Response,
};
use sqlx::PgPool;
use tracing::{info, instrument};

use super::{
    storage::{self, ConfigWrite},
    types::{ConfigFields, Counters, SiteConfig, SiteConfigForm},
};
use crate::{
    api::{
        handlers::{auth::principal::require_admin, valid_email, valid_phone},
        response::{ok, ApiError, ErrorBody},
        uploads::{remove_images, UploadForm},
    },
    cli::globals::GlobalArgs,
};

const REQUIRED: &[&str] = &[
    "sitename", "email", "contactNo", "url", "color", "fb", "insta", "x", "yt", "linkedin",
];

fn config_fields(form: &UploadForm) -> Result<ConfigFields, ApiError> {
    form.require(REQUIRED)?;
    let text = |name: &str| form.text(name).unwrap_or_default().to_string();

    let email = text("email");
    if !valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    let contact_no = text("contactNo");
    if !valid_phone(&contact_no) {
        return Err(ApiError::bad_request("Invalid contact number"));
    }

    Ok(ConfigFields {
        site_name: text("sitename"),
        email,
        contact_no,
        url: text("url"),
        color: text("color"),
        fb: text("fb"),
        insta: text("insta"),
        x: text("x"),
        yt: text("yt"),
        linkedin: text("linkedin"),
        logo: form.image("logo").map(str::to_string),
        counters: Counters {
            total_users: form.parse_opt("totalUser")?,
            total_orders: form.parse_opt("totalOrders")?,
            total_payments: form.parse_opt("totalPayments")?,
            total_visits: form.text("totalVisits").map(str::to_string),
        },
        change_counts: form.flag("changeCounts")?.unwrap_or(false),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/config",
    request_body(content = SiteConfigForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Configuration stored.", body = SiteConfig),
        (status = 400, description = "Missing or invalid fields, or no logo on the first write.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "config"
)]
#[instrument(skip_all)]
pub async fn upsert(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let image_dir = globals.image_dir();
    let mut form = UploadForm::from_multipart(multipart, &image_dir).await?;

    let fields = config_fields(&form)?;
    match storage::upsert_site_config(&pool, &fields).await? {
        ConfigWrite::LogoRequired => Err(ApiError::bad_request(
            "Invalid or incomplete data: Missing fields logo",
        )),
        ConfigWrite::Saved {
            config,
            replaced_logo,
        } => {
            form.commit();
            remove_images(&image_dir, replaced_logo).await;
            info!(change_counts = fields.change_counts, "site configuration saved");
            Ok(ok("Config updated successfully", config))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/config",
    responses(
        (status = 200, description = "Current configuration.", body = SiteConfig),
        (status = 404, description = "Nothing configured yet.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "config"
)]
#[instrument(skip_all)]
pub async fn get(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let config = storage::site_config(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Config not found"))?;
    Ok(ok("Config get successfully", config))
}
