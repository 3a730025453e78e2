use axum::{
    extract::{Extension, Multipart, Path},
    http::HeaderMap,
    response::Response,
};
use sqlx::PgPool;
use tracing::{info, instrument};

use super::{
    parse_status, storage,
    types::{Category, CategoryDetail, CategoryFields, CategoryForm},
    STATUS_INACTIVE,
};
use crate::{
    api::{
        handlers::{auth::principal::require_admin, parse_id},
        response::{ok, ApiError, ErrorBody},
        uploads::UploadForm,
    },
    cli::globals::GlobalArgs,
};

const NAME_CHARS: std::ops::RangeInclusive<usize> = 3..=50;
const MAX_DESCRIPTION_CHARS: usize = 200;

fn category_fields(form: &UploadForm) -> Result<CategoryFields, ApiError> {
    form.require(&[
        "name",
        "description",
        "bgColor",
        "status",
        "icon",
        "webImage",
        "appImage",
    ])?;

    let name = form.text("name").unwrap_or_default().to_string();
    if !NAME_CHARS.contains(&name.chars().count()) {
        return Err(ApiError::bad_request(
            "Category name must be between 3 and 50 characters",
        ));
    }
    let description = form.text("description").unwrap_or_default().to_string();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ApiError::bad_request(
            "Category description must be at most 200 characters",
        ));
    }
    let status = parse_status(form.text("status").unwrap_or_default())
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    let image = |field: &str| {
        form.image(field)
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request(format!("{field} must be an image upload")))
    };

    Ok(CategoryFields {
        name,
        description,
        bg_color: form.text("bgColor").unwrap_or_default().to_string(),
        status: status.to_string(),
        icon: image("icon")?,
        web_image: image("webImage")?,
        app_image: image("appImage")?,
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/category",
    request_body(content = CategoryForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Category added.", body = Category),
        (status = 400, description = "Missing or invalid fields.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
        (status = 409, description = "An active category with this name exists.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "categories"
)]
#[instrument(skip_all)]
pub async fn create(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let admin = require_admin(&headers, &pool, &globals).await?;
    let mut form = UploadForm::from_multipart(multipart, &globals.image_dir()).await?;

    let fields = category_fields(&form)?;
    let category = storage::insert_category(&pool, &fields, admin.admin_id).await?;
    form.commit();

    info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok(ok("Category added successfully", category))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/category/{id}",
    params(("id" = String, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category with its creator and last editor.", body = CategoryDetail),
        (status = 400, description = "Invalid id.", body = ErrorBody),
        (status = 404, description = "Category not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "categories"
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

    let category = storage::find_category(&pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(ok("Category get successfully", category))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/category/{id}",
    params(("id" = String, Path, description = "Category id")),
    responses(
        (status = 200, description = "Status toggled between ACTIVE and INACTIVE."),
        (status = 404, description = "Category not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "categories"
)]
#[instrument(skip_all)]
pub async fn toggle(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let admin = require_admin(&headers, &pool, &globals).await?;
    let id = parse_id(&id)?;

    let status = storage::toggle_category(&pool, id, admin.admin_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    info!(category_id = %id, %status, "category status toggled");
    let message = if status == STATUS_INACTIVE {
        "Category status is Inactive successfully"
    } else {
        "Category status is Active successfully"
    };
    Ok(ok(message, serde_json::json!({})))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/category",
    responses(
        (status = 200, description = "Active categories by name.", body = [Category]),
        (status = 401, description = "Missing or invalid token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "categories"
)]
#[instrument(skip_all)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let categories = storage::active_categories(&pool).await?;
    Ok(ok("Categories get successfully", categories))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::FromRequest, http::Request};

    const BOUNDARY: &str = "X-SHOPDESK-BOUNDARY";

    fn text_part(name: &str, value: &str) -> String {
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
    }

    fn image_part(name: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n"
        )
    }

    async fn form_from(parts: &[String], dir: &std::path::Path) -> Option<UploadForm> {
        let body = format!("{}--{BOUNDARY}--\r\n", parts.concat());
        let request = Request::builder()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .ok()?;
        let multipart = Multipart::from_request(request, &()).await.ok()?;
        UploadForm::from_multipart(multipart, dir).await.ok()
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("shopdesk-{name}-{}", ulid::Ulid::new()));
        let _ = std::fs::create_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn complete_form_is_accepted() {
        let dir = scratch_dir("category-ok");
        let parts = vec![
            text_part("name", "Kitchen"),
            text_part("description", "Pots and pans"),
            text_part("bgColor", "#ffeecc"),
            text_part("status", "active"),
            image_part("icon"),
            image_part("webImage"),
            image_part("appImage"),
        ];
        let Some(form) = form_from(&parts, &dir).await else {
            panic!("multipart body should parse");
        };

        let fields = category_fields(&form);
        assert!(fields.is_ok());
        if let Ok(fields) = fields {
            assert_eq!(fields.name, "Kitchen");
            assert_eq!(fields.status, "ACTIVE");
            assert!(fields.icon.starts_with("icon-"));
        }
        drop(form);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn short_name_and_missing_images_are_rejected() {
        let dir = scratch_dir("category-bad");
        let parts = vec![
            text_part("name", "Ki"),
            text_part("description", "Pots"),
            text_part("bgColor", "#fff"),
            text_part("status", "ACTIVE"),
        ];
        let Some(form) = form_from(&parts, &dir).await else {
            panic!("multipart body should parse");
        };

        match category_fields(&form) {
            Err(ApiError::BadRequest(message)) => {
                assert_eq!(
                    message,
                    "Invalid or incomplete data: Missing fields icon, webImage, appImage"
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
