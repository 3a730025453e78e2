//! SQL for banners, testimonials and the site configuration row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::types::{
    Banner, BannerFields, ConfigFields, SiteConfig, Testimonial, TestimonialFields,
};
use crate::{
    api::handlers::Paging,
    catalog::{
        ordering::{place_at_order, Partition},
        CatalogError,
    },
};

const SITE_KEY: &str = "site";

/// Filters shared by the banner and testimonial lists.
#[derive(Debug, Default)]
pub(super) struct ContentFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub keyword: Option<String>,
    pub status: Option<bool>,
}

// ---------------------------------------------------------------------------
// Banners
// ---------------------------------------------------------------------------

#[instrument(skip(pool, fields))]
pub(super) async fn insert_banner(
    pool: &PgPool,
    fields: &BannerFields,
) -> Result<Banner, CatalogError> {
    let mut tx = pool.begin().await?;

    let order = place_at_order(&mut tx, Partition::banners(), fields.order, None).await?;
    let banner: Banner = sqlx::query_as(
        r"
        INSERT INTO banners (banner_name, banner_image, banner_btn_text, banner_btn_link,
                             sort_order, status, banner_description)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(&fields.banner_name)
    .bind(&fields.banner_image)
    .bind(&fields.banner_btn_text)
    .bind(&fields.banner_btn_link)
    .bind(order)
    .bind(fields.status)
    .bind(&fields.banner_description)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(banner)
}

/// Rewrites a banner and moves it to the requested order. Returns the image
/// it no longer references, if it was replaced.
#[instrument(skip(pool, fields))]
pub(super) async fn update_banner(
    pool: &PgPool,
    id: Uuid,
    fields: &BannerFields,
) -> Result<(Banner, Option<String>), CatalogError> {
    let mut tx = pool.begin().await?;

    place_at_order(&mut tx, Partition::banners(), fields.order, Some(id))
        .await
        .map_err(|err| match err {
            CatalogError::NotFound(_) => CatalogError::not_found("Banner not found"),
            other => other,
        })?;

    let old_image: String =
        sqlx::query_scalar("SELECT banner_image FROM banners WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    let banner: Banner = sqlx::query_as(
        r"
        UPDATE banners
        SET banner_name = $2, banner_btn_text = $3, banner_btn_link = $4, status = $5,
            banner_description = $6, banner_image = COALESCE($7, banner_image),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(&fields.banner_name)
    .bind(&fields.banner_btn_text)
    .bind(&fields.banner_btn_link)
    .bind(fields.status)
    .bind(&fields.banner_description)
    .bind(&fields.banner_image)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((banner, fields.banner_image.as_ref().map(|_| old_image)))
}

pub(super) async fn find_banner(pool: &PgPool, id: Uuid) -> Result<Option<Banner>, CatalogError> {
    Ok(sqlx::query_as("SELECT * FROM banners WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

/// Flips `status` and returns the new value.
pub(super) async fn toggle_banner(pool: &PgPool, id: Uuid) -> Result<Option<bool>, CatalogError> {
    Ok(sqlx::query_scalar(
        "UPDATE banners SET status = NOT status, updated_at = NOW() WHERE id = $1 RETURNING status",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?)
}

const BANNER_FILTER: &str = r"
    WHERE ($1::timestamptz IS NULL OR created_at >= $1)
      AND ($2::timestamptz IS NULL OR created_at < $2)
      AND ($3::text IS NULL OR banner_name ILIKE $3 OR banner_description ILIKE $3)
      AND ($4::boolean IS NULL OR status = $4)
";

pub(super) async fn list_banners(
    pool: &PgPool,
    filter: &ContentFilter,
    paging: Paging,
) -> Result<(i64, Vec<Banner>), CatalogError> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM banners {BANNER_FILTER}"))
        .bind(filter.from)
        .bind(filter.to)
        .bind(&filter.keyword)
        .bind(filter.status)
        .fetch_one(pool)
        .await?;

    let banners = sqlx::query_as(&format!(
        "SELECT * FROM banners {BANNER_FILTER} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
    ))
    .bind(filter.from)
    .bind(filter.to)
    .bind(&filter.keyword)
    .bind(filter.status)
    .bind(paging.limit)
    .bind(paging.offset())
    .fetch_all(pool)
    .await?;

    Ok((count, banners))
}

pub(super) async fn active_banners(pool: &PgPool) -> Result<Vec<Banner>, CatalogError> {
    Ok(
        sqlx::query_as("SELECT * FROM banners WHERE status ORDER BY sort_order")
            .fetch_all(pool)
            .await?,
    )
}

// ---------------------------------------------------------------------------
// Testimonials
// ---------------------------------------------------------------------------

#[instrument(skip(pool, fields))]
pub(super) async fn insert_testimonial(
    pool: &PgPool,
    fields: &TestimonialFields,
) -> Result<Testimonial, CatalogError> {
    let mut tx = pool.begin().await?;

    let order = place_at_order(&mut tx, Partition::testimonials(), fields.order, None).await?;
    let testimonial: Testimonial = sqlx::query_as(
        r"
        INSERT INTO testimonials (name, text, image, rating, color, sort_order, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(&fields.name)
    .bind(&fields.text)
    .bind(&fields.image)
    .bind(&fields.rating)
    .bind(&fields.color)
    .bind(order)
    .bind(fields.status)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(testimonial)
}

#[instrument(skip(pool, fields))]
pub(super) async fn update_testimonial(
    pool: &PgPool,
    id: Uuid,
    fields: &TestimonialFields,
) -> Result<(Testimonial, Option<String>), CatalogError> {
    let mut tx = pool.begin().await?;

    place_at_order(&mut tx, Partition::testimonials(), fields.order, Some(id))
        .await
        .map_err(|err| match err {
            CatalogError::NotFound(_) => CatalogError::not_found("Testimonial not found"),
            other => other,
        })?;

    let old_image: String =
        sqlx::query_scalar("SELECT image FROM testimonials WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    let testimonial: Testimonial = sqlx::query_as(
        r"
        UPDATE testimonials
        SET name = $2, text = $3, rating = $4, color = $5, status = $6,
            image = COALESCE($7, image), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(&fields.name)
    .bind(&fields.text)
    .bind(&fields.rating)
    .bind(&fields.color)
    .bind(fields.status)
    .bind(&fields.image)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((testimonial, fields.image.as_ref().map(|_| old_image)))
}

pub(super) async fn find_testimonial(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<Testimonial>, CatalogError> {
    Ok(sqlx::query_as("SELECT * FROM testimonials WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

pub(super) async fn toggle_testimonial(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<bool>, CatalogError> {
    Ok(sqlx::query_scalar(
        "UPDATE testimonials SET status = NOT status, updated_at = NOW() WHERE id = $1 RETURNING status",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?)
}

const TESTIMONIAL_FILTER: &str = r"
    WHERE ($1::timestamptz IS NULL OR created_at >= $1)
      AND ($2::timestamptz IS NULL OR created_at < $2)
      AND ($3::text IS NULL OR name ILIKE $3 OR text ILIKE $3)
      AND ($4::boolean IS NULL OR status = $4)
";

pub(super) async fn list_testimonials(
    pool: &PgPool,
    filter: &ContentFilter,
    paging: Paging,
) -> Result<(i64, Vec<Testimonial>), CatalogError> {
    let count: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM testimonials {TESTIMONIAL_FILTER}"))
            .bind(filter.from)
            .bind(filter.to)
            .bind(&filter.keyword)
            .bind(filter.status)
            .fetch_one(pool)
            .await?;

    let testimonials = sqlx::query_as(&format!(
        "SELECT * FROM testimonials {TESTIMONIAL_FILTER} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
    ))
    .bind(filter.from)
    .bind(filter.to)
    .bind(&filter.keyword)
    .bind(filter.status)
    .bind(paging.limit)
    .bind(paging.offset())
    .fetch_all(pool)
    .await?;

    Ok((count, testimonials))
}

pub(super) async fn active_testimonials(pool: &PgPool) -> Result<Vec<Testimonial>, CatalogError> {
    Ok(
        sqlx::query_as("SELECT * FROM testimonials WHERE status ORDER BY sort_order")
            .fetch_all(pool)
            .await?,
    )
}

// ---------------------------------------------------------------------------
// Site configuration
// ---------------------------------------------------------------------------

const SITE_CONFIG_COLUMNS: &str = "site_name, logo, email, contact_no, url, color, fb, insta, x, \
     yt, linkedin, total_users, total_orders, total_payments, total_visits, created_at, updated_at";

/// Outcome of a configuration write.
#[derive(Debug)]
pub(super) enum ConfigWrite {
    Saved {
        config: SiteConfig,
        /// Logo replaced by this write.
        replaced_logo: Option<String>,
    },
    /// First write without a logo; nothing was stored.
    LogoRequired,
}

/// Inserts the configuration row or updates it in place.
#[instrument(skip(pool, fields))]
pub(super) async fn upsert_site_config(
    pool: &PgPool,
    fields: &ConfigFields,
) -> Result<ConfigWrite, CatalogError> {
    let mut tx = pool.begin().await?;

    let current_logo: Option<String> =
        sqlx::query_scalar("SELECT logo FROM site_config WHERE config_key = $1 FOR UPDATE")
            .bind(SITE_KEY)
            .fetch_optional(&mut *tx)
            .await?;

    let config: SiteConfig = match current_logo {
        None => {
            let Some(logo) = fields.logo.as_deref() else {
                return Ok(ConfigWrite::LogoRequired);
            };
            // A concurrent first write loses on the primary key.
            sqlx::query_as(&format!(
                r"
                INSERT INTO site_config (config_key, site_name, logo, email, contact_no, url, color,
                                         fb, insta, x, yt, linkedin, total_users, total_orders,
                                         total_payments, total_visits)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                        COALESCE($13, 0), COALESCE($14, 0), COALESCE($15, 0), COALESCE($16, '0'))
                RETURNING {SITE_CONFIG_COLUMNS}
                "
            ))
            .bind(SITE_KEY)
            .bind(&fields.site_name)
            .bind(logo)
            .bind(&fields.email)
            .bind(&fields.contact_no)
            .bind(&fields.url)
            .bind(&fields.color)
            .bind(&fields.fb)
            .bind(&fields.insta)
            .bind(&fields.x)
            .bind(&fields.yt)
            .bind(&fields.linkedin)
            .bind(fields.counters.total_users)
            .bind(fields.counters.total_orders)
            .bind(fields.counters.total_payments)
            .bind(&fields.counters.total_visits)
            .fetch_one(&mut *tx)
            .await?
        }
        Some(_) => {
            let counters = fields.change_counts.then_some(&fields.counters);
            sqlx::query_as(&format!(
                r"
                UPDATE site_config
                SET site_name = $2, logo = COALESCE($3, logo), email = $4, contact_no = $5,
                    url = $6, color = $7, fb = $8, insta = $9, x = $10, yt = $11, linkedin = $12,
                    total_users = COALESCE($13, total_users),
                    total_orders = COALESCE($14, total_orders),
                    total_payments = COALESCE($15, total_payments),
                    total_visits = COALESCE($16, total_visits),
                    updated_at = NOW()
                WHERE config_key = $1
                RETURNING {SITE_CONFIG_COLUMNS}
                "
            ))
            .bind(SITE_KEY)
            .bind(&fields.site_name)
            .bind(&fields.logo)
            .bind(&fields.email)
            .bind(&fields.contact_no)
            .bind(&fields.url)
            .bind(&fields.color)
            .bind(&fields.fb)
            .bind(&fields.insta)
            .bind(&fields.x)
            .bind(&fields.yt)
            .bind(&fields.linkedin)
            .bind(counters.and_then(|c| c.total_users))
            .bind(counters.and_then(|c| c.total_orders))
            .bind(counters.and_then(|c| c.total_payments))
            .bind(counters.and_then(|c| c.total_visits.clone()))
            .fetch_one(&mut *tx)
            .await?
        }
    };

    tx.commit().await?;

    let replaced_logo = current_logo.filter(|_| fields.logo.is_some());
    Ok(ConfigWrite::Saved {
        config,
        replaced_logo,
    })
}

pub(super) async fn site_config(pool: &PgPool) -> Result<Option<SiteConfig>, CatalogError> {
    Ok(sqlx::query_as(&format!(
        "SELECT {SITE_CONFIG_COLUMNS} FROM site_config WHERE config_key = $1"
    ))
    .bind(SITE_KEY)
    .fetch_optional(pool)
    .await?)
}
