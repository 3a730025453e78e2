//! SQL for categories, products and variants.
//!
//! Writes that place a product go through `place_at_order` and writes that can
//! set a default variant go through `claim_default`, both inside the same
//! transaction as the row they protect.

use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    slug::generate_slug,
    types::{
        AdminRef, Category, CategoryDetail, CategoryFields, Product, ProductDetail, ProductFields,
        Variant, VariantFields,
    },
    SLUG_ATTEMPTS, STATUS_ACTIVE,
};
use crate::{
    api::handlers::Paging,
    catalog::{
        defaults::claim_default,
        ordering::{next_order, place_at_order, Partition},
        CatalogError,
    },
};

const PRODUCT_DETAIL_SELECT: &str = r"
    SELECT p.*, c.name AS category_name, c.bg_color AS category_bg_color
    FROM products p
    JOIN categories c ON c.id = p.category_id
";

const TOGGLE_STATUS: &str = "CASE WHEN status = 'ACTIVE' THEN 'INACTIVE' ELSE 'ACTIVE' END";

/// Tables whose rows carry a unique slug.
#[derive(Debug, Clone, Copy)]
enum SlugTable {
    Categories,
    Products,
}

impl SlugTable {
    const fn exists_sql(self) -> &'static str {
        match self {
            Self::Categories => "SELECT EXISTS (SELECT 1 FROM categories WHERE slug = $1)",
            Self::Products => "SELECT EXISTS (SELECT 1 FROM products WHERE slug = $1)",
        }
    }
}

/// Draws slug candidates for `name` until one is unused.
async fn unique_slug(
    conn: &mut PgConnection,
    table: SlugTable,
    name: &str,
) -> Result<String, CatalogError> {
    for _ in 0..SLUG_ATTEMPTS {
        let candidate = generate_slug(name);
        let taken: bool = sqlx::query_scalar(table.exists_sql())
            .bind(&candidate)
            .fetch_one(&mut *conn)
            .await?;
        if !taken {
            return Ok(candidate);
        }
        debug!(%candidate, "slug collision");
    }
    Err(CatalogError::conflict("Slug already exists"))
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[instrument(skip(pool, fields))]
pub(super) async fn insert_category(
    pool: &PgPool,
    fields: &CategoryFields,
    admin_id: Uuid,
) -> Result<Category, CatalogError> {
    let mut tx = pool.begin().await?;

    // Serializes the duplicate-name check against concurrent creates.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('categories:name', 0))")
        .execute(&mut *tx)
        .await?;

    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM categories WHERE lower(name) = lower($1) AND status = 'ACTIVE')",
    )
    .bind(&fields.name)
    .fetch_one(&mut *tx)
    .await?;
    if taken {
        return Err(CatalogError::conflict("Category name already exists"));
    }

    let slug = unique_slug(&mut tx, SlugTable::Categories, &fields.name).await?;

    let category: Category = sqlx::query_as(
        r"
        INSERT INTO categories (name, description, slug, icon, web_image, app_image, bg_color,
                                status, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, name, description, slug, icon, web_image, app_image, bg_color, status,
                  created_at, updated_at
        ",
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&slug)
    .bind(&fields.icon)
    .bind(&fields.web_image)
    .bind(&fields.app_image)
    .bind(&fields.bg_color)
    .bind(&fields.status)
    .bind(admin_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(category)
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    #[sqlx(flatten)]
    category: Category,
    created_by_name: Option<String>,
    created_by_role: Option<String>,
    updated_by_name: Option<String>,
    updated_by_role: Option<String>,
}

fn admin_ref(name: Option<String>, role: Option<String>) -> Option<AdminRef> {
    Some(AdminRef {
        name: name?,
        role: role?,
    })
}

pub(super) async fn find_category(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<CategoryDetail>, CatalogError> {
    let row: Option<CategoryRow> = sqlx::query_as(
        r"
        SELECT c.id, c.name, c.description, c.slug, c.icon, c.web_image, c.app_image,
               c.bg_color, c.status, c.created_at, c.updated_at,
               cb.name AS created_by_name, cb.role AS created_by_role,
               ub.name AS updated_by_name, ub.role AS updated_by_role
        FROM categories c
        LEFT JOIN admins cb ON cb.id = c.created_by
        LEFT JOIN admins ub ON ub.id = c.updated_by
        WHERE c.id = $1
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| CategoryDetail {
        category: row.category,
        created_by: admin_ref(row.created_by_name, row.created_by_role),
        updated_by: admin_ref(row.updated_by_name, row.updated_by_role),
    }))
}

/// Flips ACTIVE/INACTIVE and returns the new status.
pub(super) async fn toggle_category(
    pool: &PgPool,
    id: Uuid,
    admin_id: Uuid,
) -> Result<Option<String>, CatalogError> {
    let sql = format!(
        "UPDATE categories SET status = {TOGGLE_STATUS}, updated_by = $2, updated_at = NOW() \
         WHERE id = $1 RETURNING status"
    );
    Ok(sqlx::query_scalar(&sql)
        .bind(id)
        .bind(admin_id)
        .fetch_optional(pool)
        .await?)
}

pub(super) async fn active_categories(pool: &PgPool) -> Result<Vec<Category>, CatalogError> {
    Ok(sqlx::query_as(
        r"
        SELECT id, name, description, slug, icon, web_image, app_image, bg_color, status,
               created_at, updated_at
        FROM categories
        WHERE status = 'ACTIVE'
        ORDER BY name
        ",
    )
    .fetch_all(pool)
    .await?)
}

async fn ensure_category(conn: &mut PgConnection, id: Uuid) -> Result<(), CatalogError> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| CatalogError::not_found("Category not found"))
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Inserts a product at the requested order of its category.
#[instrument(skip(pool, fields))]
pub(super) async fn insert_product(
    pool: &PgPool,
    category_id: Uuid,
    status: &str,
    fields: &ProductFields,
) -> Result<Product, CatalogError> {
    let mut tx = pool.begin().await?;

    ensure_category(&mut tx, category_id).await?;
    let order = place_at_order(&mut tx, Partition::products_in(category_id), fields.order, None)
        .await?;
    let slug = unique_slug(&mut tx, SlugTable::Products, &fields.title).await?;

    let product: Product = sqlx::query_as(
        r"
        INSERT INTO products (title, slug, sort_order, status, category_id, description,
                              specification, uses, thumbnail1, thumbnail2, actual_price,
                              discounted_price, tax_percent, total_tax, base_price, min_quantity,
                              max_quantity, current_available_quantity, tags, meta_description,
                              meta_title)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21)
        RETURNING *
        ",
    )
    .bind(&fields.title)
    .bind(&slug)
    .bind(order)
    .bind(status)
    .bind(category_id)
    .bind(&fields.description)
    .bind(&fields.specification)
    .bind(&fields.uses)
    .bind(&fields.thumbnail1)
    .bind(&fields.thumbnail2)
    .bind(fields.actual_price)
    .bind(fields.discounted_price)
    .bind(fields.tax_percent)
    .bind(fields.total_tax)
    .bind(fields.base_price)
    .bind(fields.min_quantity)
    .bind(fields.max_quantity)
    .bind(fields.current_available_quantity)
    .bind(&fields.tags)
    .bind(&fields.meta_description)
    .bind(&fields.meta_title)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(product)
}

/// Rewrites a product and moves it to the requested order inside its
/// category. Returns the updated row and the thumbnails it no longer
/// references.
#[instrument(skip(pool, fields))]
pub(super) async fn update_product(
    pool: &PgPool,
    id: Uuid,
    fields: &ProductFields,
) -> Result<(Product, Vec<String>), CatalogError> {
    let mut tx = pool.begin().await?;

    // The category never changes on update, so the partition is stable.
    let category_id: Uuid = sqlx::query_scalar("SELECT category_id FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CatalogError::not_found("Product not found"))?;

    place_at_order(
        &mut tx,
        Partition::products_in(category_id),
        fields.order,
        Some(id),
    )
    .await?;

    let (old_thumbnail1, old_thumbnail2): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT thumbnail1, thumbnail2 FROM products WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    let slug = unique_slug(&mut tx, SlugTable::Products, &fields.title).await?;

    let product: Product = sqlx::query_as(
        r"
        UPDATE products
        SET title = $2, slug = $3, description = $4, specification = $5, uses = $6,
            thumbnail1 = COALESCE($7, thumbnail1), thumbnail2 = COALESCE($8, thumbnail2),
            actual_price = $9, discounted_price = $10, tax_percent = $11, total_tax = $12,
            base_price = $13, min_quantity = $14, max_quantity = $15,
            current_available_quantity = $16, tags = $17, meta_description = $18,
            meta_title = $19, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(&fields.title)
    .bind(&slug)
    .bind(&fields.description)
    .bind(&fields.specification)
    .bind(&fields.uses)
    .bind(&fields.thumbnail1)
    .bind(&fields.thumbnail2)
    .bind(fields.actual_price)
    .bind(fields.discounted_price)
    .bind(fields.tax_percent)
    .bind(fields.total_tax)
    .bind(fields.base_price)
    .bind(fields.min_quantity)
    .bind(fields.max_quantity)
    .bind(fields.current_available_quantity)
    .bind(&fields.tags)
    .bind(&fields.meta_description)
    .bind(&fields.meta_title)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let replaced = [
        (fields.thumbnail1.as_ref(), old_thumbnail1),
        (fields.thumbnail2.as_ref(), old_thumbnail2),
    ]
    .into_iter()
    .filter_map(|(new, old)| new.and(old))
    .collect();

    Ok((product, replaced))
}

pub(super) async fn toggle_product(pool: &PgPool, id: Uuid) -> Result<Option<Product>, CatalogError> {
    let sql = format!(
        "UPDATE products SET status = {TOGGLE_STATUS}, updated_at = NOW() WHERE id = $1 RETURNING *"
    );
    Ok(sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?)
}

pub(super) async fn find_product(
    pool: &PgPool,
    id: Uuid,
    active_only: bool,
) -> Result<Option<ProductDetail>, CatalogError> {
    let sql = format!(
        "{PRODUCT_DETAIL_SELECT} WHERE p.id = $1 AND (NOT $2 OR p.status = '{STATUS_ACTIVE}')"
    );
    Ok(sqlx::query_as(&sql)
        .bind(id)
        .bind(active_only)
        .fetch_optional(pool)
        .await?)
}

/// Filters for the admin product list.
#[derive(Debug, Default)]
pub(super) struct ProductFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub keyword: Option<String>,
    pub category_name: Option<String>,
}

const PRODUCT_FILTER: &str = r"
    WHERE ($1::timestamptz IS NULL OR p.created_at >= $1)
      AND ($2::timestamptz IS NULL OR p.created_at < $2)
      AND ($3::text IS NULL OR p.title ILIKE $3 OR p.description ILIKE $3
           OR p.specification ILIKE $3)
      AND ($4::text IS NULL OR c.name = $4)
";

pub(super) async fn list_products(
    pool: &PgPool,
    filter: &ProductFilter,
    paging: Paging,
) -> Result<(i64, Vec<ProductDetail>), CatalogError> {
    let count_sql = format!(
        "SELECT COUNT(*) FROM products p JOIN categories c ON c.id = p.category_id {PRODUCT_FILTER}"
    );
    let count: i64 = sqlx::query_scalar(&count_sql)
        .bind(filter.from)
        .bind(filter.to)
        .bind(&filter.keyword)
        .bind(&filter.category_name)
        .fetch_one(pool)
        .await?;

    let page_sql = format!(
        "{PRODUCT_DETAIL_SELECT} {PRODUCT_FILTER} ORDER BY p.created_at DESC LIMIT $5 OFFSET $6"
    );
    let products = sqlx::query_as(&page_sql)
        .bind(filter.from)
        .bind(filter.to)
        .bind(&filter.keyword)
        .bind(&filter.category_name)
        .bind(paging.limit)
        .bind(paging.offset())
        .fetch_all(pool)
        .await?;

    Ok((count, products))
}

/// Order a product appended to `category_id` would get right now.
pub(super) async fn next_product_order(pool: &PgPool, category_id: Uuid) -> Result<i32, CatalogError> {
    let mut conn = pool.acquire().await?;
    ensure_category(&mut conn, category_id).await?;
    next_order(&mut conn, Partition::products_in(category_id)).await
}

/// Active products grouped by category name, then by order.
pub(super) async fn storefront_products(pool: &PgPool) -> Result<Vec<ProductDetail>, CatalogError> {
    let sql = format!(
        "{PRODUCT_DETAIL_SELECT} WHERE p.status = '{STATUS_ACTIVE}' ORDER BY c.name, p.sort_order"
    );
    Ok(sqlx::query_as(&sql).fetch_all(pool).await?)
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Inserts a variant. With `is_default` the siblings lose the flag in the same
/// transaction.
#[instrument(skip(pool, fields))]
pub(super) async fn insert_variant(
    pool: &PgPool,
    product_id: Uuid,
    fields: &VariantFields,
) -> Result<Variant, CatalogError> {
    let mut tx = pool.begin().await?;

    let is_default = fields.is_default.unwrap_or(false);
    if is_default {
        claim_default(&mut tx, product_id, None).await?;
    } else {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CatalogError::not_found("Product not found"))?;
    }

    let variant: Variant = sqlx::query_as(
        r"
        INSERT INTO variants (product_id, sku, price, quantity, attributes, image_thumbnail,
                              images, weight, length, width, height, status, discounted_price,
                              is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, TRUE), $13, $14)
        RETURNING *
        ",
    )
    .bind(product_id)
    .bind(&fields.sku)
    .bind(fields.price)
    .bind(fields.quantity)
    .bind(Json(fields.attributes.clone().unwrap_or_default()))
    .bind(&fields.image_thumbnail)
    .bind(fields.images.clone().unwrap_or_default())
    .bind(fields.weight)
    .bind(fields.length)
    .bind(fields.width)
    .bind(fields.height)
    .bind(fields.status)
    .bind(fields.discounted_price)
    .bind(is_default)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(variant)
}

/// Applies the fields that were sent. Returns the updated row and the images
/// it no longer references.
#[instrument(skip(pool, fields))]
pub(super) async fn update_variant(
    pool: &PgPool,
    id: Uuid,
    fields: &VariantFields,
) -> Result<(Variant, Vec<String>), CatalogError> {
    let mut tx = pool.begin().await?;

    let product_id: Uuid = sqlx::query_scalar("SELECT product_id FROM variants WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CatalogError::not_found("Variant not found"))?;

    if fields.is_default == Some(true) {
        claim_default(&mut tx, product_id, Some(id)).await?;
    }

    let (old_thumbnail, old_images): (Option<String>, Vec<String>) =
        sqlx::query_as("SELECT image_thumbnail, images FROM variants WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    let variant: Variant = sqlx::query_as(
        r"
        UPDATE variants
        SET sku = COALESCE($2, sku), price = COALESCE($3, price),
            quantity = COALESCE($4, quantity), attributes = COALESCE($5, attributes),
            image_thumbnail = COALESCE($6, image_thumbnail), images = COALESCE($7, images),
            weight = COALESCE($8, weight), length = COALESCE($9, length),
            width = COALESCE($10, width), height = COALESCE($11, height),
            status = COALESCE($12, status), discounted_price = COALESCE($13, discounted_price),
            is_default = COALESCE($14, is_default), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(&fields.sku)
    .bind(fields.price)
    .bind(fields.quantity)
    .bind(fields.attributes.clone().map(Json))
    .bind(&fields.image_thumbnail)
    .bind(&fields.images)
    .bind(fields.weight)
    .bind(fields.length)
    .bind(fields.width)
    .bind(fields.height)
    .bind(fields.status)
    .bind(fields.discounted_price)
    .bind(fields.is_default)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let mut replaced = Vec::new();
    if fields.image_thumbnail.is_some() {
        replaced.extend(old_thumbnail);
    }
    if fields.images.is_some() {
        replaced.extend(old_images);
    }
    Ok((variant, replaced))
}

/// Parent product of `variant_id`, if the variant exists.
pub(super) async fn variant_product(
    pool: &PgPool,
    variant_id: Uuid,
) -> Result<Option<Uuid>, CatalogError> {
    Ok(
        sqlx::query_scalar("SELECT product_id FROM variants WHERE id = $1")
            .bind(variant_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Variants of a product, default first. `None` when the product is missing.
pub(super) async fn product_variants(
    pool: &PgPool,
    product_id: Uuid,
    active_only: bool,
) -> Result<Option<Vec<Variant>>, CatalogError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
        .bind(product_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Ok(None);
    }

    let variants = sqlx::query_as(
        r"
        SELECT * FROM variants
        WHERE product_id = $1 AND (NOT $2 OR status)
        ORDER BY is_default DESC, created_at
        ",
    )
    .bind(product_id)
    .bind(active_only)
    .fetch_all(pool)
    .await?;

    Ok(Some(variants))
}
