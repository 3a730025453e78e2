//! Orders placed by users and their admin-side status workflow.
//!
//! Placing an order locks the product row (then the variant row, when one is
//! given), checks the quantity rules and stock, decrements stock and inserts
//! the order in one transaction.

use axum::{
    extract::{Extension, Path, Query},
    http::HeaderMap,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    auth::principal::{require_admin, require_user},
    parse_id, ListQuery, Paging,
};
use crate::{
    api::response::{created, ok, ApiError, ErrorBody},
    catalog::{defaults::lock_product, retry_transient, CatalogError},
    cli::globals::GlobalArgs,
};

pub const PAYMENT_METHODS: &[&str] = &["CASH", "CARD", "BANK", "PAYPAL"];
pub const ORDER_STATUSES: &[&str] = &["PENDING", "APPROVED", "CANCELLED", "SHIPPED", "DELIVERED"];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub quantity: Option<i32>,
    /// `CASH` (default), `CARD`, `BANK` or `PAYPAL`
    pub payment_method: Option<String>,
    pub payment_details: Option<String>,
    /// Address fields left out are taken from the user's profile.
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusRequest {
    /// `PENDING`, `APPROVED`, `CANCELLED`, `SHIPPED` or `DELIVERED`
    pub status: Option<String>,
    pub current_admin_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub status: String,
    pub order_date: DateTime<Utc>,
    pub total: f64,
    pub payment_method: String,
    pub payment_details: Option<String>,
    pub current_admin_status: Option<String>,
    pub current_user_status: Option<String>,
    pub address1: String,
    pub address2: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub pincode: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order with the product title and the buyer, for the admin list.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub product_title: String,
    pub user_name: String,
    pub user_email: String,
}

/// Shipping address; `None` parts fall back to the user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
struct Address {
    address1: Option<String>,
    address2: Option<String>,
    country: Option<String>,
    state: Option<String>,
    city: Option<String>,
    pincode: Option<String>,
}

impl Address {
    fn or(self, fallback: Self) -> Self {
        Self {
            address1: self.address1.or(fallback.address1),
            address2: self.address2.or(fallback.address2),
            country: self.country.or(fallback.country),
            state: self.state.or(fallback.state),
            city: self.city.or(fallback.city),
            pincode: self.pincode.or(fallback.pincode),
        }
    }
}

#[derive(Debug)]
struct NewOrder {
    user_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
    payment_method: String,
    payment_details: Option<String>,
    address: Address,
}

#[derive(Debug, Clone, Copy, FromRow)]
struct ProductStock {
    active: bool,
    min_quantity: i32,
    max_quantity: i32,
    available: i32,
    actual_price: f64,
    discounted_price: f64,
}

#[derive(Debug, Clone, Copy, FromRow)]
struct VariantStock {
    status: bool,
    quantity: i32,
    price: f64,
    discounted_price: Option<f64>,
}

/// Checks `quantity` against the product bounds and the stock it draws from.
/// A `max_quantity` of zero means no upper bound.
fn check_quantity(
    quantity: i32,
    min_quantity: i32,
    max_quantity: i32,
    available: i32,
) -> Result<(), CatalogError> {
    if quantity < 1 || quantity < min_quantity || (max_quantity > 0 && quantity > max_quantity) {
        let upper = if max_quantity > 0 {
            max_quantity.to_string()
        } else {
            "any".to_string()
        };
        return Err(CatalogError::invalid(format!(
            "Quantity must be between {} and {upper}",
            min_quantity.max(1)
        )));
    }
    if quantity > available {
        return Err(CatalogError::conflict("Insufficient stock"));
    }
    Ok(())
}

/// The variant price when a variant is ordered, else the product price; a
/// positive discounted price wins over the regular one.
fn unit_price(product: &ProductStock, variant: Option<&VariantStock>) -> f64 {
    match variant {
        Some(variant) => variant
            .discounted_price
            .filter(|price| *price > 0.0)
            .unwrap_or(variant.price),
        None if product.discounted_price > 0.0 => product.discounted_price,
        None => product.actual_price,
    }
}

async fn product_stock(conn: &mut PgConnection, id: Uuid) -> Result<ProductStock, CatalogError> {
    lock_product(conn, id).await?;
    Ok(sqlx::query_as(
        r"
        SELECT status = 'ACTIVE' AS active, min_quantity, max_quantity,
               current_available_quantity AS available, actual_price, discounted_price
        FROM products
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?)
}

#[instrument(skip(pool, order))]
async fn insert_order(pool: &PgPool, order: &NewOrder) -> Result<Order, CatalogError> {
    let mut tx = pool.begin().await?;

    let profile: Address = sqlx::query_as(
        "SELECT address1, address2, country, state, city, pincode FROM users WHERE id = $1",
    )
    .bind(order.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| CatalogError::not_found("User not found"))?;
    let address = order.address.clone().or(profile);

    let product = product_stock(&mut tx, order.product_id).await?;
    if !product.active {
        return Err(CatalogError::invalid("Product is not available"));
    }

    let variant = match order.variant_id {
        Some(variant_id) => {
            let variant: VariantStock = sqlx::query_as(
                r"
                SELECT status, quantity, price, discounted_price
                FROM variants
                WHERE id = $1 AND product_id = $2
                FOR UPDATE
                ",
            )
            .bind(variant_id)
            .bind(order.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CatalogError::not_found("Variant not found"))?;
            if !variant.status {
                return Err(CatalogError::invalid("Variant is not available"));
            }
            Some(variant)
        }
        None => None,
    };

    let available = variant.map_or(product.available, |v| v.quantity);
    check_quantity(
        order.quantity,
        product.min_quantity,
        product.max_quantity,
        available,
    )?;

    match order.variant_id {
        Some(variant_id) => {
            sqlx::query(
                "UPDATE variants SET quantity = quantity - $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(variant_id)
            .bind(order.quantity)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query(
                r"
                UPDATE products
                SET current_available_quantity = current_available_quantity - $2,
                    updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(order.product_id)
            .bind(order.quantity)
            .execute(&mut *tx)
            .await?;
        }
    }

    let total = unit_price(&product, variant.as_ref()) * f64::from(order.quantity);

    let placed: Order = sqlx::query_as(
        r"
        INSERT INTO orders (user_id, product_id, variant_id, quantity, total, payment_method,
                            payment_details, address1, address2, country, state, city, pincode)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        ",
    )
    .bind(order.user_id)
    .bind(order.product_id)
    .bind(order.variant_id)
    .bind(order.quantity)
    .bind(total)
    .bind(&order.payment_method)
    .bind(&order.payment_details)
    .bind(address.address1.unwrap_or_default())
    .bind(address.address2.unwrap_or_default())
    .bind(address.country.unwrap_or_default())
    .bind(address.state.unwrap_or_default())
    .bind(address.city.unwrap_or_default())
    .bind(address.pincode.unwrap_or_default())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(placed)
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_choice(raw: &str, allowed: &[&'static str], what: &str) -> Result<&'static str, ApiError> {
    let upper = raw.trim().to_ascii_uppercase();
    allowed
        .iter()
        .copied()
        .find(|choice| *choice == upper)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {what}")))
}

#[utoipa::path(
    post,
    path = "/api/v1/user/order",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed and stock decremented.", body = Order),
        (status = 400, description = "Missing or invalid fields, or quantity out of bounds.", body = ErrorBody),
        (status = 401, description = "Missing or invalid user token.", body = ErrorBody),
        (status = 404, description = "Product or variant not found.", body = ErrorBody),
        (status = 409, description = "Insufficient stock.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn place(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Response, ApiError> {
    let user = require_user(&headers, &globals)?;

    let quantity = payload.quantity.map(|q| q.to_string());
    super::require_fields(&[
        ("productId", payload.product_id.as_deref()),
        ("quantity", quantity.as_deref()),
    ])?;

    let product_id = parse_id(payload.product_id.as_deref().unwrap_or_default())?;
    let variant_id = non_blank(payload.variant_id.as_ref())
        .map(|raw| parse_id(&raw))
        .transpose()?;
    let payment_method = match non_blank(payload.payment_method.as_ref()) {
        Some(raw) => parse_choice(&raw, PAYMENT_METHODS, "payment method")?,
        None => PAYMENT_METHODS[0],
    };

    let order = NewOrder {
        user_id: user.user_id,
        product_id,
        variant_id,
        quantity: payload.quantity.unwrap_or_default(),
        payment_method: payment_method.to_string(),
        payment_details: non_blank(payload.payment_details.as_ref()),
        address: Address {
            address1: non_blank(payload.address1.as_ref()),
            address2: non_blank(payload.address2.as_ref()),
            country: non_blank(payload.country.as_ref()),
            state: non_blank(payload.state.as_ref()),
            city: non_blank(payload.city.as_ref()),
            pincode: non_blank(payload.pincode.as_ref()),
        },
    };

    let pool = &*pool;
    let order = &order;
    let placed = retry_transient(move || insert_order(pool, order)).await?;

    info!(order_id = %placed.id, user_id = %placed.user_id, total = placed.total, "order placed");
    Ok(created("Order placed successfully", placed))
}

#[utoipa::path(
    get,
    path = "/api/v1/user/orders",
    params(ListQuery),
    responses(
        (status = 200, description = "`{ count, totalPages, currentPage, orders }` of the caller, newest first."),
        (status = 401, description = "Missing or invalid user token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn mine(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let user = require_user(&headers, &globals)?;
    let paging = query.paging();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&*pool)
        .await?;
    let orders: Vec<Order> = sqlx::query_as(
        "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(paging.limit)
    .bind(paging.offset())
    .fetch_all(&*pool)
    .await?;

    Ok(ok(
        "Orders get successfully",
        paging.body(count, "orders", orders),
    ))
}

const ORDER_FILTER: &str = r"
    WHERE ($1::text IS NULL OR o.status = $1)
      AND ($2::timestamptz IS NULL OR o.created_at >= $2)
      AND ($3::timestamptz IS NULL OR o.created_at < $3)
";

async fn list_orders(
    pool: &PgPool,
    status: Option<&str>,
    bounds: (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
    paging: Paging,
) -> Result<(i64, Vec<OrderSummary>), CatalogError> {
    let (from, to) = bounds;
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders o {ORDER_FILTER}"))
        .bind(status)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await?;

    let orders = sqlx::query_as(&format!(
        r"
        SELECT o.*, p.title AS product_title, u.name AS user_name, u.email AS user_email
        FROM orders o
        JOIN products p ON p.id = o.product_id
        JOIN users u ON u.id = o.user_id
        {ORDER_FILTER}
        ORDER BY o.created_at DESC
        LIMIT $4 OFFSET $5
        "
    ))
    .bind(status)
    .bind(from)
    .bind(to)
    .bind(paging.limit)
    .bind(paging.offset())
    .fetch_all(pool)
    .await?;

    Ok((count, orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(ListQuery),
    responses(
        (status = 200, description = "`{ count, totalPages, currentPage, orders }`, newest first."),
        (status = 400, description = "Invalid filter.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;

    let status = non_blank(query.status.as_ref())
        .map(|raw| parse_choice(&raw, ORDER_STATUSES, "status"))
        .transpose()?;
    let bounds = query.date_bounds()?;
    let paging = query.paging();

    let (count, orders) = list_orders(&pool, status, bounds, paging).await?;
    Ok(ok(
        "Orders get successfully",
        paging.body(count, "orders", orders),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/order/{id}/status",
    params(("id" = String, Path, description = "Order id")),
    request_body = OrderStatusRequest,
    responses(
        (status = 200, description = "Status changed.", body = Order),
        (status = 400, description = "Invalid status.", body = ErrorBody),
        (status = 404, description = "Order not found.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn set_status(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    Path(id): Path<String>,
    Json(payload): Json<OrderStatusRequest>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &pool, &globals).await?;
    let id = parse_id(&id)?;

    let raw = non_blank(payload.status.as_ref())
        .ok_or_else(|| ApiError::bad_request("Invalid or incomplete data: Missing fields status"))?;
    let status = parse_choice(&raw, ORDER_STATUSES, "status")?;

    let order: Order = sqlx::query_as(
        r"
        UPDATE orders
        SET status = $2, current_admin_status = COALESCE($3, current_admin_status),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(status)
    .bind(non_blank(payload.current_admin_status.as_ref()))
    .fetch_optional(&*pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Order not found"))?;

    info!(order_id = %id, %status, "order status changed");
    Ok(ok("Order status updated successfully", order))
}
