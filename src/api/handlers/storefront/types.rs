//! Row and payload types for categories, products and variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::catalog::ordering::RequestedOrder;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub icon: String,
    pub web_image: String,
    pub app_image: String,
    pub bg_color: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminRef {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub created_by: Option<AdminRef>,
    pub updated_by: Option<AdminRef>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub status: String,
    pub category_id: Uuid,
    pub description: String,
    pub specification: String,
    pub uses: Vec<String>,
    pub thumbnail1: Option<String>,
    pub thumbnail2: Option<String>,
    pub actual_price: f64,
    pub discounted_price: f64,
    pub tax_percent: f64,
    pub total_tax: f64,
    pub base_price: f64,
    pub min_quantity: i32,
    pub max_quantity: i32,
    pub current_available_quantity: i32,
    pub tags: Vec<String>,
    pub meta_description: String,
    pub meta_title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product with the name and colour of its category.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub product: Product,
    pub category_name: String,
    pub category_bg_color: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StorefrontProduct {
    #[serde(flatten)]
    pub product: ProductDetail,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub price: f64,
    pub quantity: i32,
    #[schema(value_type = Vec<Attribute>)]
    pub attributes: Json<Vec<Attribute>>,
    pub image_thumbnail: Option<String>,
    pub images: Vec<String>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub status: bool,
    pub discounted_price: Option<f64>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NextOrder {
    pub order: i32,
}

/// Validated category form.
#[derive(Debug)]
pub(super) struct CategoryFields {
    pub name: String,
    pub description: String,
    pub bg_color: String,
    pub status: String,
    pub icon: String,
    pub web_image: String,
    pub app_image: String,
}

/// Validated product form shared by create and update.
#[derive(Debug)]
pub(super) struct ProductFields {
    pub title: String,
    pub order: RequestedOrder,
    pub description: String,
    pub specification: String,
    pub uses: Vec<String>,
    pub actual_price: f64,
    pub discounted_price: f64,
    pub tax_percent: f64,
    pub total_tax: f64,
    pub base_price: f64,
    pub min_quantity: i32,
    pub max_quantity: i32,
    pub current_available_quantity: i32,
    pub tags: Vec<String>,
    pub meta_description: String,
    pub meta_title: String,
    pub thumbnail1: Option<String>,
    pub thumbnail2: Option<String>,
}

/// Validated variant form. On update every `None` keeps the stored value.
#[derive(Debug, Default)]
pub(super) struct VariantFields {
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
    pub attributes: Option<Vec<Attribute>>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub status: Option<bool>,
    pub discounted_price: Option<f64>,
    pub is_default: Option<bool>,
    pub image_thumbnail: Option<String>,
    pub images: Option<Vec<String>>,
}

// Multipart request bodies. Handlers read the parts through `UploadForm`;
// these types only describe the fields in the OpenAPI document.

/// Multipart body of the product create and update endpoints. `category`,
/// `status` and `thumbnail1` are only read on create.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductForm {
    pub title: String,
    /// 1-based position inside the category.
    pub order: i32,
    /// `ACTIVE` or `INACTIVE`
    pub status: String,
    /// Category id.
    pub category: String,
    pub description: String,
    pub specification: String,
    /// Comma separated, or repeated as `uses[]`.
    pub uses: String,
    pub actual_price: f64,
    pub discounted_price: f64,
    pub tax_percent: f64,
    pub total_tax: f64,
    pub base_price: f64,
    pub min_quantity: i32,
    pub max_quantity: i32,
    pub current_available_quantity: i32,
    /// Comma separated, or repeated as `tags[]`.
    pub tags: String,
    pub meta_description: String,
    pub meta_title: String,
    #[schema(format = Binary, value_type = String)]
    pub thumbnail1: String,
    #[schema(format = Binary, value_type = Option<String>)]
    pub thumbnail2: Option<String>,
}

/// Multipart body of `POST /api/v1/admin/category`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryForm {
    pub name: String,
    pub description: String,
    pub bg_color: String,
    /// `ACTIVE` or `INACTIVE`
    pub status: String,
    #[schema(format = Binary, value_type = String)]
    pub icon: String,
    #[schema(format = Binary, value_type = String)]
    pub web_image: String,
    #[schema(format = Binary, value_type = String)]
    pub app_image: String,
}

/// Multipart body of the variant create and update endpoints. On update every
/// field is optional and only the ones sent are changed.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantForm {
    /// Parent product id; create only.
    pub product_id: String,
    pub sku: String,
    pub price: f64,
    pub quantity: i32,
    /// JSON array of `{ "key": ..., "value": ... }`.
    pub attributes: Option<String>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// JSON object `{ "length", "width", "height" }`, an alternative to the flat fields.
    pub dimensions: Option<String>,
    pub status: Option<bool>,
    pub discounted_price: Option<f64>,
    pub is_default: Option<bool>,
    #[schema(format = Binary, value_type = Option<String>)]
    pub image_thumbnail: Option<String>,
    #[schema(format = Binary, value_type = Option<Vec<String>>)]
    pub image: Option<Vec<String>>,
}
