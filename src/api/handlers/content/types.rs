use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::catalog::ordering::RequestedOrder;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: Uuid,
    pub banner_name: String,
    pub banner_image: String,
    pub banner_btn_text: String,
    pub banner_btn_link: String,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub status: bool,
    pub banner_description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub rating: String,
    pub color: String,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub site_name: String,
    pub logo: String,
    pub email: String,
    pub contact_no: String,
    pub url: String,
    pub color: String,
    pub fb: String,
    pub insta: String,
    pub x: String,
    pub yt: String,
    pub linkedin: String,
    #[serde(rename = "totalUser")]
    pub total_users: i64,
    pub total_orders: i64,
    pub total_payments: i64,
    pub total_visits: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated banner form. `banner_image` is `None` on an update that keeps
/// the current image.
#[derive(Debug)]
pub(super) struct BannerFields {
    pub banner_name: String,
    pub banner_btn_text: String,
    pub banner_btn_link: String,
    pub banner_description: String,
    pub order: RequestedOrder,
    pub status: bool,
    pub banner_image: Option<String>,
}

#[derive(Debug)]
pub(super) struct TestimonialFields {
    pub name: String,
    pub text: String,
    pub rating: String,
    pub color: String,
    pub order: RequestedOrder,
    pub status: bool,
    pub image: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(super) struct Counters {
    pub total_users: Option<i64>,
    pub total_orders: Option<i64>,
    pub total_payments: Option<i64>,
    pub total_visits: Option<String>,
}

#[derive(Debug)]
pub(super) struct ConfigFields {
    pub site_name: String,
    pub email: String,
    pub contact_no: String,
    pub url: String,
    pub color: String,
    pub fb: String,
    pub insta: String,
    pub x: String,
    pub yt: String,
    pub linkedin: String,
    pub logo: Option<String>,
    pub counters: Counters,
    /// Overwrite the counters of an existing row.
    pub change_counts: bool,
}

// Multipart request bodies. Handlers read the parts through `UploadForm`;
// these types only describe the fields in the OpenAPI document.

/// Multipart body of the banner create and update endpoints; `bannerImage`
/// is optional on update.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BannerForm {
    pub banner_name: String,
    pub banner_btn_text: String,
    pub banner_btn_link: String,
    /// 1-based position among all banners.
    pub order: i32,
    pub status: bool,
    pub banner_description: String,
    #[schema(format = Binary, value_type = String)]
    pub banner_image: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TestimonialForm {
    pub name: String,
    pub text: String,
    pub color: String,
    /// 1-based position among all testimonials.
    pub order: i32,
    pub status: bool,
    pub rating: String,
    /// Required on create, optional on update.
    #[schema(format = Binary, value_type = String)]
    pub image: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfigForm {
    #[serde(rename = "sitename")]
    pub site_name: String,
    pub email: String,
    pub contact_no: String,
    pub url: String,
    pub color: String,
    pub fb: String,
    pub insta: String,
    pub x: String,
    pub yt: String,
    pub linkedin: String,
    /// Required on the first write.
    #[schema(format = Binary, value_type = Option<String>)]
    pub logo: Option<String>,
    pub total_user: Option<i64>,
    pub total_orders: Option<i64>,
    pub total_payments: Option<i64>,
    pub total_visits: Option<String>,
    /// Overwrite the counters of an existing configuration.
    pub change_counts: Option<bool>,
}
