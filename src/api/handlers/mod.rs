//! API handlers and the helpers they share: input validation, paging, date
//! filters and path id parsing.

pub mod auth;
pub mod content;
pub mod health;
pub mod orders;
pub mod root;
pub mod storefront;
pub mod users;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::IntoParams;
use uuid::Uuid;

use super::response::ApiError;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// Lightweight email sanity check used before persisting data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").is_ok_and(|re| re.is_match(email))
}

/// Phone numbers are 10 to 14 digits.
pub fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^[0-9]{10,14}$").is_ok_and(|re| re.is_match(phone))
}

/// Fails with every name whose value is absent or blank, in order.
///
/// # Errors
/// `BadRequest` listing the missing fields.
pub fn require_fields(fields: &[(&str, Option<&str>)]) -> Result<(), ApiError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Invalid or incomplete data: Missing fields {}",
            missing.join(", ")
        )))
    }
}

/// Parses a path id, answering `400` instead of the extractor's plain text rejection.
///
/// # Errors
/// `BadRequest` when `raw` is not a UUID.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("Invalid id"))
}

/// Query string shared by the list endpoints. Every field is optional and
/// numbers are parsed leniently.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page number (default 1).
    pub page: Option<String>,
    /// Page size (default 10, at most 100).
    pub limit: Option<String>,
    /// Inclusive lower bound on the creation date, `YYYY-MM-DD`.
    pub from_date: Option<String>,
    /// Inclusive upper bound on the creation date, `YYYY-MM-DD`.
    pub to_date: Option<String>,
    /// Case-insensitive substring filter.
    pub keyword: Option<String>,
    pub status: Option<String>,
    pub category_name: Option<String>,
}

impl ListQuery {
    #[must_use]
    pub fn paging(&self) -> Paging {
        Paging::new(
            self.page.as_deref().and_then(|p| p.trim().parse().ok()),
            self.limit.as_deref().and_then(|l| l.trim().parse().ok()),
        )
    }

    /// `[from, to)` creation-time bounds; `to` is the start of the day after `toDate`.
    ///
    /// # Errors
    /// `BadRequest` when a date is not `YYYY-MM-DD`.
    pub fn date_bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ApiError> {
        let from = self.from_date.as_deref().map(parse_day).transpose()?;
        let to = self
            .to_date
            .as_deref()
            .map(parse_day)
            .transpose()?
            .and_then(|day| day.checked_add_days(Days::new(1)));
        Ok((from, to))
    }

    /// `ILIKE` pattern for `keyword`, or `None` when no keyword was sent.
    #[must_use]
    pub fn keyword_pattern(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(like_pattern)
    }
}

fn parse_day(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| ApiError::bad_request("Invalid date format, expected YYYY-MM-DD"))
}

/// Wraps `keyword` in `%` after escaping `LIKE` metacharacters.
#[must_use]
pub fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub limit: i64,
}

impl Paging {
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit
                .filter(|l| *l > 0)
                .map_or(DEFAULT_LIMIT, |l| l.min(MAX_LIMIT)),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    #[must_use]
    pub const fn total_pages(&self, count: i64) -> i64 {
        (count + self.limit - 1) / self.limit
    }

    /// `{ count, totalPages, currentPage, <key>: items }`
    #[must_use]
    pub fn body<T: serde::Serialize>(&self, count: i64, key: &str, items: T) -> Value {
        let mut body = json!({
            "count": count,
            "totalPages": self.total_pages(count),
            "currentPage": self.page,
        });
        if let Some(map) = body.as_object_mut() {
            map.insert(key.to_string(), json!(items));
        }
        body
    }
}
