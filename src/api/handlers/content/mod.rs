//! Home page content: banners and testimonials (each one globally ordered
//! collection) and the singleton site configuration.

pub mod banners;
pub mod site_config;
mod storage;
pub mod testimonials;
pub mod types;

use super::ListQuery;
use crate::api::response::ApiError;

/// `status` filter of the banner and testimonial lists: `true` or `false`.
fn status_filter(query: &ListQuery) -> Result<Option<bool>, ApiError> {
    match query.status.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(_) => Err(ApiError::bad_request("status must be true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(status: Option<&str>) -> ListQuery {
        ListQuery {
            status: status.map(str::to_string),
            ..ListQuery::default()
        }
    }

    #[test]
    fn status_filter_values() {
        assert_eq!(status_filter(&query(None)).ok(), Some(None));
        assert_eq!(status_filter(&query(Some(" "))).ok(), Some(None));
        assert_eq!(status_filter(&query(Some("true"))).ok(), Some(Some(true)));
        assert_eq!(status_filter(&query(Some("false"))).ok(), Some(Some(false)));
        assert!(status_filter(&query(Some("ACTIVE"))).is_err());
    }
}
