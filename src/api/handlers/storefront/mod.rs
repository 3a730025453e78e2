//! Categories, products and variants, plus the public read-only catalog.
//!
//! Products are ordered per category through `catalog::ordering`; variants keep
//! a single default per product through `catalog::defaults`.

pub mod categories;
pub mod front;
pub mod products;
mod slug;
mod storage;
pub mod types;
pub mod variants;

pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_INACTIVE: &str = "INACTIVE";

/// Attempts at finding an unused slug before giving up.
const SLUG_ATTEMPTS: usize = 5;

/// `ACTIVE` or `INACTIVE`, case-insensitive.
fn parse_status(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_uppercase().as_str() {
        STATUS_ACTIVE => Some(STATUS_ACTIVE),
        STATUS_INACTIVE => Some(STATUS_INACTIVE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing() {
        assert_eq!(parse_status(" active "), Some(STATUS_ACTIVE));
        assert_eq!(parse_status("INACTIVE"), Some(STATUS_INACTIVE));
        assert_eq!(parse_status("archived"), None);
    }
}
