//! # Shopdesk (catalog administration API)
//!
//! `shopdesk` is the admin and storefront backend of a small e-commerce
//! catalog. Admins manage categories, products, variants, banners,
//! testimonials and the site configuration; users register, log in and place
//! orders; the `front` routes expose the active catalog.
//!
//! ## Ordering
//!
//! Banners, testimonials and the products of each category carry a dense
//! `order` (`1..=N`). Creating an entity at a position shifts its siblings and
//! moving one only touches the range between the old and the new slot. All
//! reindexing on a partition is serialized, so concurrent appends never share
//! an order.
//!
//! ## Default variant
//!
//! A product has at most one default variant. Making a variant the default
//! clears the flag on its siblings in the same transaction.
//!
//! ## Authentication
//!
//! Passwords are stored as Argon2id PHC strings. Bearer tokens are HS256 JWTs
//! carrying the principal kind (`admin` or `user`); admin routes also check
//! that the admin is active and holds the `superadmin` role.

pub mod api;
pub mod catalog;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
