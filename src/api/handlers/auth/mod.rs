//! Admin and user authentication.
//!
//! Flow Overview:
//! 1) Passwords are hashed with Argon2id and stored as PHC strings.
//! 2) Login issues an HS256 bearer token that names the principal kind.
//! 3) `principal::require_admin` re-reads the admin row on every request, so a
//!    deactivated or demoted admin loses access before the token expires.

pub mod admin;
pub mod password;
pub mod principal;
pub mod token;

pub const ROLE_SUPERADMIN: &str = "superadmin";
pub const MIN_PASSWORD_LEN: usize = 8;
