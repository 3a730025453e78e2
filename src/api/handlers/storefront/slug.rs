//! Slug helpers for categories and products.
//!
//! A slug is the normalized name followed by the creation time in
//! milliseconds and a short random base-36 tag, e.g.
//! `summer-tees-1718000000000-k3x9a`.

use rand::Rng;

const SLUG_BASE_MAX: usize = 60;
const TAG_LEN: usize = 5;
const TAG_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const FALLBACK_BASE: &str = "item";

/// Normalizes user input into a URL-safe slug (`a-z0-9-`) of at most `max` chars.
/// Returns `None` when nothing alphanumeric is left.
pub(super) fn normalize_slug(input: &str, max: usize) -> Option<String> {
    let mut slug = String::new();
    let mut prev_dash = false;
    for ch in input.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        return None;
    }
    let truncated: String = trimmed.chars().take(max).collect();
    Some(truncated.trim_end_matches('-').to_string())
}

/// Builds a fresh slug candidate for `name`; callers retry on collision.
pub(super) fn generate_slug(name: &str) -> String {
    let base = normalize_slug(name, SLUG_BASE_MAX).unwrap_or_else(|| FALLBACK_BASE.to_string());
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let tag: String = (0..TAG_LEN)
        .map(|_| char::from(TAG_ALPHABET[rng.gen_range(0..TAG_ALPHABET.len())]))
        .collect();
    format!("{base}-{millis}-{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(
            normalize_slug("  Summer   Tees & Tops! ", 60).as_deref(),
            Some("summer-tees-tops")
        );
        assert_eq!(normalize_slug("--A--B--", 60).as_deref(), Some("a-b"));
        assert_eq!(normalize_slug("!!!", 60), None);
    }

    #[test]
    fn normalize_truncates_without_trailing_dash() {
        assert_eq!(normalize_slug("abc def", 4).as_deref(), Some("abc"));
    }

    #[test]
    fn generated_slug_shape() {
        let slug = generate_slug("Red Shoes");
        let parts: Vec<&str> = slug.rsplitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), TAG_LEN);
        assert!(parts[0].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2], "red-shoes");
    }

    #[test]
    fn symbols_only_fall_back() {
        assert!(generate_slug("***").starts_with("item-"));
    }

    #[test]
    fn candidates_differ() {
        assert_ne!(generate_slug("same"), generate_slug("same"));
    }
}
