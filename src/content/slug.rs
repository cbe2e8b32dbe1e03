//! Slug derivation and collection-wide uniqueness.
//!
//! A slug is derived from a title by transliterating to ASCII, lowercasing
//! and collapsing everything that is not alphanumeric into single hyphens.
//! It is then cut down to the configured length and, when the collection
//! already holds it, suffixed with `-2`, `-3`, ... The lowest free suffix
//! wins, so the first document keeps the bare slug.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::db::models::DocumentId;
use crate::db::repository::DocumentStore;
use crate::error::AppError;

/// Base used when a title normalizes to nothing (empty, only punctuation...).
pub const PLACEHOLDER_SLUG: &str = "untitled";

/// Smallest `max_length` accepted by configuration validation.
pub const MIN_MAX_LENGTH: usize = 8;

/// Slug generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlugConfig {
    /// Maximum slug length, suffix included.
    pub max_length: usize,
    /// When false, the normalized base is used as-is without consulting the store.
    pub enforce_uniqueness: bool,
    /// How many times a write is retried after losing a slug race.
    pub max_attempts: u32,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            max_length: 100,
            enforce_uniqueness: true,
            max_attempts: 5,
        }
    }
}

/// Normalize a title into slug form, without length limit.
///
/// Pure: the same title always gives the same slug.
pub fn normalize(title: &str) -> String {
    let slug = ::slug::slugify(title);
    if slug.is_empty() {
        PLACEHOLDER_SLUG.to_string()
    } else {
        slug
    }
}

/// Cut a slug to at most `max_length` bytes.
///
/// Cuts at the last hyphen that fits so words stay whole. A first word
/// longer than `max_length` is hard-cut since there is no boundary to use.
pub fn truncate(slug: &str, max_length: usize) -> String {
    if slug.len() <= max_length {
        return slug.to_string();
    }

    // Slugs are ASCII, byte offsets are char boundaries.
    let head = &slug[..max_length];
    let cut = if slug.as_bytes()[max_length] == b'-' {
        head
    } else {
        match head.rfind('-') {
            Some(pos) if pos > 0 => &head[..pos],
            _ => head,
        }
    };

    cut.trim_end_matches('-').to_string()
}

/// Normalized and length-bounded slug for a title.
pub fn base_slug(title: &str, max_length: usize) -> String {
    truncate(&normalize(title), max_length)
}

/// Check that `slug` is non-empty lowercase alphanumeric words joined by single hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.split('-').all(|word| {
            !word.is_empty()
                && word
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

/// Validate a caller-supplied slug.
///
/// Explicit slugs skip normalization, so they must already be well formed.
pub fn explicit_slug(slug: &str, config: &SlugConfig) -> Result<String, AppError> {
    if !is_valid_slug(slug) {
        return Err(AppError::BadRequest(format!(
            "Invalid slug '{}'. Expected lowercase letters and digits separated by single hyphens",
            slug
        )));
    }
    if slug.len() > config.max_length {
        return Err(AppError::BadRequest(format!(
            "Slug '{}' is longer than {} characters",
            slug, config.max_length
        )));
    }
    Ok(slug.to_string())
}

/// The `n`-th candidate for `base` and the stem it was built from.
///
/// `n == 1` is the bare base. Higher numbers append `-n`, shortening the
/// stem when the suffix would not fit.
fn candidate(base: &str, n: u64, max_length: usize) -> (String, String) {
    if n == 1 {
        return (base.to_string(), base.to_string());
    }
    let suffix = format!("-{n}");
    let stem = truncate(base, max_length.saturating_sub(suffix.len()));
    if stem.is_empty() {
        return (String::new(), n.to_string());
    }
    let slug = format!("{stem}{suffix}");
    (stem, slug)
}

/// Lowest free slug in `collection` for an already normalized `base`.
///
/// Slugs held by `exclude` (the document being updated) count as free.
/// This is a read-only suggestion; the store's unique constraint decides
/// at write time.
pub async fn unique_slug(
    store: &dyn DocumentStore,
    collection: &str,
    base: &str,
    exclude: Option<&DocumentId>,
    config: &SlugConfig,
) -> Result<String, AppError> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut fetched_stems: HashSet<String> = HashSet::new();

    let mut n = 0u64;
    loop {
        n += 1;
        let (stem, slug) = candidate(base, n, config.max_length);

        if fetched_stems.insert(stem.clone()) {
            let existing = store.find_slugs_with_prefix(collection, &stem).await?;
            taken.extend(
                existing
                    .into_iter()
                    .filter(|(id, _)| Some(id) != exclude)
                    .map(|(_, s)| s),
            );
        }

        if !taken.contains(&slug) {
            tracing::debug!(collection, base, slug = %slug, "Selected slug candidate");
            return Ok(slug);
        }
    }
}

/// Derive a slug for `title` in `collection`.
///
/// With `enforce_uniqueness` off the normalized base is returned without
/// any store access.
pub async fn generate_slug(
    store: &dyn DocumentStore,
    collection: &str,
    title: &str,
    config: &SlugConfig,
) -> Result<String, AppError> {
    let base = base_slug(title, config.max_length);
    if !config.enforce_uniqueness {
        return Ok(base);
    }
    unique_slug(store, collection, &base, None, config).await
}
