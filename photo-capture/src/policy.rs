//! Capture quota decisions
//!
//! Pure functions, no side effects. A category quota of `0` forbids every
//! capture in that category.

use crate::models::DEFAULT_CATEGORY;

/// Whether a new capture must be rejected before the camera is touched
pub fn is_blocked(max_for_category: u32, current_count: usize) -> bool {
    max_for_category == 0 || current_count >= max_for_category as usize
}

/// Whether the quota is exhausted after a successful capture
pub fn just_reached_limit(max_for_category: u32, count_after_add: usize) -> bool {
    count_after_add >= max_for_category as usize
}

/// Case-insensitive category comparison
pub fn category_matches(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Maps an unset or blank category to the default category
pub fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

/// Key under which requests for a category are serialized
pub fn category_key(category: &str) -> String {
    category.to_lowercase()
}
