//! Component label validation.
//!
//! Labels name services, sources and modules. They double as keys in the
//! product store and the seed table, so they are restricted to a plain
//! identifier alphabet.

use regex::Regex;
use std::sync::OnceLock;

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("label pattern is a valid regex")
    })
}

/// Returns `true` if `label` is an acceptable component or path label.
///
/// # Examples
/// ```
/// use evproc::utils::labels::is_valid_label;
///
/// assert!(is_valid_label("singlegen"));
/// assert!(is_valid_label("TFileService"));
/// assert!(!is_valid_label("2fast"));
/// assert!(!is_valid_label("with space"));
/// ```
pub fn is_valid_label(label: &str) -> bool {
    label_pattern().is_match(label)
}
