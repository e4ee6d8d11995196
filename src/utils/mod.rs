//! Shared utilities: stable hashing and label validation.

pub mod hash;
pub mod labels;

pub use hash::{fnv1a, hash_combine};
pub use labels::is_valid_label;
