//! Deterministic hashing helpers.
//!
//! Used for parameter-set identities and derived random seeds. These must
//! stay stable across runs, platforms and compiler versions, so the std
//! `DefaultHasher` is not an option.

/// Hash a byte slice deterministically (FNV-1a, 64 bit).
pub fn fnv1a(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}
