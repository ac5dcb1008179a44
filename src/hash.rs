// src/hash.rs

//! Hashing for history dedup and document digests
//!
//! Two algorithms are available:
//! - **SHA-256**: used for history fingerprints, where hash equality must
//!   stand in for byte equality of the recorded input/output pair
//! - **XXH128**: fast digest of normalized bundles, for display and logging
//!
//! JSON documents are hashed over their canonical form (object keys sorted,
//! no insignificant whitespace) so that two serializations of the same
//! document produce the same digest.

use serde_json::Value;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_128;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Xxh128,
}

impl HashAlgorithm {
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Xxh128 => "xxh128",
        }
    }
}

/// A hash value with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

impl Hash {
    /// Format as a prefixed string (e.g., "xxh128:abc123...")
    pub fn to_prefixed_string(&self) -> String {
        format!("{}:{}", self.algorithm.name(), self.value)
    }
}

/// Compute hash of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Hash {
    let value = match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            format!("{:x}", hasher.finalize())
        }
        HashAlgorithm::Xxh128 => format!("{:032x}", xxh3_128(data)),
    };
    Hash { algorithm, value }
}

/// Serialize a JSON value with sorted object keys and no whitespace
///
/// `serde_json::Map` is a `BTreeMap` while the `preserve_order` feature is
/// off, so the compact serialization is already key-sorted.
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

/// Digest of a JSON document over its canonical form
pub fn json_digest(algorithm: HashAlgorithm, value: &Value) -> Hash {
    hash_bytes(algorithm, canonical_json(value).as_bytes())
}

/// SHA-256 fingerprint of a recorded (input, output) pair
///
/// Both parts are trimmed first. Each part is length-prefixed so that moving
/// bytes across the boundary changes the fingerprint.
pub fn pair_fingerprint(input: &str, output: &str) -> String {
    let input = input.trim();
    let output = output.trim();
    let mut data = Vec::with_capacity(input.len() + output.len() + 16);
    data.extend_from_slice(&(input.len() as u64).to_le_bytes());
    data.extend_from_slice(input.as_bytes());
    data.extend_from_slice(&(output.len() as u64).to_le_bytes());
    data.extend_from_slice(output.as_bytes());
    hash_bytes(HashAlgorithm::Sha256, &data).value
}
