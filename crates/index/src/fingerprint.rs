//! Deterministic content vectors for similarity lookups.
//!
//! A SHA-256 digest of the text, read as 64 hex nibbles scaled to `[0, 1]`.
//! Identical text always maps to the same vector. It stands in for an
//! embedding model behind the same `similarity` contract.

use sha2::{Digest, Sha256};

/// Number of components in a content vector.
pub const VECTOR_WIDTH: usize = 64;

pub fn content_vector(text: &str) -> Vec<f64> {
    let digest = Sha256::digest(text.as_bytes());
    digest
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .map(|nibble| f64::from(nibble) / 15.0)
        .collect()
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
