// ============================================================
// Layer 3 — Embedding Domain Type
// ============================================================
// The output of a benchmarked model for one image: a flat
// feature vector plus the source it came from.
//
// Face verification benchmarks compare embeddings with cosine
// similarity, so that lives here too.
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// File name or label of the image this was computed from
    pub source: String,

    /// Raw (un-normalised) feature vector
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(source: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            source: source.into(),
            vector,
        }
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    /// L2 norm of the vector
    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// A copy scaled to unit length (zero vectors stay zero)
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        let vector = if norm > 0.0 {
            self.vector.iter().map(|x| x / norm).collect()
        } else {
            self.vector.clone()
        };
        Self { source: self.source.clone(), vector }
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        cosine_similarity(&self.vector, &other.vector)
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot:    f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let a = Embedding::new("a.jpg", vec![1.0, 2.0, 3.0]);
        let b = Embedding::new("b.jpg", vec![2.0, 4.0, 6.0]);
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_length_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_normalized() {
        let e = Embedding::new("x", vec![3.0, 4.0]).normalized();
        assert!((e.vector[0] - 0.6).abs() < 1e-6);
        assert!((e.vector[1] - 0.8).abs() < 1e-6);
        assert_eq!(e.source, "x");

        let zero = Embedding::new("z", vec![0.0, 0.0]).normalized();
        assert_eq!(zero.vector, vec![0.0, 0.0]);
    }
}
