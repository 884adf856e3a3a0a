//! Deterministic local text embedding.
//!
//! Candidate retrieval only needs embeddings that put texts sharing vocabulary
//! near each other; authoritative content is always re-resolved through the
//! record store afterwards. A hashed bag-of-words projection into the usual
//! 384-dimension space is enough for that, runs fully offline, and is
//! deterministic across processes so the index can be rebuilt at any time.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const EMBEDDING_DIM: usize = 384;

#[derive(Debug, Clone)]
pub struct TextEmbedder {
    dim: usize,
}

impl Default for TextEmbedder {
    fn default() -> Self {
        Self { dim: EMBEDDING_DIM }
    }
}

impl TextEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Embed a text as an L2-normalized term-frequency vector using the
    /// hashing trick (signed feature hashing).
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dim];

        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();

            let index = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
        .map(|token| token.to_lowercase())
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_dimension_and_normalization() {
        let embedder = TextEmbedder::new();
        let vector = embedder.embed("quantum computing uses qubits");
        assert_eq!(vector.len(), EMBEDDING_DIM);

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = TextEmbedder::new();
        let a = embedder.embed("the same input text");
        let b = embedder.embed("the same input text");
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlapping_vocabulary_scores_higher() {
        let embedder = TextEmbedder::new();
        let doc = embedder.embed("rust borrow checker enforces ownership rules");
        let related = embedder.embed("how does the rust borrow checker work");
        let unrelated = embedder.embed("banana bread baking temperature");

        let related_score = cosine_similarity(&doc, &related);
        let unrelated_score = cosine_similarity(&doc, &unrelated);
        assert!(related_score > unrelated_score);
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let embedder = TextEmbedder::new();
        let vector = embedder.embed("");
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
