//! Embedding strategy and vector encoding helpers.
//!
//! Backends that lack a native embedding facility (Redis, MariaDB) compute
//! vectors through an [`EmbeddingFunction`]. The only implementation shipped
//! here is [`CharCodeEmbedding`], a deterministic stand-in for a real model:
//! the same text always maps to the same vector, which is all the insert-time
//! and query-time round trip needs.

use std::sync::Arc;

/// Default embedding dimensionality.
pub const DEFAULT_DIMS: usize = 384;

/// Text → vector strategy.
///
/// Swap implementations to plug in a learned model without touching backend code.
pub trait EmbeddingFunction: Send + Sync {
    /// Identifier recorded in logs.
    fn name(&self) -> &str;
    /// Output vector length.
    fn dims(&self) -> usize;
    /// Embed one text. Must be deterministic for a given input.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Shared handle passed to backends.
pub type SharedEmbedding = Arc<dyn EmbeddingFunction>;

/// Character-code bucket embedding.
///
/// # Algorithm
///
/// 1. Lowercase the text and split on whitespace.
/// 2. For word `idx`, add `code / 1000` to slot `(code + idx) mod dims`
///    for every UTF-16 code unit `code` of the word.
/// 3. L2-normalize, unless the vector is all zeros.
///
/// Not contextual and blind to synonyms.
#[derive(Debug, Clone)]
pub struct CharCodeEmbedding {
    dims: usize,
}

impl CharCodeEmbedding {
    /// # Panics
    ///
    /// Never; a zero dimension is clamped to 1.
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn shared(dims: usize) -> SharedEmbedding {
        Arc::new(Self::new(dims))
    }
}

impl Default for CharCodeEmbedding {
    fn default() -> Self {
        Self::new(DEFAULT_DIMS)
    }
}

impl EmbeddingFunction for CharCodeEmbedding {
    fn name(&self) -> &str {
        "char-code"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        // Accumulate in f64 so rounding does not depend on word count.
        let mut acc = vec![0.0f64; self.dims];
        let lowered = text.to_lowercase();

        for (idx, word) in lowered.split_whitespace().enumerate() {
            for code in word.encode_utf16() {
                let slot = (code as usize + idx) % self.dims;
                acc[slot] += f64::from(code) / 1000.0;
            }
        }

        let magnitude = acc.iter().map(|v| v * v).sum::<f64>().sqrt();
        if magnitude > 0.0 {
            for v in &mut acc {
                *v /= magnitude;
            }
        }

        acc.into_iter().map(|v| v as f32).collect()
    }
}

/// Encode a float vector as little-endian f32 bytes.
///
/// This is the `FLOAT32` blob layout RediSearch expects for vector fields.
///
/// ```rust
/// use voice_retrieval_core::embedding::vec_to_blob;
///
/// let blob = vec_to_blob(&[1.0f32, -2.5]);
/// assert_eq!(blob.len(), 8);
/// assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l2_norm(vec: &[f32]) -> f32 {
        vec.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let e = CharCodeEmbedding::default();
        let a = e.embed("The quiet river bends at dusk");
        let b = e.embed("The quiet river bends at dusk");
        assert_eq!(vec_to_blob(&a), vec_to_blob(&b));
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let e = CharCodeEmbedding::default();
        for text in ["a", "hello world", "Ünïcödé text with 漢字", "  padded  "] {
            let v = e.embed(text);
            assert_eq!(v.len(), DEFAULT_DIMS);
            assert!((l2_norm(&v) - 1.0).abs() < 1e-5, "norm for {text:?}");
        }
    }

    #[test]
    fn test_blank_text_yields_zero_vector() {
        let e = CharCodeEmbedding::new(16);
        let v = e.embed("   \n\t ");
        assert_eq!(v, vec![0.0; 16]);
        assert_eq!(e.embed(""), vec![0.0; 16]);
    }

    #[test]
    fn test_slot_assignment() {
        // "a" = 97 at word 0 → slot 97 % 8 = 1; "b" = 98 at word 1 → slot 99 % 8 = 3.
        let e = CharCodeEmbedding::new(8);
        let v = e.embed("A b");
        let expected_a = 0.097 / (0.097f64.powi(2) + 0.098f64.powi(2)).sqrt();
        assert!((f64::from(v[1]) - expected_a).abs() < 1e-6);
        assert!(v[3] > 0.0);
        assert_eq!(v.iter().filter(|x| **x != 0.0).count(), 2);
    }

    #[test]
    fn test_word_order_changes_vector() {
        let e = CharCodeEmbedding::default();
        assert_ne!(e.embed("cats chase dogs"), e.embed("dogs chase cats"));
    }

    #[test]
    fn test_lowercases_before_embedding() {
        let e = CharCodeEmbedding::default();
        assert_eq!(e.embed("Morning Light"), e.embed("morning light"));
    }

    #[test]
    fn test_zero_dims_clamped() {
        assert_eq!(CharCodeEmbedding::new(0).dims(), 1);
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }
}
