//! Embedding provider capability
//!
//! An Oak instance holds at most one provider, configured explicitly through
//! `Oak::set_embedder` or `OakConfig::hashing_embedder_dims`. Nothing is
//! downloaded or created implicitly.

use thiserror::Error;

use crate::index::tokenize;
use crate::storage::compute_checksum;

/// Error reported by an embedding provider
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EmbedError {
    message: String,
}

impl EmbedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turns texts into vectors.
///
/// `embed_documents` must return one vector per input text.
pub trait Embedder: Send + Sync {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    fn name(&self) -> &str {
        "custom"
    }
}

/// Deterministic feature-hashing embedder.
///
/// Each token is hashed into one of `dims` buckets with a hash-derived sign;
/// the result is L2-normalized. Texts sharing words land close under cosine.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Result<Self, EmbedError> {
        if dims == 0 {
            return Err(EmbedError::new("hashing embedder needs at least one dimension"));
        }
        Ok(Self { dims })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let hash = compute_checksum(token.as_bytes());
            let bucket = (hash as usize) % self.dims;
            let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.embed(text))
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{distance, Metric};

    #[test]
    fn test_zero_dims_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed_query("apple banana").unwrap();
        let b = embedder.embed_query("apple banana").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let docs = embedder
            .embed_documents(&["red apple fruit".to_string(), "steel bridge".to_string()])
            .unwrap();
        let query = embedder.embed_query("apple fruit").unwrap();
        let near = distance(Metric::Cosine, &query, &docs[0]);
        let far = distance(Metric::Cosine, &query, &docs[1]);
        assert!(near < far);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert!(embedder.embed_query("").unwrap().iter().all(|x| *x == 0.0));
    }
}
