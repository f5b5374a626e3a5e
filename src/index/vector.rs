//! In-memory vector index with exhaustive distance computation
//!
//! Vectors are persisted in `{base}_vec` as little-endian f32 bytes.

use std::collections::BTreeMap;

use super::Metric;
use crate::errors::{OakError, OakResult};
use crate::storage::StorageError;

/// Encodes a vector as little-endian f32 bytes.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decodes little-endian f32 bytes.
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, StorageError> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::data_corruption(format!(
            "vector payload of {} bytes is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Distance between two vectors of equal length.
pub fn distance(metric: Metric, a: &[f32], b: &[f32]) -> f64 {
    let pairs = a.iter().zip(b).map(|(x, y)| (f64::from(*x), f64::from(*y)));
    match metric {
        Metric::L1 => pairs.map(|(x, y)| (x - y).abs()).sum(),
        Metric::L2 => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
        Metric::Cosine => {
            let (dot, norm_a, norm_b) = pairs.fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
                (dot + x * y, na + x * x, nb + y * y)
            });
            if norm_a == 0.0 || norm_b == 0.0 {
                1.0
            } else {
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
        }
    }
}

/// Vectors for one base
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    vectors: BTreeMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vectors.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.vectors.get(key).map(Vec::as_slice)
    }

    /// Dimension of the stored vectors, if any are stored
    pub fn dims(&self) -> Option<usize> {
        self.vectors.values().next().map(Vec::len)
    }

    pub fn upsert(&mut self, key: &str, vector: Vec<f32>) {
        self.vectors.insert(key.to_string(), vector);
    }

    pub fn remove(&mut self, key: &str) {
        self.vectors.remove(key);
    }

    /// Distance from `query` to every stored vector, in key order.
    pub fn distances(&self, query: &[f32], metric: Metric) -> OakResult<Vec<(String, f64)>> {
        if let Some(dims) = self.dims() {
            if dims != query.len() {
                return Err(OakError::embedding(format!(
                    "query vector has {} dimensions, index has {}",
                    query.len(),
                    dims
                )));
            }
        }
        Ok(self
            .vectors
            .iter()
            .map(|(key, vector)| (key.clone(), distance(metric, query, vector)))
            .collect())
    }
}
