//! Index Manager subsystem for oakdb
//!
//! Each Base may carry a text index and a vector index next to its primary
//! table. Both are persisted as derived tables (`{base}_fts`, `{base}_vec`)
//! and mirrored in memory for querying.
//!
//! # Design Principles
//!
//! - Derived state: auxiliary tables are rebuilt from the primary table on enable
//! - Same transaction: auxiliary writes commit with the primary mutation
//! - Updates to in-memory structures occur AFTER the commit succeeds

mod manager;
mod text;
mod vector;

pub use manager::{
    conf_flag_key, fts_table, vec_table, EnableOutcome, IndexDelta, IndexManager, CONF_TABLE,
};
pub use text::{tokenize, TextIndex};
pub use vector::{decode_vector, distance, encode_vector, VectorIndex};

use std::fmt;
use std::str::FromStr;

use crate::errors::OakError;

/// The two auxiliary index kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Search,
    Vector,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Search => "search",
            IndexKind::Vector => "vector",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vector distance metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Metric {
    /// Sum of absolute differences
    L1,
    /// Euclidean distance
    L2,
    /// 1 - cosine similarity
    #[default]
    Cosine,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::L1 => "L1",
            Metric::L2 => "L2",
            Metric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = OakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" => Ok(Metric::L1),
            "l2" => Ok(Metric::L2),
            "cosine" => Ok(Metric::Cosine),
            _ => Err(OakError::invalid(format!(
                "unknown metric '{}', expected L1, L2 or cosine",
                s
            ))),
        }
    }
}
