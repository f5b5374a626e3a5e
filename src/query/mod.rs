//! Query executor for oakdb
//!
//! Combines a compiled predicate, an order specification and a pagination
//! window into one of three query kinds:
//!
//! - fetch: predicate over every primary row
//! - search: rows containing every query term, ranked by BM25
//! - similar: every indexed vector, scored by distance to the query
//!
//! Ties are broken by key ascending.

mod executor;
mod order;
mod sorter;

pub use executor::{QueryExecutor, QueryLimits, QuerySource, SimilarQuery, Window};
pub use order::{Direction, OrderField, OrderSpec};
pub use sorter::{Hit, ResultSorter};
