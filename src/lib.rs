//! oakdb - an embedded document store over a single file
//!
//! Keyed CRUD, a structured filter language, full-text search and vector
//! similarity, with auxiliary indexes kept transactionally consistent with
//! the primary table.
//!
//! ```no_run
//! use oakdb::{Oak, Window};
//! use serde_json::json;
//!
//! # fn main() -> oakdb::OakResult<()> {
//! let mut oak = Oak::open("data/oak.db")?;
//! let users = oak.base("users")?;
//! users.add(json!({"name": "Ada", "age": 36}), Some("ada"), false)?;
//! let adults = users.fetch(&json!({"age__gte": 18}), None, Window::default())?;
//! assert_eq!(adults.total, 1);
//! # Ok(())
//! # }
//! ```

pub mod base;
pub mod config;
pub mod embed;
pub mod errors;
pub mod filter;
pub mod index;
pub mod oak;
pub mod path;
pub mod query;
pub mod response;
pub mod storage;
pub mod store;
pub mod value;

pub use base::Base;
pub use config::OakConfig;
pub use embed::{EmbedError, Embedder, HashingEmbedder};
pub use errors::{OakError, OakResult};
pub use filter::{Filter, QueryKind};
pub use index::{EnableOutcome, IndexKind, Metric};
pub use oak::Oak;
pub use query::Window;
pub use response::{
    assemble, AddResponse, AddsResponse, DeleteResponse, DeletesResponse, Envelope, GetResponse,
    ItemRow, ItemsResponse,
};
