//! Commit log storage for oakdb
//!
//! The log is the only persistent state of an Oak instance: a magic header
//! followed by checksummed commit frames, one per transaction. Tables are
//! rebuilt in memory by replaying the frames in order.
//!
//! # Design Principles
//!
//! - Append-only (no in-place updates)
//! - Checksum-verified on every read
//! - One frame per transaction, written with a single call
//! - A torn final frame is discarded, a corrupt complete frame halts the open

mod checksum;
mod errors;
mod reader;
mod record;
mod writer;

pub use checksum::compute_checksum;
pub use errors::{Location, StorageError, StorageResult};
pub use reader::LogReader;
pub use record::{CommitFrame, LogOp, OpTag, LOG_MAGIC};
pub use writer::LogWriter;
