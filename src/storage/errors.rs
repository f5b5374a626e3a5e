//! Failures of the commit log and table store
//!
//! I/O failures fail the operation that hit them. Corruption means the log can
//! no longer be replayed faithfully, so the instance has to be reopened.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Where in the persisted state a corruption was noticed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Found while decoding, position not tracked
    Unknown,
    /// Byte offset into the log file
    Offset(u64),
    /// A stored row payload
    Row { table: String, key: String },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Unknown => Ok(()),
            Location::Offset(offset) => write!(f, " at byte {}", offset),
            Location::Row { table, key } => write!(f, " in row {}/{}", table, key),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    /// Open, metadata or truncate failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A commit frame or its fsync did not reach the disk
    #[error("{context}: {source}")]
    Write {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Read {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Checksum, framing or payload decoding failure
    #[error("log corrupted{location}: {reason}")]
    Corrupted { reason: String, location: Location },
}

impl StorageError {
    pub fn io_error(context: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn write_failed(context: impl Into<String>, source: io::Error) -> Self {
        StorageError::Write {
            context: context.into(),
            source,
        }
    }

    pub fn read_failed(context: impl Into<String>, source: io::Error) -> Self {
        StorageError::Read {
            context: context.into(),
            source,
        }
    }

    pub fn data_corruption(reason: impl Into<String>) -> Self {
        Self::corrupted(reason, Location::Unknown)
    }

    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self::corrupted(reason, Location::Offset(offset))
    }

    pub fn corruption_in_row(table: &str, key: &str, reason: impl Into<String>) -> Self {
        Self::corrupted(
            reason,
            Location::Row {
                table: table.to_string(),
                key: key.to_string(),
            },
        )
    }

    fn corrupted(reason: impl Into<String>, location: Location) -> Self {
        StorageError::Corrupted {
            reason: reason.into(),
            location,
        }
    }

    /// Stable code string, used in log events
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Io { .. } => "OAK_STORAGE_IO_ERROR",
            StorageError::Write { .. } => "OAK_STORAGE_WRITE_FAILED",
            StorageError::Read { .. } => "OAK_STORAGE_READ_FAILED",
            StorageError::Corrupted { .. } => "OAK_DATA_CORRUPTION",
        }
    }

    /// Position of a corruption, `None` for I/O failures
    pub fn location(&self) -> Option<&Location> {
        match self {
            StorageError::Corrupted { location, .. } => Some(location),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Corrupted { .. })
    }
}
