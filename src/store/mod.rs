//! Transactional table store
//!
//! A `Store` holds every table of an Oak instance in memory and persists
//! changes through the commit log in [`crate::storage`]. All writes go through a
//! [`Transaction`]; nothing changes in memory until its frame is on disk.

mod row;
mod transaction;

pub use row::{decode_item, decode_items, ItemRecord};
pub use transaction::{CommitInfo, Transaction};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::storage::{LogOp, LogReader, LogWriter, StorageError, StorageResult};

/// Path that opens a store without a backing file
pub const MEMORY_PATH: &str = ":memory:";

/// Rows of one table, keyed and ordered by key
pub type Table = BTreeMap<String, Vec<u8>>;

/// In-memory tables backed by an append-only commit log.
pub struct Store {
    tables: BTreeMap<String, Table>,
    writer: Option<LogWriter>,
    path: Option<PathBuf>,
    sync_on_commit: bool,
    last_seq: u64,
    last_timestamp: i64,
}

impl Store {
    /// Opens the store at `path`, replaying its log. `:memory:` opens a
    /// volatile store.
    pub fn open(path: &str, sync_on_commit: bool) -> StorageResult<Self> {
        if path == MEMORY_PATH {
            return Ok(Self::in_memory());
        }

        let log_path = Path::new(path);
        let mut store = Self {
            tables: BTreeMap::new(),
            writer: None,
            path: Some(log_path.to_path_buf()),
            sync_on_commit,
            last_seq: 0,
            last_timestamp: 0,
        };

        let mut valid_len = 0;
        let mut frames = 0usize;
        if log_path.exists() {
            let mut reader = LogReader::open(log_path)?;
            while let Some(frame) = reader.read_next()? {
                let offset = reader.valid_len();
                for op in &frame.ops {
                    store.tables.apply(op).map_err(|reason| {
                        StorageError::corruption_at_offset(offset, reason)
                    })?;
                }
                store.last_seq = frame.seq;
                store.last_timestamp = store.last_timestamp.max(frame.timestamp_micros);
                frames += 1;
            }
            valid_len = reader.valid_len();
            if let Some(offset) = reader.torn_at() {
                warn!(
                    target: "oakdb::store",
                    event = "TORN_TAIL_DISCARDED",
                    offset,
                    path = %log_path.display(),
                    "discarding partial commit frame"
                );
            }
            info!(
                target: "oakdb::store",
                event = "RECOVERY_COMPLETE",
                frames,
                tables = store.tables.len(),
                "log replayed"
            );
        }

        store.writer = Some(LogWriter::open(log_path, valid_len)?);

        info!(
            target: "oakdb::store",
            event = "STORE_OPENED",
            path = %log_path.display(),
            sync_on_commit,
            "store opened"
        );

        Ok(store)
    }

    /// Opens a store with no backing file.
    pub fn in_memory() -> Self {
        Self {
            tables: BTreeMap::new(),
            writer: None,
            path: None,
            sync_on_commit: false,
            last_seq: 0,
            last_timestamp: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.writer.is_some()
    }

    /// Starts a transaction. Its timestamp is strictly greater than that of
    /// every committed transaction.
    pub fn begin(&mut self) -> Transaction<'_> {
        let now = Utc::now().timestamp_micros();
        let timestamp = now.max(self.last_timestamp + 1);
        Transaction::new(self, timestamp)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get(&self, table: &str, key: &str) -> Option<&[u8]> {
        self.tables
            .get(table)
            .and_then(|t| t.get(key))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, table: &str, key: &str) -> bool {
        self.get(table, key).is_some()
    }

    /// Number of rows in `table`, zero if it does not exist
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, BTreeMap::len)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Sequence number of the last committed frame
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn last_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    pub(crate) fn write_frame(&mut self, seq: u64, timestamp: i64, ops: Vec<LogOp>) -> StorageResult<()> {
        let frame = crate::storage::CommitFrame::new(seq, timestamp, ops);
        if let Some(writer) = self.writer.as_mut() {
            writer.append(&frame, self.sync_on_commit)?;
        }
        for op in &frame.ops {
            self.tables
                .apply(op)
                .map_err(StorageError::data_corruption)?;
        }
        self.last_seq = seq;
        self.last_timestamp = timestamp;
        Ok(())
    }
}

/// Applies committed ops to the table map
trait ApplyOp {
    fn apply(&mut self, op: &LogOp) -> Result<(), String>;
}

impl ApplyOp for BTreeMap<String, Table> {
    fn apply(&mut self, op: &LogOp) -> Result<(), String> {
        match op {
            LogOp::CreateTable { table } => {
                self.entry(table.clone()).or_default();
            }
            LogOp::DropTable { table } => {
                self.remove(table);
            }
            LogOp::ClearTable { table } => {
                self.get_mut(table)
                    .ok_or_else(|| format!("clear of missing table '{}'", table))?
                    .clear();
            }
            LogOp::Put {
                table,
                key,
                payload,
            } => {
                self.get_mut(table)
                    .ok_or_else(|| format!("put into missing table '{}'", table))?
                    .insert(key.clone(), payload.clone());
            }
            LogOp::Delete { table, key } => {
                self.get_mut(table)
                    .ok_or_else(|| format!("delete from missing table '{}'", table))?
                    .remove(key);
            }
        }
        Ok(())
    }
}
