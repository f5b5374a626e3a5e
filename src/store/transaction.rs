//! Write transactions
//!
//! A transaction stages ops against the committed state of the store. Reads
//! through [`Transaction::store`] see committed state only. Dropping a
//! transaction without committing discards every staged op.

use std::collections::BTreeSet;

use super::Store;
use crate::storage::{LogOp, StorageError, StorageResult};

/// Result of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    pub seq: u64,
    pub timestamp: i64,
    pub ops: usize,
}

/// A single atomic batch of table operations.
pub struct Transaction<'s> {
    store: &'s mut Store,
    timestamp: i64,
    ops: Vec<LogOp>,
    created: BTreeSet<String>,
    dropped: BTreeSet<String>,
}

impl<'s> Transaction<'s> {
    pub(super) fn new(store: &'s mut Store, timestamp: i64) -> Self {
        Self {
            store,
            timestamp,
            ops: Vec::new(),
            created: BTreeSet::new(),
            dropped: BTreeSet::new(),
        }
    }

    /// Commit timestamp in microseconds since the epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Committed state, unaffected by staged ops
    pub fn store(&self) -> &Store {
        self.store
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Whether `table` exists once the staged ops are applied
    pub fn table_exists(&self, table: &str) -> bool {
        self.created.contains(table)
            || (!self.dropped.contains(table) && self.store.has_table(table))
    }

    pub fn create_table(&mut self, table: &str) -> StorageResult<()> {
        if self.table_exists(table) {
            return Ok(());
        }
        self.created.insert(table.to_string());
        self.ops.push(LogOp::CreateTable {
            table: table.to_string(),
        });
        Ok(())
    }

    pub fn drop_table(&mut self, table: &str) -> StorageResult<()> {
        if !self.table_exists(table) {
            return Ok(());
        }
        self.created.remove(table);
        self.dropped.insert(table.to_string());
        self.ops.push(LogOp::DropTable {
            table: table.to_string(),
        });
        Ok(())
    }

    pub fn clear_table(&mut self, table: &str) -> StorageResult<()> {
        self.require(table)?;
        self.ops.push(LogOp::ClearTable {
            table: table.to_string(),
        });
        Ok(())
    }

    pub fn put(&mut self, table: &str, key: &str, payload: Vec<u8>) -> StorageResult<()> {
        self.require(table)?;
        self.ops.push(LogOp::Put {
            table: table.to_string(),
            key: key.to_string(),
            payload,
        });
        Ok(())
    }

    pub fn delete(&mut self, table: &str, key: &str) -> StorageResult<()> {
        self.require(table)?;
        self.ops.push(LogOp::Delete {
            table: table.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    /// Writes all staged ops as one frame and applies them.
    ///
    /// A transaction with no staged ops commits without touching the log.
    pub fn commit(self) -> StorageResult<CommitInfo> {
        let ops = self.ops.len();
        if ops == 0 {
            return Ok(CommitInfo {
                seq: self.store.last_seq(),
                timestamp: self.timestamp,
                ops,
            });
        }

        let seq = self.store.last_seq() + 1;
        self.store.write_frame(seq, self.timestamp, self.ops)?;

        tracing::debug!(
            target: "oakdb::store",
            event = "COMMIT",
            seq,
            ops,
            "transaction committed"
        );

        Ok(CommitInfo {
            seq,
            timestamp: self.timestamp,
            ops,
        })
    }

    fn require(&self, table: &str) -> StorageResult<()> {
        if self.table_exists(table) {
            Ok(())
        } else {
            Err(StorageError::data_corruption(format!(
                "table '{}' does not exist",
                table
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_transaction_leaves_no_trace() {
        let mut store = Store::in_memory();
        {
            let mut tx = store.begin();
            tx.create_table("t").unwrap();
            tx.put("t", "a", b"x".to_vec()).unwrap();
        }
        assert!(!store.has_table("t"));
        assert_eq!(store.last_seq(), 0);
    }

    #[test]
    fn test_reads_see_committed_state() {
        let mut store = Store::in_memory();
        let mut tx = store.begin();
        tx.create_table("t").unwrap();
        tx.put("t", "a", b"x".to_vec()).unwrap();
        assert!(tx.table_exists("t"));
        assert!(!tx.store().has_table("t"));
        tx.commit().unwrap();
        assert!(store.contains("t", "a"));
    }

    #[test]
    fn test_put_into_missing_table_rejected() {
        let mut store = Store::in_memory();
        let mut tx = store.begin();
        assert!(tx.put("nope", "a", Vec::new()).is_err());
    }

    #[test]
    fn test_drop_then_recreate_in_one_transaction() {
        let mut store = Store::in_memory();
        let mut tx = store.begin();
        tx.create_table("t").unwrap();
        tx.put("t", "a", b"x".to_vec()).unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin();
        tx.drop_table("t").unwrap();
        assert!(!tx.table_exists("t"));
        tx.create_table("t").unwrap();
        tx.put("t", "b", b"y".to_vec()).unwrap();
        tx.commit().unwrap();

        assert!(!store.contains("t", "a"));
        assert!(store.contains("t", "b"));
    }

    #[test]
    fn test_empty_commit_does_not_advance_sequence() {
        let mut store = Store::in_memory();
        let info = store.begin().commit().unwrap();
        assert_eq!(info.ops, 0);
        assert_eq!(store.last_seq(), 0);
    }
}
