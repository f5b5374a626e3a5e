//! Append-only log writer
//!
//! - Each commit frame is written with a single `write_all`
//! - `fsync` follows when the store is configured to sync on commit
//! - A failed write truncates the file back to its pre-frame length
//!
//! The log is never rewritten in place.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::record::{CommitFrame, LOG_MAGIC};

/// Writer that appends commit frames to the log file.
pub struct LogWriter {
    path: PathBuf,
    file: File,
    len: u64,
}

impl LogWriter {
    /// Opens or creates the log file, keeping only its first `valid_len` bytes.
    ///
    /// Writes the magic header when the retained prefix is empty. Creates parent
    /// directories if needed.
    pub fn open(path: &Path, valid_len: u64) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::io_error(
                        format!("Failed to create directory: {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                StorageError::io_error(format!("Failed to open log file: {}", path.display()), e)
            })?;

        let current_len = file
            .metadata()
            .map_err(|e| StorageError::io_error("Failed to read log metadata", e))?
            .len();

        let mut writer = Self {
            path: path.to_path_buf(),
            file,
            len: current_len,
        };

        if current_len > valid_len {
            writer.truncate(valid_len)?;
        }

        if writer.len == 0 {
            writer.file.write_all(LOG_MAGIC).map_err(|e| {
                StorageError::write_failed("Failed to write log header", e)
            })?;
            writer.sync()?;
            writer.len = LOG_MAGIC.len() as u64;
        }

        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len <= LOG_MAGIC.len() as u64
    }

    /// Appends one frame. Returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns `OAK_STORAGE_WRITE_FAILED` if the write or fsync fails. The file is
    /// truncated back to its previous length before the error is returned.
    pub fn append(&mut self, frame: &CommitFrame, sync: bool) -> StorageResult<u64> {
        let bytes = frame.serialize();
        let offset = self.len;

        if let Err(e) = self.file.write_all(&bytes) {
            self.rollback_to(offset);
            return Err(StorageError::write_failed(
                format!("Failed to write commit frame {}", frame.seq),
                e,
            ));
        }

        if sync {
            if let Err(e) = self.file.sync_data() {
                self.rollback_to(offset);
                return Err(StorageError::write_failed(
                    format!("fsync failed after commit frame {}", frame.seq),
                    e,
                ));
            }
        }

        self.len += bytes.len() as u64;
        Ok(offset)
    }

    /// Forces buffered data to disk.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.file
            .sync_all()
            .map_err(|e| StorageError::write_failed("fsync failed", e))
    }

    /// Truncates the file to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> StorageResult<()> {
        self.file.set_len(len).map_err(|e| {
            StorageError::io_error(format!("Failed to truncate log to {} bytes", len), e)
        })?;
        self.len = len;
        self.sync()
    }

    fn rollback_to(&mut self, len: u64) {
        if let Err(e) = self.file.set_len(len) {
            tracing::error!(
                target: "oakdb::store",
                event = "LOG_TRUNCATE_FAILED",
                len,
                error = %e,
                "could not truncate partial frame"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::reader::LogReader;
    use crate::storage::record::LogOp;
    use tempfile::TempDir;

    fn frame(seq: u64) -> CommitFrame {
        CommitFrame::new(
            seq,
            1,
            vec![LogOp::Put {
                table: "t".into(),
                key: format!("k{}", seq),
                payload: b"{}".to_vec(),
            }],
        )
    }

    #[test]
    fn test_open_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oak.db");
        let writer = LogWriter::open(&path, 0).unwrap();
        assert_eq!(writer.len(), LOG_MAGIC.len() as u64);
        assert!(writer.is_empty());
        assert_eq!(fs::read(&path).unwrap(), LOG_MAGIC.to_vec());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("oak.db");
        LogWriter::open(&path, 0).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_append_then_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oak.db");
        let mut writer = LogWriter::open(&path, 0).unwrap();

        let first = writer.append(&frame(1), true).unwrap();
        let second = writer.append(&frame(2), false).unwrap();
        assert_eq!(first, LOG_MAGIC.len() as u64);
        assert!(second > first);

        let mut reader = LogReader::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap().unwrap(), frame(1));
        assert_eq!(reader.read_next().unwrap().unwrap(), frame(2));
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_open_discards_bytes_past_valid_len() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oak.db");
        let valid = {
            let mut writer = LogWriter::open(&path, 0).unwrap();
            writer.append(&frame(1), true).unwrap();
            let valid = writer.len();
            writer.append(&frame(2), true).unwrap();
            valid
        };

        let writer = LogWriter::open(&path, valid).unwrap();
        assert_eq!(writer.len(), valid);
        assert_eq!(fs::metadata(&path).unwrap().len(), valid);
    }
}
