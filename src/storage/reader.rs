//! Log reader used for replay on open
//!
//! - The magic header is verified before any frame is read
//! - Every frame is checksum-verified
//! - A frame cut short by the end of the file is a torn tail: replay stops there
//! - A complete frame with a bad checksum is fatal corruption

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::record::{CommitFrame, LOG_MAGIC, MIN_FRAME_SIZE};

/// Sequential reader over a commit log file.
pub struct LogReader {
    path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
    torn_at: Option<u64>,
}

impl LogReader {
    /// Opens the log file and validates its header.
    ///
    /// A file shorter than the header is treated as a torn header: no frames,
    /// valid length zero.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path).map_err(|e| {
            StorageError::read_failed(format!("Failed to open log file: {}", path.display()), e)
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| StorageError::io_error("Failed to read log metadata", e))?
            .len();

        let mut reader = Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
            torn_at: None,
        };

        if file_size == 0 {
            return Ok(reader);
        }

        let header_len = LOG_MAGIC.len() as u64;
        if file_size < header_len {
            reader.torn_at = Some(0);
            return Ok(reader);
        }

        let mut magic = [0u8; 8];
        reader
            .reader
            .read_exact(&mut magic)
            .map_err(|e| StorageError::read_failed("Failed to read log header", e))?;
        if &magic != LOG_MAGIC {
            return Err(StorageError::corruption_at_offset(0, "Bad log header"));
        }
        reader.current_offset = header_len;

        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte length of the verified prefix of the file
    pub fn valid_len(&self) -> u64 {
        self.current_offset
    }

    /// Offset of a discarded partial frame, if replay hit one
    pub fn torn_at(&self) -> Option<u64> {
        self.torn_at
    }

    /// Reads the next frame.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(frame))` if a complete, verified frame was read
    /// - `Ok(None)` at end of file or at a torn tail
    /// - `Err(OAK_DATA_CORRUPTION)` if a complete frame fails verification (FATAL)
    pub fn read_next(&mut self) -> StorageResult<Option<CommitFrame>> {
        if self.torn_at.is_some() || self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < 4 {
            self.torn_at = Some(self.current_offset);
            return Ok(None);
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to read frame length at {}", self.current_offset),
                e,
            )
        })?;
        let frame_length = u32::from_le_bytes(len_buf) as u64;

        if frame_length < MIN_FRAME_SIZE as u64 {
            return Err(StorageError::corruption_at_offset(
                self.current_offset,
                format!("Invalid frame length: {}", frame_length),
            ));
        }

        if frame_length > remaining {
            self.torn_at = Some(self.current_offset);
            return Ok(None);
        }

        let mut frame_buf = vec![0u8; frame_length as usize];
        frame_buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut frame_buf[4..]).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to read frame body at {}", self.current_offset),
                e,
            )
        })?;

        let (frame, consumed) = CommitFrame::deserialize(&frame_buf)
            .map_err(|e| StorageError::corruption_at_offset(self.current_offset, e.to_string()))?;

        self.current_offset += consumed as u64;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::LogOp;
    use std::io::Write;
    use tempfile::TempDir;

    fn frame(seq: u64) -> CommitFrame {
        CommitFrame::new(
            seq,
            seq as i64 * 10,
            vec![LogOp::CreateTable {
                table: format!("t{}", seq),
            }],
        )
    }

    fn write_file(dir: &TempDir, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join("oak.db");
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_reads_all_frames() {
        let dir = TempDir::new().unwrap();
        let mut bytes = LOG_MAGIC.to_vec();
        bytes.extend(frame(1).serialize());
        bytes.extend(frame(2).serialize());
        let path = write_file(&dir, &bytes);

        let mut reader = LogReader::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap().unwrap().seq, 1);
        assert_eq!(reader.read_next().unwrap().unwrap().seq, 2);
        assert!(reader.read_next().unwrap().is_none());
        assert_eq!(reader.valid_len(), bytes.len() as u64);
        assert!(reader.torn_at().is_none());
    }

    #[test]
    fn test_torn_tail_stops_replay() {
        let dir = TempDir::new().unwrap();
        let mut bytes = LOG_MAGIC.to_vec();
        bytes.extend(frame(1).serialize());
        let good_len = bytes.len() as u64;
        let second = frame(2).serialize();
        bytes.extend(&second[..second.len() - 5]);
        let path = write_file(&dir, &bytes);

        let mut reader = LogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        assert!(reader.read_next().unwrap().is_none());
        assert_eq!(reader.valid_len(), good_len);
        assert_eq!(reader.torn_at(), Some(good_len));
    }

    #[test]
    fn test_checksum_mismatch_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut bytes = LOG_MAGIC.to_vec();
        let mut first = frame(1).serialize();
        let last = first.len() - 1;
        first[last] ^= 0xFF;
        bytes.extend(first);
        let path = write_file(&dir, &bytes);

        let mut reader = LogReader::open(&path).unwrap();
        let err = reader.read_next().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_bad_header_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"NOTOAK00");
        let err = LogReader::open(&path).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_short_header_is_torn() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"OAK");
        let mut reader = LogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_none());
        assert_eq!(reader.valid_len(), 0);
        assert_eq!(reader.torn_at(), Some(0));
    }
}
