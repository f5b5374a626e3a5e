//! Commit frame format
//!
//! The log file starts with the 8-byte magic `OAKLOG01`, followed by frames:
//!
//! ```text
//! +------------------+
//! | Frame Length     | (u32 LE, includes this field and the checksum)
//! +------------------+
//! | Sequence         | (u64 LE)
//! +------------------+
//! | Timestamp        | (i64 LE, commit clock in microseconds)
//! +------------------+
//! | Op Count         | (u32 LE)
//! +------------------+
//! | Ops              | (tag u8, table str, key str, payload bytes)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Strings and byte payloads are u32 LE length-prefixed.
//! Checksum covers all bytes except the checksum itself.

use std::io::{self, Cursor, Read};

use super::checksum::compute_checksum;

/// Magic header at offset 0 of every log file
pub const LOG_MAGIC: &[u8; 8] = b"OAKLOG01";

/// length + seq + timestamp + op_count + checksum
pub const MIN_FRAME_SIZE: usize = 4 + 8 + 8 + 4 + 4;

/// On-disk operation tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpTag {
    Put = 0,
    Delete = 1,
    CreateTable = 2,
    DropTable = 3,
    ClearTable = 4,
}

impl OpTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OpTag::Put),
            1 => Some(OpTag::Delete),
            2 => Some(OpTag::CreateTable),
            3 => Some(OpTag::DropTable),
            4 => Some(OpTag::ClearTable),
            _ => None,
        }
    }
}

/// A single staged table operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    Put {
        table: String,
        key: String,
        payload: Vec<u8>,
    },
    Delete {
        table: String,
        key: String,
    },
    CreateTable {
        table: String,
    },
    DropTable {
        table: String,
    },
    ClearTable {
        table: String,
    },
}

impl LogOp {
    pub fn tag(&self) -> OpTag {
        match self {
            LogOp::Put { .. } => OpTag::Put,
            LogOp::Delete { .. } => OpTag::Delete,
            LogOp::CreateTable { .. } => OpTag::CreateTable,
            LogOp::DropTable { .. } => OpTag::DropTable,
            LogOp::ClearTable { .. } => OpTag::ClearTable,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            LogOp::Put { table, .. }
            | LogOp::Delete { table, .. }
            | LogOp::CreateTable { table }
            | LogOp::DropTable { table }
            | LogOp::ClearTable { table } => table,
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.tag() as u8);
        write_bytes(buf, self.table().as_bytes());
        match self {
            LogOp::Put { key, payload, .. } => {
                write_bytes(buf, key.as_bytes());
                write_bytes(buf, payload);
            }
            LogOp::Delete { key, .. } => {
                write_bytes(buf, key.as_bytes());
                write_bytes(buf, &[]);
            }
            _ => {
                write_bytes(buf, &[]);
                write_bytes(buf, &[]);
            }
        }
    }

    fn decode<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut tag_buf = [0u8; 1];
        reader.read_exact(&mut tag_buf)?;
        let tag = OpTag::from_u8(tag_buf[0]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown op tag: {}", tag_buf[0]),
            )
        })?;

        let table = read_string(reader)?;
        let key = read_string(reader)?;
        let payload = read_bytes(reader)?;

        Ok(match tag {
            OpTag::Put => LogOp::Put {
                table,
                key,
                payload,
            },
            OpTag::Delete => LogOp::Delete { table, key },
            OpTag::CreateTable => LogOp::CreateTable { table },
            OpTag::DropTable => LogOp::DropTable { table },
            OpTag::ClearTable => LogOp::ClearTable { table },
        })
    }
}

/// One committed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFrame {
    pub seq: u64,
    pub timestamp_micros: i64,
    pub ops: Vec<LogOp>,
}

impl CommitFrame {
    pub fn new(seq: u64, timestamp_micros: i64, ops: Vec<LogOp>) -> Self {
        Self {
            seq,
            timestamp_micros,
            ops,
        }
    }

    fn serialize_body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.seq.to_le_bytes());
        buf.extend_from_slice(&self.timestamp_micros.to_le_bytes());
        buf.extend_from_slice(&(self.ops.len() as u32).to_le_bytes());
        for op in &self.ops {
            op.encode(&mut buf);
        }
        buf
    }

    /// Serialize the complete frame, length prefix and checksum included.
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.serialize_body();
        let frame_length = (4 + body.len() + 4) as u32;

        let mut frame = Vec::with_capacity(frame_length as usize);
        frame.extend_from_slice(&frame_length.to_le_bytes());
        frame.extend_from_slice(&body);
        let checksum = compute_checksum(&frame);
        frame.extend_from_slice(&checksum.to_le_bytes());

        frame
    }

    /// Deserialize a frame, verifying its checksum.
    ///
    /// Returns the frame and the number of bytes consumed. Short input yields
    /// `UnexpectedEof`; anything else wrong with a complete frame is `InvalidData`.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < 4 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Frame too short",
            ));
        }

        let frame_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if frame_length < MIN_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid frame length: {}", frame_length),
            ));
        }

        if data.len() < frame_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Frame truncated: expected {} bytes, got {}",
                    frame_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = frame_length - 4;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        let computed_checksum = compute_checksum(&data[0..checksum_offset]);

        if computed_checksum != stored_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    computed_checksum, stored_checksum
                ),
            ));
        }

        let body = &data[4..checksum_offset];
        let mut cursor = Cursor::new(body);

        let mut u64_buf = [0u8; 8];
        cursor.read_exact(&mut u64_buf)?;
        let seq = u64::from_le_bytes(u64_buf);
        cursor.read_exact(&mut u64_buf)?;
        let timestamp_micros = i64::from_le_bytes(u64_buf);

        let mut u32_buf = [0u8; 4];
        cursor.read_exact(&mut u32_buf)?;
        let op_count = u32::from_le_bytes(u32_buf) as usize;

        let mut ops = Vec::with_capacity(op_count.min(1024));
        for _ in 0..op_count {
            // A frame whose checksum matched but whose body is short is invalid, not torn
            let op = LogOp::decode(&mut cursor).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, format!("Bad op: {}", e))
            })?;
            ops.push(op);
        }

        if cursor.position() as usize != body.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Trailing bytes after last op",
            ));
        }

        Ok((
            Self {
                seq,
                timestamp_micros,
                ops,
            },
            frame_length,
        ))
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn read_bytes<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let buf = read_bytes(reader)?;
    String::from_utf8(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> CommitFrame {
        CommitFrame::new(
            7,
            1_700_000_000_000_000,
            vec![
                LogOp::CreateTable {
                    table: "users".into(),
                },
                LogOp::Put {
                    table: "users".into(),
                    key: "alice".into(),
                    payload: br#"{"value":{"age":30}}"#.to_vec(),
                },
                LogOp::Delete {
                    table: "users".into(),
                    key: "bob".into(),
                },
            ],
        )
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = sample_frame();
        let bytes = frame.serialize();
        let (decoded, consumed) = CommitFrame::deserialize(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut bytes = sample_frame().serialize();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;

        let err = CommitFrame::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn test_truncated_frame_is_eof() {
        let bytes = sample_frame().serialize();
        let err = CommitFrame::deserialize(&bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(OpTag::from_u8(4), Some(OpTag::ClearTable));
        assert_eq!(OpTag::from_u8(9), None);
    }
}
