//! CRC32 checksums for commit frames
//!
//! Every frame carries a CRC32 (IEEE) over its length prefix and body.

use crc32fast::Hasher;

pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
