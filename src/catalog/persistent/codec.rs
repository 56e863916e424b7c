//! Snapshot file framing.
//!
//! A snapshot file is a header followed by one checksummed frame:
//!
//! ```text
//! [magic: 4 bytes "HWCT"][version: 1 byte]
//! [length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
//! ```

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Magic bytes identifying catalog snapshot files.
pub const MAGIC: [u8; 4] = *b"HWCT";

/// Frames larger than this are rejected without allocating.
const MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

fn invalid(message: String) -> IoError {
    IoError::new(ErrorKind::InvalidData, message)
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Writes the file header.
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[FORMAT_VERSION])
}

/// Reads and validates the file header.
pub fn read_header(reader: &mut impl Read) -> IoResult<()> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(invalid(format!("not a catalog snapshot: magic {magic:?}")));
    }
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported snapshot version {} (expected {FORMAT_VERSION})",
            version[0]
        )));
    }
    Ok(())
}

/// Serializes `value` into a checksummed frame.
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let data = serde_json::to_vec(value).map_err(|e| invalid(format!("serialization failed: {e}")))?;
    let len = u32::try_from(data.len()).map_err(|_| invalid(format!("frame of {} bytes is too large", data.len())))?;

    let mut out = Vec::with_capacity(4 + data.len() + 4);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&checksum(&data).to_le_bytes());
    Ok(out)
}

/// Reads one frame, verifying its checksum.
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> IoResult<T> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(invalid(format!("frame size {len} exceeds maximum {MAX_FRAME_SIZE}")));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(&data);
    if stored != computed {
        return Err(invalid(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x}"
        )));
    }

    serde_json::from_slice(&data).map_err(|e| invalid(format!("deserialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn detects_corruption() {
        let mut encoded = encode(&vec!["rtx-4090".to_string()]).unwrap();
        encoded[6] ^= 0xFF;
        let err = decode::<Vec<String>>(&mut Cursor::new(encoded)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_oversized_frames() {
        let bad = (u32::MAX).to_le_bytes().to_vec();
        let err = decode::<String>(&mut Cursor::new(bad)).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn rejects_foreign_files() {
        let err = read_header(&mut Cursor::new(b"KYRO\x01".to_vec())).unwrap_err();
        assert!(err.to_string().contains("not a catalog snapshot"));

        let mut ok = Vec::new();
        write_header(&mut ok).unwrap();
        read_header(&mut Cursor::new(ok)).unwrap();
    }
}
