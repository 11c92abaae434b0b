//! Embedded blob segment.
//!
//! An optional auxiliary payload travels inside the compressed region, ahead
//! of the metadata JSON:
//!
//! ```text
//! 0   4   sentinel  13 37 B0 0B
//! 4   4   length    u32 LE
//! 8   N   blob bytes
//! ```
//!
//! A region that does not start with the sentinel carries no blob.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::IndexError;

pub const BLOB_MAGIC: [u8; 4] = [0x13, 0x37, 0xB0, 0x0B];
pub const BLOB_HEADER_SIZE: usize = 8;

/// Append a blob segment for `blob` to `out`.  Empty blobs are not written.
pub fn encode_segment(blob: &[u8], out: &mut Vec<u8>) -> Result<(), IndexError> {
    if blob.is_empty() {
        return Ok(());
    }
    let len = u32::try_from(blob.len()).map_err(|_| IndexError::BlobTooLarge(blob.len()))?;
    out.reserve(BLOB_HEADER_SIZE + blob.len());
    out.extend_from_slice(&BLOB_MAGIC);
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(blob);
    Ok(())
}

/// Split a decompressed region into `(blob, metadata)`.
///
/// Too-short input is never silently treated as "no blob": a region that is
/// a strict prefix of the sentinel, or that carries the sentinel but not a
/// complete length field and blob, is `CorruptPayload`.
pub fn split_segment(region: &[u8]) -> Result<(Option<&[u8]>, &[u8]), IndexError> {
    if region.len() < BLOB_MAGIC.len() {
        if !region.is_empty() && BLOB_MAGIC.starts_with(region) {
            return Err(IndexError::CorruptPayload(format!(
                "{}-byte region is a truncated blob sentinel",
                region.len()
            )));
        }
        return Ok((None, region));
    }
    if region[..BLOB_MAGIC.len()] != BLOB_MAGIC {
        return Ok((None, region));
    }
    if region.len() < BLOB_HEADER_SIZE {
        return Err(IndexError::CorruptPayload(format!(
            "blob sentinel present but region is only {} bytes",
            region.len()
        )));
    }

    let mut cursor = Cursor::new(&region[BLOB_MAGIC.len()..BLOB_HEADER_SIZE]);
    let blob_len = cursor.read_u32::<LittleEndian>()? as usize;
    let rest = &region[BLOB_HEADER_SIZE..];
    if blob_len > rest.len() {
        return Err(IndexError::CorruptPayload(format!(
            "blob declares {blob_len} bytes, only {} follow",
            rest.len()
        )));
    }
    let (blob, metadata) = rest.split_at(blob_len);
    Ok((Some(blob), metadata))
}
