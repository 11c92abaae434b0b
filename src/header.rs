//! Fixed 272-byte container header.
//!
//! ```text
//! 0x000  7    magic        "TINFOIL"
//! 0x007  1    flags        low nibble = compression id, high nibble = encryption
//! 0x008  256  key-slot     RSA-wrapped session key, all zero when unencrypted
//! 0x108  8    payload-len  u64 LE, unpadded payload length
//! 0x110       payload
//! ```
//!
//! The key-slot is always present, so the payload-length field and the
//! payload start never move regardless of the flags.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::CompressionId;
use crate::crypto::WRAPPED_KEY_LEN;
use crate::error::IndexError;

pub const MAGIC: &[u8; 7] = b"TINFOIL";
pub const FLAGS_OFFSET: usize = 0x07;
pub const KEY_SLOT_OFFSET: usize = 0x08;
pub const KEY_SLOT_SIZE: usize = WRAPPED_KEY_LEN;
pub const PAYLOAD_LEN_OFFSET: usize = KEY_SLOT_OFFSET + KEY_SLOT_SIZE;
pub const HEADER_SIZE: usize = PAYLOAD_LEN_OFFSET + 8;

pub const COMPRESSION_MASK: u8 = 0x0F;
pub const ENCRYPTION_MASK: u8 = 0xF0;

/// Encryption state carried in the high nibble of the flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Encryption {
    Unencrypted = 0x00,
    Encrypted = 0xF0,
}

impl Encryption {
    pub fn from_bits(bits: u8) -> Result<Self, IndexError> {
        match bits & ENCRYPTION_MASK {
            0x00 => Ok(Encryption::Unencrypted),
            0xF0 => Ok(Encryption::Encrypted),
            other => Err(IndexError::UnsupportedEncryption(other)),
        }
    }

    #[inline]
    pub fn is_encrypted(self) -> bool {
        self == Encryption::Encrypted
    }
}

/// Both halves of the flag byte.  They occupy disjoint bits and are always
/// combined with bit-OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub compression: CompressionId,
    pub encryption: Encryption,
}

impl Flags {
    pub fn new(compression: CompressionId, encryption: Encryption) -> Self {
        Self { compression, encryption }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        (self.compression.nibble() & COMPRESSION_MASK) | (self.encryption as u8 & ENCRYPTION_MASK)
    }

    pub fn from_byte(byte: u8) -> Result<Self, IndexError> {
        let encryption = Encryption::from_bits(byte)?;
        let compression = CompressionId::from_nibble(byte & COMPRESSION_MASK)?;
        Ok(Self { compression, encryption })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub flags: Flags,
    pub key_slot: [u8; KEY_SLOT_SIZE],
    /// Unpadded payload length.
    pub payload_len: u64,
}

impl IndexHeader {
    pub fn new(flags: Flags, payload_len: u64) -> Self {
        Self {
            flags,
            key_slot: [0u8; KEY_SLOT_SIZE],
            payload_len,
        }
    }

    /// Bytes the payload occupies on disk: the recorded length, rounded up
    /// to the cipher block when encrypted.  `None` if that overflows.
    pub fn stored_payload_len(&self) -> Option<u64> {
        if self.flags.encryption.is_encrypted() {
            crate::crypto::padded_len(self.payload_len)
        } else {
            Some(self.payload_len)
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u8(self.flags.to_byte())?;
        writer.write_all(&self.key_slot)?;
        writer.write_u64::<LittleEndian>(self.payload_len)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..MAGIC.len()].copy_from_slice(MAGIC);
        out[FLAGS_OFFSET] = self.flags.to_byte();
        out[KEY_SLOT_OFFSET..PAYLOAD_LEN_OFFSET].copy_from_slice(&self.key_slot);
        out[PAYLOAD_LEN_OFFSET..HEADER_SIZE].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    /// Check the magic against whatever prefix of `buf` exists.
    ///
    /// A buffer whose leading bytes differ from the magic is `InvalidMagic`
    /// even when it is too short to hold a header.
    pub fn check_magic(buf: &[u8]) -> Result<(), IndexError> {
        let n = buf.len().min(MAGIC.len());
        if buf[..n] != MAGIC[..n] {
            return Err(IndexError::InvalidMagic {
                expected: String::from_utf8_lossy(MAGIC).into_owned(),
                found: String::from_utf8_lossy(&buf[..n]).into_owned(),
            });
        }
        Ok(())
    }

    /// Parse the header at the start of `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self, IndexError> {
        Self::check_magic(buf)?;
        if buf.len() < HEADER_SIZE {
            return Err(IndexError::TruncatedInput {
                what: "header",
                expected: HEADER_SIZE as u64,
                actual: buf.len() as u64,
            });
        }
        Self::read(&buf[..HEADER_SIZE])
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, IndexError> {
        let mut magic = [0u8; 7];
        reader.read_exact(&mut magic)?;
        Self::check_magic(&magic)?;
        let flags = Flags::from_byte(reader.read_u8()?)?;
        let mut key_slot = [0u8; KEY_SLOT_SIZE];
        reader.read_exact(&mut key_slot)?;
        let payload_len = reader.read_u64::<LittleEndian>()?;
        Ok(Self { flags, key_slot, payload_len })
    }
}
