//! Error taxonomy for index generation and parsing.
//!
//! Every variant is terminal for the call that produced it: format and
//! crypto failures are never transient, so nothing is retried internally and
//! no partial container or document is ever returned alongside an error.

use std::io;
use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::CryptoError;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid stream magic: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: String, found: String },
    #[error("Unsupported compression flag 0x{0:02X}")]
    UnsupportedCompression(u8),
    #[error("Unsupported encryption flag 0x{0:02X}")]
    UnsupportedEncryption(u8),
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),
    #[error("Truncated input: {what} needs {expected} bytes, only {actual} available")]
    TruncatedInput {
        what: &'static str,
        expected: u64,
        actual: u64,
    },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Blob of {0} bytes does not fit the 32-bit length field")]
    BlobTooLarge(usize),
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<CodecError> for IndexError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::UnsupportedCompression(id) => IndexError::UnsupportedCompression(id),
            CodecError::Compression(msg) => IndexError::Compression(msg),
            CodecError::Decompression(msg) => IndexError::CorruptPayload(msg),
        }
    }
}

impl From<CryptoError> for IndexError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::EncryptionFailed(msg) => IndexError::EncryptionFailed(msg),
            CryptoError::DecryptionFailed(msg) => IndexError::DecryptionFailed(msg),
            CryptoError::InvalidKey(msg) => IndexError::InvalidKey(msg),
            CryptoError::Io(e) => IndexError::Io(e),
        }
    }
}
