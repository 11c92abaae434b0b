//! Index generation and parsing.
//!
//! # Write path
//! [`generate`] serializes the document, prefixes the optional blob segment,
//! compresses, pads and encrypts when requested, then prepends the 272-byte
//! header.  Nothing is returned unless every step succeeds.
//!
//! # Read path
//! [`parse`] is the exact mirror: header, optional decryption, decompression,
//! blob splice, JSON.
//!
//! # Integrity of encrypted payloads
//! AES-ECB carries no authentication tag.  Once a payload has been decrypted,
//! any failure further down (padding, decompression, blob framing, JSON) is
//! reported as [`IndexError::DecryptionFailed`]: with a wrong key or a damaged
//! ciphertext that is the first point at which the damage becomes visible.

use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use crate::blob;
use crate::codec::{self, CompressionId};
use crate::crypto::{self, SessionKey};
use crate::error::IndexError;
use crate::header::{Encryption, Flags, IndexHeader, HEADER_SIZE};
use crate::index::IndexDocument;

/// Result of [`parse`]: the document plus the embedded blob, if one was present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIndex {
    pub document: IndexDocument,
    pub blob: Option<Vec<u8>>,
}

/// Build a complete index container.
///
/// `public_key` is required when `encryption` is [`Encryption::Encrypted`];
/// `blob` is embedded only when present and non-empty.
pub fn generate(
    document: &IndexDocument,
    encryption: Encryption,
    compression: CompressionId,
    public_key: Option<&RsaPublicKey>,
    blob: Option<&[u8]>,
) -> Result<Vec<u8>, IndexError> {
    let recipient = match (encryption, public_key) {
        (Encryption::Encrypted, None) => {
            return Err(IndexError::MissingCredential(
                "cannot encrypt index: no recipient public key was provided",
            ))
        }
        (Encryption::Encrypted, Some(key)) => Some(key),
        (Encryption::Unencrypted, _) => None,
    };

    let mut raw = Vec::new();
    if let Some(blob) = blob {
        blob::encode_segment(blob, &mut raw)?;
    }
    raw.extend_from_slice(&document.to_json()?);

    let compressed = codec::compress(&raw, compression)?;
    let payload_len = compressed.len() as u64;
    let mut header = IndexHeader::new(Flags::new(compression, encryption), payload_len);

    let payload = match recipient {
        Some(key) => {
            let session = SessionKey::generate();
            header.key_slot = crypto::wrap_session_key(key, &session)?;
            crypto::encrypt_payload(&session, compressed)
        }
        None => compressed,
    };

    debug!(
        flags = %format!("0x{:02X}", header.flags.to_byte()),
        raw_len = raw.len(),
        payload_len,
        stored_len = payload.len(),
        blob_len = blob.map_or(0, <[u8]>::len),
        "generated index"
    );

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    header.write(&mut out)?;
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse an index container.
///
/// `private_key` is required only when the container is encrypted.
pub fn parse(buffer: &[u8], private_key: Option<&RsaPrivateKey>) -> Result<ParsedIndex, IndexError> {
    let header = IndexHeader::parse(buffer)?;
    let flags = header.flags;

    let available = (buffer.len() - HEADER_SIZE) as u64;
    let stored_len = header.stored_payload_len().unwrap_or(u64::MAX);
    if stored_len > available {
        return Err(IndexError::TruncatedInput {
            what: "payload",
            expected: stored_len,
            actual: available,
        });
    }
    let stored = &buffer[HEADER_SIZE..HEADER_SIZE + stored_len as usize];

    debug!(
        flags = %format!("0x{:02X}", flags.to_byte()),
        compression = %flags.compression,
        encrypted = flags.encryption.is_encrypted(),
        payload_len = header.payload_len,
        "parsing index"
    );

    if !flags.encryption.is_encrypted() {
        return decode_payload(stored, flags.compression);
    }

    let private_key = private_key.ok_or(IndexError::MissingCredential(
        "cannot read encrypted index without a private key",
    ))?;
    let session = crypto::unwrap_session_key(private_key, &header.key_slot)?;
    let decrypted = crypto::decrypt_payload(&session, stored, header.payload_len as usize)?;

    decode_payload(&decrypted, flags.compression).map_err(|e| match e {
        IndexError::CorruptPayload(msg) => {
            IndexError::DecryptionFailed(format!("payload did not verify after decryption: {msg}"))
        }
        other => other,
    })
}

/// Decompress, splice out the blob and parse the metadata JSON.
fn decode_payload(payload: &[u8], compression: CompressionId) -> Result<ParsedIndex, IndexError> {
    let region = codec::decompress(payload, compression)?;
    let (blob, metadata) = blob::split_segment(&region)?;
    let document = IndexDocument::from_json(metadata)?;
    if let Some(b) = blob {
        debug!(blob_len = b.len(), "embedded blob found");
    }
    Ok(ParsedIndex {
        document,
        blob: blob.map(<[u8]>::to_vec),
    })
}

// ── IndexCodec ───────────────────────────────────────────────────────────────

/// Generation defaults plus the configured recipient key.
///
/// The key is fixed at construction and never mutated, so one codec can be
/// shared freely between threads.
#[derive(Debug, Clone)]
pub struct IndexCodec {
    public_key: Option<RsaPublicKey>,
    pub compression: CompressionId,
    pub encryption: Encryption,
}

impl Default for IndexCodec {
    fn default() -> Self {
        Self {
            public_key: None,
            compression: CompressionId::Zstd,
            encryption: Encryption::Encrypted,
        }
    }
}

impl IndexCodec {
    /// A codec with no recipient key.  Encrypted generation fails until one
    /// is supplied.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public_key(public_key: RsaPublicKey) -> Self {
        Self {
            public_key: Some(public_key),
            ..Self::default()
        }
    }

    /// A codec using the process-wide key installed with
    /// [`crate::crypto::set_default_public_key`], if any.
    pub fn from_process_default() -> Self {
        Self {
            public_key: crypto::default_public_key().cloned(),
            ..Self::default()
        }
    }

    pub fn with_compression(mut self, compression: CompressionId) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    pub fn public_key(&self) -> Option<&RsaPublicKey> {
        self.public_key.as_ref()
    }

    /// Generate with this codec's defaults.
    pub fn generate(&self, document: &IndexDocument, blob: Option<&[u8]>) -> Result<Vec<u8>, IndexError> {
        generate(document, self.encryption, self.compression, self.public_key.as_ref(), blob)
    }

    /// Generate with explicit flags, still using the configured key.
    pub fn generate_with(
        &self,
        document: &IndexDocument,
        encryption: Encryption,
        compression: CompressionId,
        blob: Option<&[u8]>,
    ) -> Result<Vec<u8>, IndexError> {
        generate(document, encryption, compression, self.public_key.as_ref(), blob)
    }

    pub fn parse(&self, buffer: &[u8], private_key: Option<&RsaPrivateKey>) -> Result<ParsedIndex, IndexError> {
        parse(buffer, private_key)
    }
}
