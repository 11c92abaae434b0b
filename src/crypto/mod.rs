//! Hybrid encryption envelope for TINFOIL indexes.
//!
//! Session key: 16 random bytes (AES-128), fresh for every generated index.
//! Key wrap:    RSA-OAEP, SHA-256 digest and MGF1, empty label → 256 bytes
//! Payload:     AES-128-ECB over the zero-padded payload
//!
//! The wrapped key occupies the fixed 256-byte key-slot of the header, so the
//! recipient key must have a 2048-bit modulus.
//!
//! # Padding
//! The payload is zero-padded up to the next 16-byte boundary (nothing is
//! added when it is already aligned).  The header records the *unpadded*
//! length; [`padded_len`] derives the on-disk length from it, and
//! [`decrypt_payload`] checks that the padding bytes decrypt to zero before
//! truncating.

pub mod keys;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::io;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

pub use keys::{
    default_public_key, generate_keypair, load_private_key_pem, load_public_key_pem,
    public_key_fingerprint, set_default_public_key, write_keypair_pem,
};

/// Byte length of the AES-128 session key.
pub const SESSION_KEY_LEN: usize = 16;
/// AES block size; the encrypted payload is always a multiple of it.
pub const BLOCK_LEN: usize = 16;
/// Byte length of an RSA-2048 ciphertext, i.e. the header key-slot.
pub const WRAPPED_KEY_LEN: usize = 256;
/// Modulus size required of recipient keys.
pub const RSA_KEY_BITS: usize = WRAPPED_KEY_LEN * 8;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A one-time AES-128 key.  Wiped from memory on drop.
pub struct SessionKey(Zeroizing<[u8; SESSION_KEY_LEN]>);

impl SessionKey {
    /// Draw a fresh key from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; SESSION_KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

/// Reject recipient keys whose ciphertext would not fill the key-slot exactly.
pub fn check_key_size(modulus_bytes: usize) -> Result<(), CryptoError> {
    if modulus_bytes != WRAPPED_KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "RSA modulus is {} bits, the key-slot requires {RSA_KEY_BITS}",
            modulus_bytes * 8
        )));
    }
    Ok(())
}

/// Wrap `session` for `recipient` with RSA-OAEP(SHA-256, empty label).
pub fn wrap_session_key(
    recipient: &RsaPublicKey,
    session: &SessionKey,
) -> Result<[u8; WRAPPED_KEY_LEN], CryptoError> {
    check_key_size(recipient.size())?;
    let wrapped = recipient
        .encrypt(&mut OsRng, oaep(), session.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let mut slot = [0u8; WRAPPED_KEY_LEN];
    slot.copy_from_slice(&wrapped);
    Ok(slot)
}

/// Recover the session key from a key-slot.
///
/// Any failure (wrong key, tampered slot, wrong unwrapped length) is reported
/// as [`CryptoError::DecryptionFailed`].
pub fn unwrap_session_key(
    private_key: &RsaPrivateKey,
    slot: &[u8; WRAPPED_KEY_LEN],
) -> Result<SessionKey, CryptoError> {
    check_key_size(private_key.size())?;
    let mut unwrapped = private_key
        .decrypt(oaep(), slot)
        .map_err(|e| CryptoError::DecryptionFailed(format!("key-slot unwrap: {e}")))?;
    if unwrapped.len() != SESSION_KEY_LEN {
        let len = unwrapped.len();
        unwrapped.zeroize();
        return Err(CryptoError::DecryptionFailed(format!(
            "unwrapped session key is {len} bytes, expected {SESSION_KEY_LEN}"
        )));
    }
    let mut key = Zeroizing::new([0u8; SESSION_KEY_LEN]);
    key.copy_from_slice(&unwrapped);
    unwrapped.zeroize();
    Ok(SessionKey(key))
}

/// On-disk length of an encrypted payload whose unpadded length is `len`.
///
/// `None` when the padded length does not fit in a `u64`.
#[inline]
pub fn padded_len(len: u64) -> Option<u64> {
    len.checked_next_multiple_of(BLOCK_LEN as u64)
}

/// Zero-pad `payload` to the block boundary and encrypt it in place.
pub fn encrypt_payload(session: &SessionKey, mut payload: Vec<u8>) -> Vec<u8> {
    let padded = payload.len().next_multiple_of(BLOCK_LEN);
    payload.resize(padded, 0);
    let cipher = Aes128::new(GenericArray::from_slice(session.as_bytes()));
    for block in payload.chunks_exact_mut(BLOCK_LEN) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    payload
}

/// Decrypt a padded payload and truncate it to `unpadded_len`.
///
/// The padding bytes must decrypt to zero; anything else means the key or
/// the ciphertext is wrong.
pub fn decrypt_payload(
    session: &SessionKey,
    ciphertext: &[u8],
    unpadded_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::DecryptionFailed(format!(
            "ciphertext length {} is not a multiple of {BLOCK_LEN}",
            ciphertext.len()
        )));
    }
    if unpadded_len > ciphertext.len()
        || padded_len(unpadded_len as u64) != Some(ciphertext.len() as u64)
    {
        return Err(CryptoError::DecryptionFailed(format!(
            "recorded length {unpadded_len} does not match ciphertext length {}",
            ciphertext.len()
        )));
    }
    let cipher = Aes128::new(GenericArray::from_slice(session.as_bytes()));
    let mut plain = ciphertext.to_vec();
    for block in plain.chunks_exact_mut(BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    if plain[unpadded_len..].iter().any(|&b| b != 0) {
        plain.zeroize();
        return Err(CryptoError::DecryptionFailed(
            "padding bytes are not zero".to_string(),
        ));
    }
    plain.truncate(unpadded_len);
    Ok(plain)
}
