//! Key provisioning: PEM load/save, key generation and the process-wide
//! default recipient key.
//!
//! The private key is only ever handed to a single parse call; it is never
//! stored here.  The default public key is written once (usually at
//! startup) and is read-only afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use super::{check_key_size, CryptoError, RSA_KEY_BITS};

pub const PUBLIC_KEY_FILE: &str = "public.pem";
pub const PRIVATE_KEY_FILE: &str = "private.pem";

static DEFAULT_PUBLIC_KEY: OnceLock<RsaPublicKey> = OnceLock::new();

/// Install the process-wide default recipient key.
///
/// May be called once; a second call fails and leaves the first key in place.
pub fn set_default_public_key(key: RsaPublicKey) -> Result<(), CryptoError> {
    check_key_size(key.size())?;
    let fingerprint = public_key_fingerprint(&key)?;
    DEFAULT_PUBLIC_KEY
        .set(key)
        .map_err(|_| CryptoError::InvalidKey("default public key is already set".to_string()))?;
    debug!(%fingerprint, "default recipient key installed");
    Ok(())
}

pub fn default_public_key() -> Option<&'static RsaPublicKey> {
    DEFAULT_PUBLIC_KEY.get()
}

/// Generate a fresh RSA-2048 key pair.
pub fn generate_keypair() -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Load a recipient key from an SPKI (`PUBLIC KEY`) or PKCS#1
/// (`RSA PUBLIC KEY`) PEM file.
pub fn load_public_key_pem(path: &Path) -> Result<RsaPublicKey, CryptoError> {
    let pem = fs::read_to_string(path)?;
    let key = RsaPublicKey::from_public_key_pem(&pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(&pem))
        .map_err(|e| CryptoError::InvalidKey(format!("{}: {e}", path.display())))?;
    check_key_size(key.size())?;
    Ok(key)
}

/// Load a private key from a PKCS#8 (`PRIVATE KEY`) or PKCS#1
/// (`RSA PRIVATE KEY`) PEM file.
pub fn load_private_key_pem(path: &Path) -> Result<RsaPrivateKey, CryptoError> {
    let pem = zeroize::Zeroizing::new(fs::read_to_string(path)?);
    let key = RsaPrivateKey::from_pkcs8_pem(&pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
        .map_err(|e| CryptoError::InvalidKey(format!("{}: {e}", path.display())))?;
    check_key_size(key.size())?;
    Ok(key)
}

/// Write `private.pem` (PKCS#8) and `public.pem` (SPKI) into `dir`.
///
/// Returns `(public_path, private_path)`.
pub fn write_keypair_pem(dir: &Path, private_key: &RsaPrivateKey) -> Result<(PathBuf, PathBuf), CryptoError> {
    fs::create_dir_all(dir)?;
    let public_key = RsaPublicKey::from(private_key);

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let public_path = dir.join(PUBLIC_KEY_FILE);
    let private_path = dir.join(PRIVATE_KEY_FILE);
    fs::write(&public_path, public_pem.as_bytes())?;
    fs::write(&private_path, private_pem.as_bytes())?;
    Ok((public_path, private_path))
}

/// BLAKE3 over the DER-encoded SubjectPublicKeyInfo, hex encoded.
pub fn public_key_fingerprint(key: &RsaPublicKey) -> Result<String, CryptoError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(hex::encode(blake3::hash(der.as_bytes()).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pem_files_round_trip() {
        let dir = tempdir().unwrap();
        let private = generate_keypair().unwrap();
        let (public_path, private_path) = write_keypair_pem(dir.path(), &private).unwrap();

        let loaded_private = load_private_key_pem(&private_path).unwrap();
        let loaded_public = load_public_key_pem(&public_path).unwrap();
        assert_eq!(RsaPublicKey::from(&loaded_private), RsaPublicKey::from(&private));
        assert_eq!(loaded_public, RsaPublicKey::from(&private));
    }

    #[test]
    fn garbage_pem_is_invalid_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.pem");
        fs::write(&path, "-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----\n").unwrap();
        assert!(matches!(load_public_key_pem(&path), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn missing_pem_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_private_key_pem(&dir.path().join("absent.pem")),
            Err(CryptoError::Io(_))
        ));
    }

    #[test]
    fn fingerprint_is_stable_and_key_specific() {
        let a = RsaPublicKey::from(&generate_keypair().unwrap());
        let b = RsaPublicKey::from(&generate_keypair().unwrap());
        let fa = public_key_fingerprint(&a).unwrap();
        assert_eq!(fa.len(), 64);
        assert_eq!(fa, public_key_fingerprint(&a).unwrap());
        assert_ne!(fa, public_key_fingerprint(&b).unwrap());
    }
}
