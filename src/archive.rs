//! File-level API: load and save index containers and blobs on disk.
//!
//! ```no_run
//! use std::path::Path;
//! use tinfoil_index::archive::{read_blob_source, read_index_file, write_index_file};
//! use tinfoil_index::{CompressionId, Encryption, IndexDocument};
//!
//! let mut doc = IndexDocument::new();
//! doc.set_files(["https://example.org/game.nsp"]);
//! doc.add_success_message("Loaded index successfully!");
//!
//! let blob = read_blob_source(Path::new("theme.bin"))?;
//! let bytes = tinfoil_index::generate(
//!     &doc, Encryption::Unencrypted, CompressionId::Zstd, None, blob.as_deref(),
//! )?;
//! write_index_file(Path::new("index.tfl"), &bytes)?;
//!
//! let parsed = read_index_file(Path::new("index.tfl"), None, Some(Path::new("theme.out")))?;
//! assert_eq!(parsed.document, doc);
//! # Ok::<(), tinfoil_index::IndexError>(())
//! ```

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use rsa::RsaPrivateKey;
use tracing::debug;

use crate::container::{parse, ParsedIndex};
use crate::error::IndexError;

/// Load and parse an index file.
///
/// When the index carries a blob and `blob_export` is given, the blob is
/// written there.  Nothing is written if parsing fails.
pub fn read_index_file(
    path: &Path,
    private_key: Option<&RsaPrivateKey>,
    blob_export: Option<&Path>,
) -> Result<ParsedIndex, IndexError> {
    let buffer = {
        let mut file = File::open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        buf
    };
    let parsed = parse(&buffer, private_key)?;

    if let (Some(dest), Some(blob)) = (blob_export, parsed.blob.as_deref()) {
        let mut out = File::create(dest)?;
        out.write_all(blob)?;
        out.flush()?;
        debug!(path = %dest.display(), len = blob.len(), "exported embedded blob");
    }
    Ok(parsed)
}

/// Write a generated container to `path`, replacing any existing file.
pub fn write_index_file(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    debug!(path = %path.display(), len = bytes.len(), "wrote index");
    Ok(())
}

/// Read a blob source file.
///
/// A path that does not exist means "no blob" and yields `Ok(None)`; any
/// other I/O failure is an error.
pub fn read_blob_source(path: &Path) -> Result<Option<Vec<u8>>, IndexError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "blob source absent, embedding nothing");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
