pub mod archive;
pub mod blob;
pub mod codec;
pub mod container;
pub mod crypto;
pub mod error;
pub mod header;
pub mod index;

pub use codec::CompressionId;
pub use container::{generate, parse, IndexCodec, ParsedIndex};
pub use error::IndexError;
pub use header::{Encryption, Flags, IndexHeader, HEADER_SIZE, MAGIC};
pub use index::{FieldValue, Fields, FileEntry, IndexDocument};
