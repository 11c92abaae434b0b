use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tinfoil_index::archive::{read_blob_source, read_index_file, write_index_file};
use tinfoil_index::crypto::{self, public_key_fingerprint};
use tinfoil_index::header::{IndexHeader, KEY_SLOT_SIZE};
use tinfoil_index::{CompressionId, Encryption, FileEntry, IndexCodec, IndexDocument};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tinfoil-index", about = "Generate and inspect TINFOIL index containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index container
    Generate {
        #[arg(short, long)]
        output: PathBuf,
        /// File entry: a path/URL, or a JSON object such as '{"url":"...","size":1}'
        #[arg(short, long = "file")]
        files: Vec<String>,
        /// JSON array of file entries, appended after any --file entries
        #[arg(long)]
        files_json: Option<PathBuf>,
        /// Status message; repeated values are concatenated in order
        #[arg(short, long)]
        success: Vec<String>,
        /// Compression: zstd (default), zlib, none
        #[arg(short, long, default_value = "zstd")]
        compression: String,
        /// Write an unencrypted index
        #[arg(long)]
        no_encrypt: bool,
        /// Recipient RSA-2048 public key (PEM)
        #[arg(short, long, env = "TINFOIL_PUBLIC_KEY")]
        public_key: Option<PathBuf>,
        /// File to embed as the blob segment; skipped when it does not exist
        #[arg(short, long)]
        blob: Option<PathBuf>,
    },
    /// Parse an index container and print its document
    Parse {
        input: PathBuf,
        /// RSA private key (PEM), required for encrypted indexes
        #[arg(short = 'k', long, env = "TINFOIL_PRIVATE_KEY")]
        private_key: Option<PathBuf>,
        /// Write the embedded blob here, if the index has one
        #[arg(short, long)]
        export_blob: Option<PathBuf>,
    },
    /// Show header fields without decrypting
    Info {
        input: PathBuf,
    },
    /// Generate an RSA-2048 key pair (public.pem / private.pem)
    Keygen {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {

        // ── Generate ─────────────────────────────────────────────────────────
        Commands::Generate { output, files, files_json, success, compression, no_encrypt, public_key, blob } => {
            let compression = parse_compression(&compression)?;
            let encryption = if no_encrypt { Encryption::Unencrypted } else { Encryption::Encrypted };

            let mut doc = IndexDocument::new();
            let mut entries = files.iter().map(|f| parse_entry(f)).collect::<Vec<_>>();
            if let Some(path) = files_json {
                let listed: Vec<FileEntry> = serde_json::from_slice(&fs::read(path)?)?;
                entries.extend(listed);
            }
            if !entries.is_empty() {
                doc.set_files(entries);
            }
            for msg in &success {
                doc.add_success_message(msg);
            }

            let codec = match &public_key {
                Some(path) => {
                    let key = crypto::load_public_key_pem(path)?;
                    let fingerprint = public_key_fingerprint(&key)?;
                    info!(%fingerprint, "loaded recipient key");
                    IndexCodec::with_public_key(key)
                }
                None => IndexCodec::new(),
            };
            let blob_bytes = match &blob {
                Some(path) => read_blob_source(path)?,
                None => None,
            };

            let bytes = codec.generate_with(&doc, encryption, compression, blob_bytes.as_deref())?;
            write_index_file(&output, &bytes)?;
            println!("Created: {} ({} B, {}, {})",
                output.display(), bytes.len(), compression,
                if encryption.is_encrypted() { "encrypted" } else { "unencrypted" });
        }

        // ── Parse ────────────────────────────────────────────────────────────
        Commands::Parse { input, private_key, export_blob } => {
            let key = match &private_key {
                Some(path) => Some(crypto::load_private_key_pem(path)?),
                None => None,
            };
            let parsed = read_index_file(&input, key.as_ref(), export_blob.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&parsed.document)?);
            if let Some(blob) = &parsed.blob {
                match &export_blob {
                    Some(path) => eprintln!("Blob: {} B → {}", blob.len(), path.display()),
                    None => eprintln!("Blob: {} B (not exported)", blob.len()),
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let buffer = fs::read(&input)?;
            let header = IndexHeader::parse(&buffer)?;
            let slot_used = header.key_slot != [0u8; KEY_SLOT_SIZE];

            println!("── TINFOIL index ────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Flags          0x{:02X}", header.flags.to_byte());
            println!("  Compression    {}", header.flags.compression);
            println!("  Encrypted      {}", header.flags.encryption.is_encrypted());
            println!("  Key-slot       {}", if slot_used { hex_prefix(&header.key_slot) } else { "empty".into() });
            println!("  Payload length {} B", header.payload_len);
            match header.stored_payload_len() {
                Some(len) => println!("  Stored length  {len} B"),
                None => println!("  Stored length  overflows"),
            }
            println!("  File size      {} B", buffer.len());
        }

        // ── Keygen ───────────────────────────────────────────────────────────
        Commands::Keygen { output_dir } => {
            let private = crypto::generate_keypair()?;
            let (public_path, private_path) = crypto::write_keypair_pem(&output_dir, &private)?;
            let fingerprint = public_key_fingerprint(&rsa::RsaPublicKey::from(&private))?;
            println!("Public key:  {}", public_path.display());
            println!("Private key: {}", private_path.display());
            println!("Fingerprint: {}", fingerprint);
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_compression(s: &str) -> Result<CompressionId, String> {
    CompressionId::from_name(s).ok_or_else(|| format!("Unknown compression '{}' (expected zstd, zlib or none)", s))
}

/// A `--file` value that parses as a JSON object is a record; anything else
/// is taken verbatim as a path.
fn parse_entry(s: &str) -> FileEntry {
    if s.trim_start().starts_with('{') {
        if let Ok(entry @ FileEntry::Record(_)) = serde_json::from_str::<FileEntry>(s) {
            return entry;
        }
    }
    FileEntry::Path(s.to_string())
}

fn hex_prefix(bytes: &[u8]) -> String {
    format!("{}…", hex::encode(&bytes[..16]))
}
