//! On-disk format of a search index.
//!
//! ```text
//! "SSIX" | version: u32 LE | bincode(SearchIndex) | crc32: u32 LE
//! ```
//!
//! The version is checked before the body is decoded so an index written by an
//! incompatible build is rejected instead of misparsed. The checksum covers
//! every byte before it.

use crate::error::IndexError;
use crate::SearchIndex;
use crc32fast::Hasher as Crc32Hasher;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MAGIC: [u8; 4] = *b"SSIX";
pub const FORMAT_VERSION: u32 = 1;
pub const DEFAULT_FILE_NAME: &str = "search-index.bin";

const PREFIX_LEN: usize = 8;
const FOOTER_LEN: usize = 4;

fn crc32(bytes: &[u8]) -> u32 {
    let mut h = Crc32Hasher::new();
    h.update(bytes);
    h.finalize()
}

pub fn encode_index(index: &SearchIndex) -> Result<Vec<u8>, IndexError> {
    let body = bincode::serialize(index)?;
    let mut buf = Vec::with_capacity(PREFIX_LEN + body.len() + FOOTER_LEN);
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&body);
    let crc = crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(b)
}

pub fn decode_index(bytes: &[u8]) -> Result<SearchIndex, IndexError> {
    if bytes.len() < 4 || bytes[..4] != MAGIC {
        return Err(IndexError::BadMagic);
    }
    if bytes.len() < PREFIX_LEN {
        return Err(IndexError::Corrupt(format!("truncated: {} bytes", bytes.len())));
    }
    let found = read_u32(&bytes[4..]);
    if found != FORMAT_VERSION {
        return Err(IndexError::UnsupportedVersion { found, supported: FORMAT_VERSION });
    }
    if bytes.len() < PREFIX_LEN + FOOTER_LEN {
        return Err(IndexError::Corrupt(format!("truncated: {} bytes", bytes.len())));
    }
    let (content, footer) = bytes.split_at(bytes.len() - FOOTER_LEN);
    let stored = read_u32(footer);
    let computed = crc32(content);
    if stored != computed {
        return Err(IndexError::Checksum { stored, computed });
    }
    let index: SearchIndex = bincode::deserialize(&content[PREFIX_LEN..])?;
    index.validate()?;
    Ok(index)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the index next to `path` and rename it into place, so readers see
/// either the old file or the complete new one.
pub fn save_index(path: &Path, index: &SearchIndex) -> Result<(), IndexError> {
    let bytes = encode_index(index)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = tmp_path(path);
    let written = (|| -> std::io::Result<()> {
        let mut f = File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    tracing::info!(path = %path.display(), bytes = bytes.len(), "index published");
    Ok(())
}

pub fn load_index(path: &Path) -> Result<SearchIndex, IndexError> {
    let bytes = fs::read(path)?;
    decode_index(&bytes)
}

/// Resolve a user-supplied location: a directory means the default file in it.
pub fn index_file(path: &Path) -> PathBuf {
    if path.is_dir() { path.join(DEFAULT_FILE_NAME) } else { path.to_path_buf() }
}
