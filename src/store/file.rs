//! On-disk format for the delivery store.
//!
//! ```text
//! magic "DLV\0" | version u8 | payload len u64 LE | payload | crc32 u32 LE
//! ```
//!
//! The payload is a MessagePack map of version -> record. Version 1 files
//! predate the `delivered` flag and are migrated on open.

use crate::error::{RelayError, Result};
use crate::types::{ContentHash, DeliveryRecord, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Magic bytes for the store file.
pub const STORE_MAGIC: &[u8; 4] = b"DLV\0";

/// Current store format version.
pub const STORE_VERSION: u8 = 2;

/// Format written before records carried a `delivered` flag.
const LEGACY_VERSION: u8 = 1;

const HEADER_SIZE: usize = 4 + 1 + 8;
const TRAILER_SIZE: usize = 4;

/// Sanity bound on the payload length field.
const MAX_PAYLOAD_SIZE: u64 = 256 * 1024 * 1024;

pub(crate) type RecordMap = BTreeMap<String, DeliveryRecord>;

/// Record layout of format version 1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct LegacyRecord {
    pub content_hash: ContentHash,
    pub content: String,
    pub posted_at: Option<Timestamp>,
}

impl From<LegacyRecord> for DeliveryRecord {
    fn from(legacy: LegacyRecord) -> Self {
        // Version 1 only ever wrote posted_at after a confirmed send.
        let delivered = legacy.posted_at.is_some();
        DeliveryRecord {
            content_hash: legacy.content_hash,
            content: legacy.content,
            posted_at: legacy.posted_at,
            delivered,
        }
    }
}

/// Result of reading a store file.
pub(crate) struct Decoded {
    pub records: RecordMap,
    /// Format version the file was written in, when older than current.
    pub migrated_from: Option<u8>,
}

/// Encode records in the current format.
pub(crate) fn encode(records: &RecordMap) -> Result<Vec<u8>> {
    frame(STORE_VERSION, &rmp_serde::to_vec_named(records)?)
}

/// Encode records in the version 1 format.
#[cfg(test)]
pub(crate) fn encode_legacy(records: &BTreeMap<String, LegacyRecord>) -> Result<Vec<u8>> {
    frame(LEGACY_VERSION, &rmp_serde::to_vec_named(records)?)
}

fn frame(version: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    buf.write_all(STORE_MAGIC)?;
    buf.write_all(&[version])?;
    buf.write_all(&(payload.len() as u64).to_le_bytes())?;
    buf.write_all(payload)?;
    buf.write_all(&crc32fast::hash(payload).to_le_bytes())?;
    Ok(buf)
}

/// Decode a store file, upgrading older formats in memory.
pub(crate) fn decode(bytes: &[u8]) -> Result<Decoded> {
    if bytes.len() < HEADER_SIZE + TRAILER_SIZE {
        return Err(RelayError::Corruption(format!(
            "Store file too short: {} bytes",
            bytes.len()
        )));
    }

    if &bytes[0..4] != STORE_MAGIC {
        return Err(RelayError::InvalidFormat("Invalid store magic".into()));
    }

    let version = bytes[4];
    if version != STORE_VERSION && version != LEGACY_VERSION {
        return Err(RelayError::InvalidFormat(format!(
            "Unsupported store version: {}",
            version
        )));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[5..HEADER_SIZE]);
    let len = u64::from_le_bytes(len_bytes);
    if len > MAX_PAYLOAD_SIZE {
        return Err(RelayError::Corruption("Store payload too large".into()));
    }
    let len = len as usize;

    if bytes.len() != HEADER_SIZE + len + TRAILER_SIZE {
        return Err(RelayError::Corruption(format!(
            "Store length mismatch: header says {} payload bytes, file has {}",
            len,
            bytes.len().saturating_sub(HEADER_SIZE + TRAILER_SIZE)
        )));
    }

    let payload = &bytes[HEADER_SIZE..HEADER_SIZE + len];
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&bytes[HEADER_SIZE + len..]);
    let expected = u32::from_le_bytes(crc_bytes);
    let got = crc32fast::hash(payload);
    if expected != got {
        return Err(RelayError::ChecksumMismatch { expected, got });
    }

    if version == LEGACY_VERSION {
        let legacy: BTreeMap<String, LegacyRecord> = rmp_serde::from_slice(payload)?;
        let records = legacy
            .into_iter()
            .map(|(version, record)| (version, DeliveryRecord::from(record)))
            .collect();
        return Ok(Decoded {
            records,
            migrated_from: Some(LEGACY_VERSION),
        });
    }

    Ok(Decoded {
        records: rmp_serde::from_slice(payload)?,
        migrated_from: None,
    })
}

/// Replace `path` with `bytes` atomically.
///
/// Write-then-rename: the temp file is fsynced before the rename and the
/// parent directory after it, so a crash leaves either the old or the new
/// contents, never a torn file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = sibling(path, ".tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    sync_parent(path)
}

/// `path` with `suffix` appended to its file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}
