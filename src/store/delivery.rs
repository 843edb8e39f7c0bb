//! File-backed delivery store.

use super::file::{self, RecordMap};
use crate::error::{RelayError, Result};
use crate::types::{ContentHash, DeliveryRecord, Timestamp};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Durable map of version -> [`DeliveryRecord`].
///
/// Every mutating call rewrites the store file atomically before it
/// returns, so a crash between calls never loses or tears a record. The
/// in-memory copy is only updated once the write succeeded.
pub struct DeliveryStore {
    /// Path to the store file.
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Current contents, mirrored to disk.
    records: Mutex<RecordMap>,
}

impl DeliveryStore {
    /// Open the store at `path`, creating it (and its parent directories)
    /// if missing. Older formats are migrated in place.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock_file = Self::acquire_lock(&path)?;

        let records = if path.exists() {
            let decoded = file::decode(&fs::read(&path)?)?;
            if let Some(from) = decoded.migrated_from {
                info!(
                    path = %path.display(),
                    from_version = from,
                    to_version = file::STORE_VERSION,
                    records = decoded.records.len(),
                    "Migrating delivery store"
                );
                file::write_atomic(&path, &file::encode(&decoded.records)?)?;
            }
            debug!(records = decoded.records.len(), "Loaded delivery store");
            decoded.records
        } else {
            let records = RecordMap::new();
            file::write_atomic(&path, &file::encode(&records)?)?;
            info!(path = %path.display(), "Created delivery store");
            records
        };

        Ok(Self {
            path,
            _lock_file: lock_file,
            records: Mutex::new(records),
        })
    }

    /// Read the records at `path` without locking, creating or migrating.
    ///
    /// Returns `None` when no store exists there. Older formats are
    /// upgraded in memory only; the file is left untouched.
    pub fn snapshot(path: impl AsRef<Path>) -> Result<Option<Vec<(String, DeliveryRecord)>>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let decoded = file::decode(&fs::read(path)?)?;
        Ok(Some(decoded.records.into_iter().collect()))
    }

    /// Path to the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every version ever recorded, delivered or not.
    pub fn get_known_versions(&self) -> BTreeSet<String> {
        self.records.lock().keys().cloned().collect()
    }

    /// Versions not yet confirmed delivered, in version-string order.
    ///
    /// This order carries no chronology; callers re-order by the changelog.
    pub fn get_undelivered_versions(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|(_, r)| !r.delivered)
            .map(|(v, _)| v.clone())
            .collect()
    }

    /// Get the record for a version.
    pub fn get(&self, version: &str) -> Option<DeliveryRecord> {
        self.records.lock().get(version).cloned()
    }

    /// All records in version-string order.
    pub fn records(&self) -> Vec<(String, DeliveryRecord)> {
        self.records
            .lock()
            .iter()
            .map(|(v, r)| (v.clone(), r.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Insert a record or refresh its content.
    ///
    /// `content_hash` and `content` are always overwritten. `delivered` is
    /// never touched, and `posted_at` is only replaced when one is given.
    /// An upsert that changes nothing does not write.
    pub fn upsert(
        &self,
        version: &str,
        content_hash: ContentHash,
        content: &str,
        posted_at: Option<Timestamp>,
    ) -> Result<()> {
        let mut records = self.records.lock();

        let next = match records.get(version) {
            Some(existing) => {
                let merged = DeliveryRecord {
                    content_hash,
                    content: content.to_string(),
                    posted_at: posted_at.or(existing.posted_at),
                    delivered: existing.delivered,
                };
                if &merged == existing {
                    return Ok(());
                }
                if merged.content_hash != existing.content_hash {
                    debug!(
                        version,
                        old = %existing.content_hash.short(),
                        new = %merged.content_hash.short(),
                        "Content changed"
                    );
                }
                merged
            }
            None => DeliveryRecord {
                content_hash,
                content: content.to_string(),
                posted_at,
                delivered: false,
            },
        };

        self.commit(&mut records, version, next)
    }

    /// Record a confirmed send.
    ///
    /// Returns `false`, without writing, when the version was never
    /// upserted. That always points at a bug upstream.
    pub fn mark_delivered(&self, version: &str, posted_at: Timestamp) -> Result<bool> {
        let mut records = self.records.lock();

        let next = match records.get(version) {
            Some(existing) => DeliveryRecord {
                posted_at: Some(posted_at),
                delivered: true,
                ..existing.clone()
            },
            None => {
                warn!(version, "No record updated when marking delivered");
                return Ok(false);
            }
        };

        self.commit(&mut records, version, next)?;
        Ok(true)
    }

    /// Apply one record change and persist the whole map, undoing the
    /// in-memory change if the write fails.
    fn commit(&self, records: &mut RecordMap, version: &str, next: DeliveryRecord) -> Result<()> {
        let previous = records.insert(version.to_string(), next);

        let written = file::encode(records).and_then(|bytes| file::write_atomic(&self.path, &bytes));
        if let Err(e) = written {
            match previous {
                Some(prev) => records.insert(version.to_string(), prev),
                None => records.remove(version),
            };
            return Err(e);
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(file::sibling(path, ".lock"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| RelayError::Locked)?;

        Ok(lock_file)
    }
}
