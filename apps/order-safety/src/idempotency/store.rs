//! Durable intent → client order id mapping.
//!
//! The whole map is persisted as one JSON object on every mutation:
//!
//! ```json
//! { "entry:BTC:42": { "id": "LIVE-TREND-...", "ts": 1700000000.25 } }
//! ```
//!
//! Writes go to `<file>.tmp`, are fsynced, then renamed over the live file,
//! so readers never observe a partial snapshot.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::IdempotencyError;
use super::lock::{FileLock, FileLockGuard, NoOpFileLock};

/// Default record lifetime.
pub const DEFAULT_TTL_DAYS: u32 = 7;

/// One intent's binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Client order id bound to the intent.
    #[serde(rename = "id")]
    pub client_order_id: String,
    /// Creation time, epoch seconds.
    #[serde(rename = "ts")]
    pub created_at: f64,
}

impl IdempotencyRecord {
    fn new(client_order_id: String, now: DateTime<Utc>) -> Self {
        Self {
            client_order_id,
            created_at: epoch_seconds(now),
        }
    }
}

/// Outcome of [`IdempotencyStore::reserve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The candidate id was stored; the order has not been sent before.
    New(String),
    /// The intent was already bound; reuse this id and do not resubmit.
    Existing(String),
}

impl Reservation {
    /// The client order id to use.
    #[must_use]
    pub fn client_order_id(&self) -> &str {
        match self {
            Self::New(id) | Self::Existing(id) => id,
        }
    }

    /// Whether the intent had been seen before.
    #[must_use]
    pub const fn is_existing(&self) -> bool {
        matches!(self, Self::Existing(_))
    }
}

/// File-backed idempotency store.
///
/// Every read-check-write sequence holds the in-process mutex and the
/// injected [`FileLock`], and starts by reloading the file, so writers in
/// other processes sharing the lock are never overwritten or missed.
#[derive(Debug)]
pub struct IdempotencyStore {
    path: PathBuf,
    lock: Arc<dyn FileLock>,
    records: Mutex<BTreeMap<String, IdempotencyRecord>>,
}

impl IdempotencyStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IdempotencyError> {
        Self::open_with_lock(path, Arc::new(NoOpFileLock))
    }

    /// Open the store with an injected cross-process lock.
    pub fn open_with_lock(
        path: impl Into<PathBuf>,
        lock: Arc<dyn FileLock>,
    ) -> Result<Self, IdempotencyError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| IdempotencyError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let records = {
            let _guard = acquire_file_lock(lock.as_ref(), &path)?;
            load_snapshot(&path)?
        };

        info!(
            path = %path.display(),
            records = records.len(),
            "Idempotency store opened"
        );

        Ok(Self {
            path,
            lock,
            records: Mutex::new(records),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of intents in the last loaded snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the last loaded snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Client order id bound to `intent_key` in the last loaded snapshot.
    ///
    /// Cheap and lock-free with respect to the file; use [`Self::reserve`]
    /// for the authoritative check.
    #[must_use]
    pub fn get(&self, intent_key: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(intent_key)
            .map(|r| r.client_order_id.clone())
    }

    /// Full record for `intent_key` in the last loaded snapshot.
    #[must_use]
    pub fn record(&self, intent_key: &str) -> Option<IdempotencyRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(intent_key)
            .cloned()
    }

    /// Bind `intent_key` to `client_order_id` and persist immediately.
    ///
    /// Records are never rewritten: putting the same id again is a no-op,
    /// putting a different id fails with [`IdempotencyError::Conflict`].
    pub fn put(&self, intent_key: &str, client_order_id: &str) -> Result<(), IdempotencyError> {
        self.with_fresh_snapshot(|records| {
            if let Some(existing) = records.get(intent_key) {
                if existing.client_order_id == client_order_id {
                    return Ok(());
                }
                return Err(IdempotencyError::Conflict {
                    key: intent_key.to_string(),
                    existing: existing.client_order_id.clone(),
                });
            }

            self.insert_and_persist(records, intent_key, client_order_id)
        })
    }

    /// Atomically look up `intent_key` and bind `candidate` if it is new.
    pub fn reserve(&self, intent_key: &str, candidate: &str) -> Result<Reservation, IdempotencyError> {
        self.with_fresh_snapshot(|records| {
            if let Some(existing) = records.get(intent_key) {
                debug!(
                    intent_key,
                    client_order_id = %existing.client_order_id,
                    "Intent already reserved"
                );
                return Ok(Reservation::Existing(existing.client_order_id.clone()));
            }

            self.insert_and_persist(records, intent_key, candidate)?;
            Ok(Reservation::New(candidate.to_string()))
        })
    }

    /// Drop records older than `ttl_days` and persist the result.
    ///
    /// Returns the number of records removed.
    pub fn cleanup_old(&self, ttl_days: u32) -> Result<usize, IdempotencyError> {
        self.cleanup_old_at(ttl_days, Utc::now())
    }

    /// [`Self::cleanup_old`] against an explicit clock.
    pub fn cleanup_old_at(&self, ttl_days: u32, now: DateTime<Utc>) -> Result<usize, IdempotencyError> {
        let cutoff = epoch_seconds(now - Duration::days(i64::from(ttl_days)));

        self.with_fresh_snapshot(|records| {
            let before = records.len();
            let retained: BTreeMap<String, IdempotencyRecord> = records
                .iter()
                .filter(|(_, r)| r.created_at >= cutoff)
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect();
            let removed = before - retained.len();

            if removed == 0 {
                return Ok(0);
            }

            write_snapshot(&self.path, &retained)?;
            *records = retained;

            info!(removed, remaining = records.len(), ttl_days, "Expired idempotency records pruned");
            Ok(removed)
        })
    }

    /// Run `f` on the on-disk snapshot with both locks held.
    fn with_fresh_snapshot<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, IdempotencyRecord>) -> Result<T, IdempotencyError>,
    ) -> Result<T, IdempotencyError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = acquire_file_lock(self.lock.as_ref(), &self.path)?;
        *records = load_snapshot(&self.path)?;
        f(&mut records)
    }

    fn insert_and_persist(
        &self,
        records: &mut BTreeMap<String, IdempotencyRecord>,
        intent_key: &str,
        client_order_id: &str,
    ) -> Result<(), IdempotencyError> {
        records.insert(
            intent_key.to_string(),
            IdempotencyRecord::new(client_order_id.to_string(), Utc::now()),
        );

        if let Err(e) = write_snapshot(&self.path, records) {
            // Memory must never claim what the disk does not hold
            records.remove(intent_key);
            warn!(intent_key, error = %e, "Idempotency persist failed");
            return Err(e);
        }

        debug!(intent_key, client_order_id, "Intent bound to client order id");
        Ok(())
    }
}

fn acquire_file_lock(lock: &dyn FileLock, path: &Path) -> Result<FileLockGuard, IdempotencyError> {
    lock.acquire(path).map_err(|source| IdempotencyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_snapshot(path: &Path, records: &BTreeMap<String, IdempotencyRecord>) -> Result<(), IdempotencyError> {
    let bytes = serde_json::to_vec(records)?;
    write_atomic(path, &bytes)
}

fn load_snapshot(path: &Path) -> Result<BTreeMap<String, IdempotencyRecord>, IdempotencyError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(IdempotencyError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&contents).map_err(|source| IdempotencyError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IdempotencyError> {
    let tmp = temp_path(path);
    let io_err = |source| IdempotencyError::Io {
        path: tmp.clone(),
        source,
    };

    {
        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }

    fs::rename(&tmp, path).map_err(|source| IdempotencyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}
