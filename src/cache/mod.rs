//! Content-addressed fingerprint cache deciding which documents need work.
//!
//! The table maps an output-relative path to a pair of SHA-256 fingerprints:
//! one over the source side (body text, tool version, metadata text) and one
//! over the produced output file. A record only counts as fresh when the
//! source fingerprint matches, the output file still exists, and the output
//! file still hashes to the recorded value, so the cache self-heals against
//! external edits to either tree.
//!
//! The table lives in memory behind a mutex and is flushed to a single JSON
//! database file on a cadence and at run end.

use crate::error::{BlogconvError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persisted per-output-path cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub content_fingerprint: String,
    pub output_fingerprint: String,
}

/// SHA-256 over the source side of a document: body text, tool version,
/// metadata text. Including the version invalidates every record across
/// tool upgrades.
pub fn content_fingerprint(body: &str, metadata: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hasher.update(b"\n");
    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
    hasher.update(b"\n");
    hasher.update(metadata.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 over raw bytes, used for the produced-output side.
pub fn output_fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn hash_file(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    Ok(output_fingerprint(&data))
}

/// Thread-safe fingerprint cache backed by a single JSON file
pub struct FingerprintCache {
    db_path: PathBuf,
    table: Mutex<HashMap<String, CacheRecord>>,
}

impl FingerprintCache {
    /// Load the cache table from `db_path`, or start empty when the file is
    /// absent. An unreadable or corrupt database is logged and treated as
    /// empty rather than failing the run.
    pub fn load(db_path: &Path) -> Self {
        let table = match std::fs::read_to_string(db_path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, CacheRecord>>(&raw) {
                Ok(table) => table,
                Err(e) => {
                    log::warn!("Cache database {} is corrupt ({}), starting empty", db_path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                log::warn!("Failed to read cache database {} ({}), starting empty", db_path.display(), e);
                HashMap::new()
            }
        };

        Self {
            db_path: db_path.to_path_buf(),
            table: Mutex::new(table),
        }
    }

    /// Decide whether the document behind `output_key` must be regenerated.
    ///
    /// Four-way check:
    /// 1. no record for the output path → regenerate
    /// 2. source fingerprint changed → regenerate
    /// 3. output file missing from disk → regenerate
    /// 4. output file no longer hashes to the recorded fingerprint → regenerate
    ///
    /// Only when all four hold is the document skipped.
    pub fn should_regenerate(
        &self,
        output_key: &str,
        output_path: &Path,
        new_content_fingerprint: &str,
    ) -> bool {
        let record = match self.table.lock().unwrap().get(output_key).cloned() {
            Some(record) => record,
            None => return true,
        };

        if record.content_fingerprint != new_content_fingerprint {
            return true;
        }

        if !output_path.is_file() {
            return true;
        }

        match hash_file(output_path) {
            Ok(current) => current != record.output_fingerprint,
            Err(e) => {
                log::warn!("Failed to hash output {}: {}", output_path.display(), e);
                true
            }
        }
    }

    /// Overwrite the record for `output_key` after a successful write.
    pub fn record(&self, output_key: &str, record: CacheRecord) {
        self.table.lock().unwrap().insert(output_key.to_string(), record);
    }

    /// Drop every record under `dist_root` whose output key is no longer
    /// expected, unlinking the stale output file from the dist tree. Keys are
    /// full output paths, so records belonging to other output roots are left
    /// alone. Returns the removed keys.
    pub fn garbage_collect(&self, expected_keys: &HashSet<String>, dist_root: &Path) -> Vec<String> {
        let mut table = self.table.lock().unwrap();
        let stale: Vec<String> = table
            .keys()
            .filter(|key| Path::new(key).starts_with(dist_root) && !expected_keys.contains(*key))
            .cloned()
            .collect();

        for key in &stale {
            table.remove(key);
            let path = PathBuf::from(key);
            match std::fs::remove_file(&path) {
                Ok(()) => log::info!("Removed stale output {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove stale output {}: {}", path.display(), e),
            }
        }

        stale
    }

    /// Number of records currently in the table.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().unwrap().len() == 0
    }

    /// Serialize the whole table to the database file. The write goes to a
    /// temporary sibling first and is renamed into place so an interrupted
    /// flush never truncates the previous table.
    pub fn flush(&self) -> Result<()> {
        let snapshot = self.table.lock().unwrap().clone();
        let raw = serde_json::to_string(&snapshot)
            .map_err(|e| BlogconvError::Cache(format!("serialize cache table: {e}")))?;

        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.db_path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.db_path)?;
        Ok(())
    }
}
