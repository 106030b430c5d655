//! JSON-file cache store, one record per source.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::record::CacheRecord;
use crate::Error;
use crate::persist::write_atomic;

/// Directory-backed store of [`CacheRecord`]s keyed by source cache key.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load the record for `key`.
    ///
    /// A missing file yields the default record. A file that cannot be parsed
    /// is logged and also treated as absent, so the next successful cycle
    /// rewrites it. Any other I/O failure is returned.
    pub fn load(&self, key: &str) -> Result<CacheRecord, Error> {
        let path = self.path_for(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(key, path = %path.display(), "no cache record yet");
                return Ok(CacheRecord::default());
            }
            Err(e) => return Err(Error::CachePersistence(format!("read {}: {}", path.display(), e))),
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(key, path = %path.display(), error = %e, "corrupt cache record, starting fresh");
                Ok(CacheRecord::default())
            }
        }
    }

    /// Atomically persist the record for `key`.
    pub fn save(&self, key: &str, record: &CacheRecord) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::CachePersistence(format!("encode cache record: {}", e)))?;
        write_atomic(&self.path_for(key), &json)
    }
}
