//! Whole-run mutual exclusion.
//!
//! Two overlapping invocations (a manual run during a scheduled one) would
//! race on the same cache and feed files. The first one to create
//! `<cache_dir>/noticefeed.lock` wins; the other aborts. A lock left by a
//! killed run is taken over once it is older than the stale threshold.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};

const LOCK_FILE: &str = "noticefeed.lock";

/// Held run lock; released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(dir: &Path, stale_after: Duration) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(LOCK_FILE);

        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let age = std::fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                    .unwrap_or_default();

                if age < stale_after {
                    bail!("another run holds {} (age {}s)", path.display(), age.as_secs());
                }

                tracing::warn!(path = %path.display(), age_secs = age.as_secs(), "taking over stale run lock");
                std::fs::remove_file(&path).with_context(|| format!("remove stale {}", path.display()))?;
                Self::create(&path).with_context(|| format!("create {}", path.display()))
            }
            Err(e) => Err(e).with_context(|| format!("create {}", path.display())),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "pid={}", std::process::id())?;
        Ok(Self { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}
