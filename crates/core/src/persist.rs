//! Atomic file replacement for cache records and feed documents.
//!
//! Content is written to a temporary file in the destination directory,
//! flushed to disk, then renamed over the target. A reader (or the next run)
//! sees either the previous file or the complete new one.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::Error;

/// Atomically replace `path` with `bytes`, creating parent directories as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| Error::CachePersistence(format!("create {}: {}", parent.display(), e)))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| Error::CachePersistence(format!("temp file in {}: {}", parent.display(), e)))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::CachePersistence(format!("write {}: {}", path.display(), e)))?;

    // Temp files start out 0600; carry over the target's mode, or 0644 for a new file.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let permissions = std::fs::metadata(path)
            .map(|m| m.permissions())
            .unwrap_or_else(|_| std::fs::Permissions::from_mode(0o644));
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::CachePersistence(format!("chmod {}: {}", path.display(), e)))?;
    }

    tmp.persist(path)
        .map_err(|e| Error::CachePersistence(format!("replace {}: {}", path.display(), e.error)))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "atomically replaced file");
    Ok(())
}
