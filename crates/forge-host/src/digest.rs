//! Content fingerprints for directory trees.
//!
//! Used to prove that an integrated module is an exact copy of its source:
//! two trees hash equal iff they contain the same relative paths with the
//! same bytes.

use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// SHA-256 hex digest of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirDigest(pub String);

impl DirDigest {
    /// First 12 characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for DirDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash every file and directory below `dir`.
///
/// Unlike source hashing, nothing is skipped: hidden files count. Symlinks
/// are followed.
pub fn hash_directory(dir: &Path) -> Result<DirDigest> {
    let mut hasher = Sha256::new();
    hash_directory_recursive(dir, Path::new(""), &mut hasher)?;
    let digest = DirDigest(hex::encode(hasher.finalize()));

    debug!("Directory digest for {:?}: {}", dir, digest.short());
    Ok(digest)
}

fn hash_directory_recursive(dir: &Path, relative: &Path, hasher: &mut Sha256) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;

    // Sort for deterministic ordering
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let rel = relative.join(entry.file_name());
        let file_type = entry.file_type()?;
        // Links hash as what they point to, so a followed copy matches its source
        let is_dir = if file_type.is_symlink() {
            std::fs::metadata(&path)?.is_dir()
        } else {
            file_type.is_dir()
        };

        if is_dir {
            hasher.update(b"d\0");
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hash_directory_recursive(&path, &rel, hasher)?;
        } else {
            hasher.update(b"f\0");
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hasher.update(std::fs::read(&path)?);
            hasher.update(b"\0");
        }
    }

    Ok(())
}
