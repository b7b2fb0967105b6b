//! Merging custom modules into the engine tree.
//!
//! Integration runs in two phases:
//!
//! 1. **Stage**: every module source is deep-copied into a staging directory
//!    inside the engine root and fingerprinted against its source.
//! 2. **Commit**: only when every module staged cleanly, each destination is
//!    removed and the staged copy renamed into its place, in declaration order.
//!
//! A failure while staging leaves every destination as it was. Each
//! destination always ends up an exact copy of its source, never a merge of
//! old and new contents.

use std::path::{Path, PathBuf};

use forge_host::{hash_directory, DirDigest};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::{ModuleSpec, MODULES_DIR};
use crate::error::IntegrationError;

const STAGING_PREFIX: &str = ".forge-staging-";

/// A module present in the engine tree after integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegratedModule {
    pub name: String,
    pub destination: PathBuf,
    /// Fingerprint shared by the source and the integrated copy.
    pub digest: DirDigest,
    /// Whether an older copy was removed.
    pub replaced: bool,
}

struct StagedModule<'a> {
    spec: &'a ModuleSpec,
    staged: PathBuf,
    destination: PathBuf,
    digest: DirDigest,
}

/// Copies module sources into `<engine>/modules/<name>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuleIntegrator;

impl ModuleIntegrator {
    pub fn new() -> Self {
        ModuleIntegrator
    }

    /// Integrate `modules` into the tree at `target_root`.
    pub fn integrate(
        &self,
        modules: &[ModuleSpec],
        target_root: &Path,
    ) -> Result<Vec<IntegratedModule>, IntegrationError> {
        info!("Installing custom modules...");

        if !target_root.is_dir() {
            return Err(IntegrationError::TargetMissing {
                path: target_root.to_path_buf(),
            });
        }

        let modules_root = target_root.join(MODULES_DIR);
        std::fs::create_dir_all(&modules_root).map_err(|source| IntegrationError::CreateDir {
            path: modules_root.clone(),
            source,
        })?;

        for spec in modules {
            if !spec.source.is_dir() {
                return Err(IntegrationError::SourceMissing {
                    module: spec.name.clone(),
                    path: spec.source.clone(),
                });
            }
        }

        // Same filesystem as the destinations so the commit is a rename
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(target_root)
            .map_err(|source| IntegrationError::CreateDir {
                path: target_root.to_path_buf(),
                source,
            })?;

        let staged = modules
            .iter()
            .enumerate()
            .map(|(idx, spec)| stage_module(&staging, idx, spec, target_root))
            .collect::<Result<Vec<_>, _>>()?;

        let integrated = staged
            .into_iter()
            .map(commit_module)
            .collect::<Result<Vec<_>, _>>()?;

        // Staging dir only holds empty slots now; TempDir removes it on drop
        drop(staging);
        Ok(integrated)
    }
}

fn stage_module<'a>(
    staging: &TempDir,
    idx: usize,
    spec: &'a ModuleSpec,
    target_root: &Path,
) -> Result<StagedModule<'a>, IntegrationError> {
    let staged = staging.path().join(format!("{}-{}", idx, spec.name));
    debug!(module = %spec.name, from = ?spec.source, "Staging module");

    copy_dir_recursive(&spec.source, &staged).map_err(|source| IntegrationError::Copy {
        module: spec.name.clone(),
        from: spec.source.clone(),
        source,
    })?;

    let fingerprint = |dir: &Path| {
        hash_directory(dir).map_err(|source| IntegrationError::Digest {
            module: spec.name.clone(),
            source,
        })
    };
    let expected = fingerprint(&spec.source)?;
    let actual = fingerprint(&staged)?;
    if expected != actual {
        return Err(IntegrationError::Mismatch {
            module: spec.name.clone(),
            expected: expected.0,
            actual: actual.0,
        });
    }

    Ok(StagedModule {
        spec,
        staged,
        destination: target_root.join(&spec.destination),
        digest: actual,
    })
}

fn commit_module(module: StagedModule<'_>) -> Result<IntegratedModule, IntegrationError> {
    let name = module.spec.name.clone();
    let replace_err = |source| IntegrationError::Replace {
        module: name.clone(),
        path: module.destination.clone(),
        source,
    };

    let replaced = match std::fs::symlink_metadata(&module.destination) {
        Ok(meta) if meta.is_dir() => {
            std::fs::remove_dir_all(&module.destination).map_err(replace_err)?;
            true
        }
        Ok(_) => {
            std::fs::remove_file(&module.destination).map_err(replace_err)?;
            true
        }
        Err(_) => false,
    };

    if let Some(parent) = module.destination.parent() {
        std::fs::create_dir_all(parent).map_err(replace_err)?;
    }
    std::fs::rename(&module.staged, &module.destination).map_err(replace_err)?;

    info!(
        module = %name,
        destination = ?module.destination,
        digest = %module.digest.short(),
        replaced = replaced,
        "Module integrated"
    );

    Ok(IntegratedModule {
        name,
        destination: module.destination,
        digest: module.digest,
        replaced,
    })
}

/// Deep copy of `from` into `to`, which must not exist yet.
///
/// Symlinks are followed and their targets copied as regular entries: a
/// relative link such as `shared -> ../shared` would dangle once the module
/// sits inside the engine tree.
fn copy_dir_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;

    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let target = to.join(entry.file_name());

        let file_type = entry.file_type()?;
        let is_dir = if file_type.is_symlink() {
            std::fs::metadata(&path)?.is_dir()
        } else {
            file_type.is_dir()
        };

        if is_dir {
            copy_dir_recursive(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)?;
        }
    }

    Ok(())
}
