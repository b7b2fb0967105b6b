//! Build environment preparation: install the build configuration into the
//! engine root and make sure the output directory exists.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ENGINE_CONFIG_FILE;
use crate::error::PrepareError;

/// Where the build configuration and output directory ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedEnvironment {
    /// Copy of the configuration inside the engine root.
    pub config_path: PathBuf,
    pub build_dir: PathBuf,
    /// `false` when the build directory was already there.
    pub build_dir_created: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BuildEnvironmentPreparer;

impl BuildEnvironmentPreparer {
    pub fn new() -> Self {
        BuildEnvironmentPreparer
    }

    /// Copy `config_file` to `<target_root>/custom.py`, replacing any
    /// previous copy, and create `build_dir` if it does not exist.
    ///
    /// An existing build directory and its contents are left alone.
    pub fn prepare(
        &self,
        config_file: &Path,
        target_root: &Path,
        build_dir: &Path,
    ) -> Result<PreparedEnvironment, PrepareError> {
        info!("Setting up build environment...");

        if !config_file.is_file() {
            return Err(PrepareError::ConfigMissing {
                path: config_file.to_path_buf(),
            });
        }
        if !target_root.is_dir() {
            return Err(PrepareError::TargetMissing {
                path: target_root.to_path_buf(),
            });
        }

        // SCons only picks up `custom.py`, whatever the source was called
        let config_path = target_root.join(ENGINE_CONFIG_FILE);
        copy_preserving_mtime(config_file, &config_path).map_err(|source| {
            PrepareError::CopyConfig {
                from: config_file.to_path_buf(),
                to: config_path.clone(),
                source,
            }
        })?;
        debug!(from = ?config_file, to = ?config_path, "Build configuration installed");

        let build_dir_created = if build_dir.is_dir() {
            false
        } else {
            std::fs::create_dir_all(build_dir).map_err(|source| PrepareError::CreateBuildDir {
                path: build_dir.to_path_buf(),
                source,
            })?;
            true
        };
        info!(build_dir = ?build_dir, created = build_dir_created, "Build directory ready");

        Ok(PreparedEnvironment {
            config_path,
            build_dir: build_dir.to_path_buf(),
            build_dir_created,
        })
    }
}

fn copy_preserving_mtime(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::copy(from, to)?;

    // Timestamp loss only affects SCons rebuild heuristics
    let modified = std::fs::metadata(from)?.modified()?;
    if let Err(e) = File::options()
        .write(true)
        .open(to)
        .and_then(|f| f.set_modified(modified))
    {
        warn!(path = ?to, error = %e, "Could not preserve modification time");
    }
    Ok(())
}
