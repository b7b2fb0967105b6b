//! Error taxonomy for the provisioning pipeline.
//!
//! Each step has its own error enum; [`PipelineError`] wraps them so the
//! orchestrator can classify a failure, print remediation text and pick an
//! exit code without knowing step internals.

use std::path::PathBuf;
use std::process::ExitCode;

use forge_host::{HostError, HostPlatform, Version};
use serde::{Deserialize, Serialize};

/// Failure classes surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Runtime or package installer missing or below the minimum version.
    Environment,
    /// Auxiliary package missing and automatic installation failed.
    DependencyMissing,
    /// Managed-runtime toolchain absent or unreachable.
    ToolchainMissing,
    /// git or pip returned non-zero or could not be started.
    ExternalCommand,
    /// Copy, delete or mkdir failed.
    Filesystem,
}

impl ErrorKind {
    /// Process exit status for this class of failure.
    pub fn exit_status(&self) -> u8 {
        match self {
            ErrorKind::Environment => 2,
            ErrorKind::DependencyMissing => 3,
            ErrorKind::ToolchainMissing => 4,
            ErrorKind::ExternalCommand => 5,
            ErrorKind::Filesystem => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Environment => "environment",
            ErrorKind::DependencyMissing => "dependency_missing",
            ErrorKind::ToolchainMissing => "toolchain_missing",
            ErrorKind::ExternalCommand => "external_command",
            ErrorKind::Filesystem => "filesystem",
        }
    }
}

/// Errors produced by the toolchain validator.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("no Python interpreter found (tried: {})", .tried.join(", "))]
    RuntimeMissing { tried: Vec<String> },

    #[error("could not read a version from `{program} --version`: {output}")]
    RuntimeVersionUnreadable { program: String, output: String },

    #[error("{program} reports version {found}; {required} or higher is required")]
    RuntimeTooOld {
        program: String,
        found: Version,
        required: Version,
    },

    #[error("pip is not installed for {python}: {detail}")]
    InstallerMissing { python: String, detail: String },

    #[error("failed to install required package {package}: {source}")]
    DependencyInstallFailed {
        python: String,
        package: String,
        #[source]
        source: HostError,
    },

    #[error("package {package} is still missing after installation")]
    DependencyStillMissing { python: String, package: String },

    #[error("{} is not installed or not usable on {platform}", .missing.join(" and "))]
    ToolchainMissing {
        platform: HostPlatform,
        missing: Vec<String>,
    },
}

/// Errors produced while cloning or pinning the upstream tree.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("git {action} failed: {source}")]
    Git {
        action: &'static str,
        #[source]
        source: HostError,
    },

    #[error("upstream path {path:?} exists but is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("upstream tree {path:?} has {} locally modified tracked file(s)", .changes.len())]
    DirtyTree { path: PathBuf, changes: Vec<String> },
}

/// Errors produced while merging module directories.
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("upstream tree {path:?} does not exist")]
    TargetMissing { path: PathBuf },

    #[error("source directory for module {module} not found at {path:?}")]
    SourceMissing { module: String, path: PathBuf },

    #[error("failed to create {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy module {module} from {from:?}: {source}")]
    Copy {
        module: String,
        from: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to replace {path:?} with the new copy of module {module}: {source}")]
    Replace {
        module: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fingerprint module {module}: {source}")]
    Digest {
        module: String,
        #[source]
        source: HostError,
    },

    #[error("copy of module {module} does not match its source ({expected} != {actual})")]
    Mismatch {
        module: String,
        expected: String,
        actual: String,
    },
}

/// Errors produced while installing the build configuration.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("build configuration file not found at {path:?}")]
    ConfigMissing { path: PathBuf },

    #[error("upstream tree {path:?} does not exist")]
    TargetMissing { path: PathBuf },

    #[error("failed to copy {from:?} to {to:?}: {source}")]
    CopyConfig {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create build directory {path:?}: {source}")]
    CreateBuildDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure that aborts a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("toolchain validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("source tree provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("module integration failed: {0}")]
    Integration(#[from] IntegrationError),

    #[error("build environment preparation failed: {0}")]
    Prepare(#[from] PrepareError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(e) => match e {
                ValidationError::RuntimeMissing { .. }
                | ValidationError::RuntimeVersionUnreadable { .. }
                | ValidationError::RuntimeTooOld { .. }
                | ValidationError::InstallerMissing { .. } => ErrorKind::Environment,
                ValidationError::DependencyInstallFailed { .. }
                | ValidationError::DependencyStillMissing { .. } => ErrorKind::DependencyMissing,
                ValidationError::ToolchainMissing { .. } => ErrorKind::ToolchainMissing,
            },
            PipelineError::Provision(e) => match e {
                ProvisionError::Git { .. } | ProvisionError::DirtyTree { .. } => {
                    ErrorKind::ExternalCommand
                }
                ProvisionError::NotADirectory { .. } => ErrorKind::Filesystem,
            },
            PipelineError::Integration(_) | PipelineError::Prepare(_) => ErrorKind::Filesystem,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.kind().exit_status())
    }

    /// Actionable instructions for the user, when there are any.
    pub fn remediation(&self) -> Option<String> {
        match self {
            PipelineError::Validation(e) => validation_remediation(e),
            PipelineError::Provision(e) => Some(match e {
                ProvisionError::Git { action, .. } if *action == "clone" => {
                    "Check network access and the upstream URL, then re-run.".to_string()
                }
                ProvisionError::Git { .. } => {
                    "Make sure the pinned branch exists in the upstream tree \
                     (run `git fetch` there if it is stale), then re-run."
                        .to_string()
                }
                ProvisionError::NotADirectory { path } => {
                    format!("Remove or rename {:?} so the upstream tree can be cloned.", path)
                }
                ProvisionError::DirtyTree { path, changes } => format!(
                    "Commit, stash or discard local changes in {:?} ({}), \
                     or re-run with --dirty-tree warn.",
                    path,
                    changes.join(", ")
                ),
            }),
            PipelineError::Integration(e) => Some(match e {
                IntegrationError::SourceMissing { path, .. } => {
                    format!("Restore the module sources at {:?} and re-run.", path)
                }
                _ => "Check permissions on the upstream modules directory and re-run; \
                      modules are committed all-or-nothing so a re-run is safe."
                    .to_string(),
            }),
            PipelineError::Prepare(e) => Some(match e {
                PrepareError::ConfigMissing { path } => format!(
                    "Generate one with `engine-forge config --output {}`.",
                    path.display()
                ),
                _ => "Check permissions on the upstream and build directories and re-run."
                    .to_string(),
            }),
        }
    }
}

fn validation_remediation(err: &ValidationError) -> Option<String> {
    match err {
        ValidationError::RuntimeMissing { .. }
        | ValidationError::RuntimeVersionUnreadable { .. }
        | ValidationError::RuntimeTooOld { .. } => Some(
            "Install Python 3.8 or newer and put it on PATH, or point FORGE_PYTHON at it."
                .to_string(),
        ),
        ValidationError::InstallerMissing { python, .. } => Some(format!(
            "Install pip with `{} -m ensurepip --upgrade`.",
            python
        )),
        ValidationError::DependencyInstallFailed {
            python, package, ..
        }
        | ValidationError::DependencyStillMissing { python, package } => Some(format!(
            "Install it manually with `{} -m pip install {}` and re-run.",
            python, package
        )),
        ValidationError::ToolchainMissing { platform, .. } => {
            Some(managed_runtime_remediation(*platform))
        }
    }
}

/// Platform-specific instructions for installing Mono.
pub fn managed_runtime_remediation(platform: HostPlatform) -> String {
    match platform {
        HostPlatform::Windows => "Mono and MSBuild are required. Please install the .NET SDK and Mono.\n\
             Download from: https://www.mono-project.com/download/stable/"
            .to_string(),
        HostPlatform::Linux => "Install using: sudo apt-get install mono-complete".to_string(),
        HostPlatform::MacOs => "Install using: brew install mono".to_string(),
        HostPlatform::Other => {
            "Install Mono from https://www.mono-project.com/download/stable/".to_string()
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
