//! Host toolchain validation.
//!
//! Requirements are evaluated once each, in declaration order:
//!
//! 1. Python runtime (>= 3.8), abort if missing or too old
//! 2. pip, abort if missing
//! 3. `setuptools`, `wheel`, `SCons`, installed through pip when missing
//! 4. Mono toolchain, abort with platform-specific instructions
//!
//! Detection is a query (`--version`, `pip show`, PATH lookup); the only side
//! effect is the automatic `pip install` of a missing package.

use std::sync::Arc;

use forge_host::{CommandRunner, CommandSpec, HostError, HostPlatform, Version};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ValidationError;

/// Lowest Python the engine's SCons build supports.
pub const MIN_PYTHON: Version = Version::new(3, 8, 0);

/// Packages the build needs inside the Python environment.
pub const REQUIRED_PACKAGES: &[&str] = &["setuptools", "wheel", "SCons"];

/// What happens when a requirement is not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    /// Install through the package installer, then re-check.
    AutoInstall,
    /// Print instructions and abort the pipeline.
    InstructAndAbort,
}

/// How a requirement is detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Detection {
    /// `<python> --version`
    RuntimeVersion,
    /// `<python> -m pip --version`
    PackageInstaller,
    /// `<python> -m pip show <package>`
    PackageQuery { package: String },
    /// PATH lookup of `mono` and `msbuild` on Windows, `mono --version` elsewhere
    ManagedRuntime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainRequirement {
    pub name: String,
    pub detection: Detection,
    pub minimum_version: Option<Version>,
    pub remediation: RemediationAction,
}

impl ToolchainRequirement {
    /// The requirements of the custom engine build, in evaluation order.
    pub fn default_set() -> Vec<Self> {
        let mut requirements = vec![
            ToolchainRequirement {
                name: "python".to_string(),
                detection: Detection::RuntimeVersion,
                minimum_version: Some(MIN_PYTHON),
                remediation: RemediationAction::InstructAndAbort,
            },
            ToolchainRequirement {
                name: "pip".to_string(),
                detection: Detection::PackageInstaller,
                minimum_version: None,
                remediation: RemediationAction::InstructAndAbort,
            },
        ];

        requirements.extend(REQUIRED_PACKAGES.iter().map(|package| ToolchainRequirement {
            name: package.to_string(),
            detection: Detection::PackageQuery {
                package: package.to_string(),
            },
            minimum_version: None,
            remediation: RemediationAction::AutoInstall,
        }));

        requirements.push(ToolchainRequirement {
            name: "mono".to_string(),
            detection: Detection::ManagedRuntime,
            minimum_version: None,
            remediation: RemediationAction::InstructAndAbort,
        });
        requirements
    }
}

/// Outcome of a package registry query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    Present,
    Missing,
}

/// What validation found on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Interpreter used for pip operations.
    pub python: Option<String>,
    pub python_version: Option<Version>,
    /// Packages installed by this run.
    pub installed_packages: Vec<String>,
    /// Mono version, when the platform probe reports one.
    pub managed_runtime_version: Option<Version>,
    /// Requirement names in the order they were evaluated.
    pub evaluated: Vec<String>,
}

/// Checks the host against a list of [`ToolchainRequirement`]s.
pub struct ToolchainValidator {
    runner: Arc<dyn CommandRunner>,
    platform: HostPlatform,
    python_override: Option<String>,
    requirements: Vec<ToolchainRequirement>,
}

impl ToolchainValidator {
    pub fn new(runner: Arc<dyn CommandRunner>, platform: HostPlatform) -> Self {
        Self {
            runner,
            platform,
            python_override: None,
            requirements: ToolchainRequirement::default_set(),
        }
    }

    /// Use this interpreter instead of probing PATH.
    pub fn with_python(mut self, python: Option<String>) -> Self {
        self.python_override = python;
        self
    }

    pub fn with_requirements(mut self, requirements: Vec<ToolchainRequirement>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn requirements(&self) -> &[ToolchainRequirement] {
        &self.requirements
    }

    /// Evaluate every requirement; stop at the first fatal one.
    pub fn validate(&self) -> Result<ValidationReport, ValidationError> {
        let mut report = ValidationReport::default();

        for requirement in &self.requirements {
            debug!(requirement = %requirement.name, "Checking requirement");
            report.evaluated.push(requirement.name.clone());

            match &requirement.detection {
                Detection::RuntimeVersion => {
                    let (python, version) = self.check_runtime(requirement.minimum_version)?;
                    info!(python = %python, version = %version, "Python runtime found");
                    report.python = Some(python);
                    report.python_version = Some(version);
                }
                Detection::PackageInstaller => {
                    let python = self.interpreter(&report);
                    self.check_installer(&python)?;
                    info!(python = %python, "pip found");
                }
                Detection::PackageQuery { package } => {
                    let python = self.interpreter(&report);
                    if self.ensure_package(&python, package, requirement.remediation)? {
                        report.installed_packages.push(package.clone());
                    }
                }
                Detection::ManagedRuntime => {
                    report.managed_runtime_version = self.check_managed_runtime()?;
                    info!(platform = %self.platform, "Mono toolchain found");
                }
            }
        }

        Ok(report)
    }

    /// Interpreter names tried in order when none is configured.
    fn python_candidates(&self) -> Vec<String> {
        match &self.python_override {
            Some(python) => vec![python.clone()],
            None if self.platform == HostPlatform::Windows => {
                vec!["python".to_string(), "python3".to_string()]
            }
            None => vec!["python3".to_string(), "python".to_string()],
        }
    }

    fn interpreter(&self, report: &ValidationReport) -> String {
        report
            .python
            .clone()
            .or_else(|| self.python_candidates().into_iter().next())
            .unwrap_or_else(|| "python3".to_string())
    }

    fn check_runtime(
        &self,
        minimum: Option<Version>,
    ) -> Result<(String, Version), ValidationError> {
        info!("Checking Python installation...");
        let candidates = self.python_candidates();

        for python in &candidates {
            let output = match self.runner.run(&CommandSpec::new(python, ["--version"])) {
                Ok(output) if output.success() => output,
                Ok(output) => {
                    debug!(python = %python, status = %output.status_text(), "Interpreter probe failed");
                    continue;
                }
                Err(e) => {
                    debug!(python = %python, error = %e, "Interpreter not usable");
                    continue;
                }
            };

            // Python 2 prints its banner on stderr
            let banner = output.combined();
            let version = Version::parse_banner(&banner).ok_or_else(|| {
                ValidationError::RuntimeVersionUnreadable {
                    program: python.clone(),
                    output: banner.trim().to_string(),
                }
            })?;

            if let Some(required) = minimum {
                if version < required {
                    return Err(ValidationError::RuntimeTooOld {
                        program: python.clone(),
                        found: version,
                        required,
                    });
                }
            }
            return Ok((python.clone(), version));
        }

        Err(ValidationError::RuntimeMissing { tried: candidates })
    }

    fn check_installer(&self, python: &str) -> Result<(), ValidationError> {
        self.runner
            .run_checked(&CommandSpec::new(python, ["-m", "pip", "--version"]))
            .map(|_| ())
            .map_err(|e| ValidationError::InstallerMissing {
                python: python.to_string(),
                detail: e.to_string(),
            })
    }

    /// Explicit registry lookup: `pip show` exits non-zero for unknown packages.
    pub fn query_package(&self, python: &str, package: &str) -> Result<PackageStatus, ValidationError> {
        let spec = CommandSpec::new(python, ["-m", "pip", "show", package]);
        match self.runner.run(&spec) {
            Ok(output) if output.success() => Ok(PackageStatus::Present),
            Ok(_) => Ok(PackageStatus::Missing),
            Err(e) => Err(ValidationError::InstallerMissing {
                python: python.to_string(),
                detail: e.to_string(),
            }),
        }
    }

    /// Returns `true` when the package had to be installed.
    fn ensure_package(
        &self,
        python: &str,
        package: &str,
        remediation: RemediationAction,
    ) -> Result<bool, ValidationError> {
        if self.query_package(python, package)? == PackageStatus::Present {
            debug!(package = %package, "Package present");
            return Ok(false);
        }

        if remediation == RemediationAction::InstructAndAbort {
            return Err(ValidationError::DependencyStillMissing {
                python: python.to_string(),
                package: package.to_string(),
            });
        }

        info!("Installing {}...", package);
        self.runner
            .run_checked(&CommandSpec::new(python, ["-m", "pip", "install", package]))
            .map_err(|source| ValidationError::DependencyInstallFailed {
                python: python.to_string(),
                package: package.to_string(),
                source,
            })?;

        match self.query_package(python, package)? {
            PackageStatus::Present => Ok(true),
            PackageStatus::Missing => Err(ValidationError::DependencyStillMissing {
                python: python.to_string(),
                package: package.to_string(),
            }),
        }
    }

    fn check_managed_runtime(&self) -> Result<Option<Version>, ValidationError> {
        info!("Checking Mono installation...");

        if self.platform == HostPlatform::Windows {
            let missing: Vec<String> = ["mono", "msbuild"]
                .iter()
                .filter(|program| self.runner.locate(program).is_none())
                .map(|program| program.to_string())
                .collect();

            if !missing.is_empty() {
                return Err(self.toolchain_missing(missing));
            }
            return Ok(None);
        }

        // Every failure mode (not found, spawn error, non-zero exit) is the same here
        let probe = CommandSpec::new("mono", ["--version"]);
        match self.runner.run_checked(&probe) {
            Ok(output) => Ok(Version::parse_banner(&output.stdout)),
            Err(e) => {
                if !matches!(e, HostError::NotFound { .. }) {
                    debug!(error = %e, "mono --version failed");
                }
                Err(self.toolchain_missing(vec!["mono".to_string()]))
            }
        }
    }

    fn toolchain_missing(&self, missing: Vec<String>) -> ValidationError {
        warn!(platform = %self.platform, missing = ?missing, "Mono toolchain not available");
        ValidationError::ToolchainMissing {
            platform: self.platform,
            missing,
        }
    }
}
