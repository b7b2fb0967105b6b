//! Engine Forge Core Library
//!
//! Provisioning pipeline for a custom Godot 3.x build: toolchain validation,
//! upstream tree provisioning, module integration and build environment
//! preparation, sequenced by the [`Orchestrator`].

pub mod build_config;
pub mod config;
pub mod error;
pub mod git;
pub mod hints;
pub mod integrate;
pub mod obs;
pub mod pipeline;
pub mod prepare;
pub mod provision;
pub mod stage;
pub mod telemetry;
pub mod toolchain;

pub use build_config::{BuildConfig, FeatureFlag};

pub use config::{ConfigError, DirtyTreePolicy, ForgeConfig, ModuleSpec, RepoSpec};

pub use error::{
    managed_runtime_remediation, ErrorKind, IntegrationError, PipelineError, PrepareError,
    ProvisionError, Result, ValidationError,
};

pub use hints::{build_hints, render_next_steps, BuildHint};
pub use integrate::{IntegratedModule, ModuleIntegrator};
pub use pipeline::{
    ModuleRecord, Orchestrator, PipelineReport, PipelineRun, ReportedError, StepTiming,
};
pub use prepare::{BuildEnvironmentPreparer, PreparedEnvironment};
pub use provision::{ProvisionOutcome, SourceTreeProvisioner};
pub use stage::{PipelineState, PipelineStep, StateMachine, TransitionError};
pub use telemetry::init_tracing;
pub use toolchain::{
    Detection, PackageStatus, RemediationAction, ToolchainRequirement, ToolchainValidator,
    ValidationReport, MIN_PYTHON, REQUIRED_PACKAGES,
};
