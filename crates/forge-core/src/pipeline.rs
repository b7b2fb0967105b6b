//! Pipeline orchestration and run reporting.
//!
//! The [`Orchestrator`] drives the four steps through the
//! [`StateMachine`](crate::stage::StateMachine): each step only starts once
//! the previous one succeeded, and the first failure moves the run to
//! `Failed` with nothing further attempted.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use forge_host::{CommandRunner, DirDigest};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::build_config::BuildConfig;
use crate::config::ForgeConfig;
use crate::error::{ErrorKind, PipelineError};
use crate::hints::render_next_steps;
use crate::integrate::ModuleIntegrator;
use crate::obs::{self, RunSpan};
use crate::prepare::BuildEnvironmentPreparer;
use crate::provision::SourceTreeProvisioner;
use crate::stage::{PipelineState, PipelineStep, StateMachine};
use crate::toolchain::ToolchainValidator;

/// Wall-clock duration of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTiming {
    pub step: PipelineStep,
    pub duration_ms: u64,
    pub succeeded: bool,
}

/// Integrated module as recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    pub digest: DirDigest,
    pub replaced: bool,
}

/// Failure as recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub kind: ErrorKind,
    pub message: String,
    pub remediation: Option<String>,
}

/// Machine-readable summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_state: PipelineState,
    /// Every state visited, in order.
    pub states: Vec<PipelineState>,
    pub steps: Vec<StepTiming>,
    /// Whether this run cloned the upstream tree.
    pub cloned: bool,
    /// Upstream HEAD after checkout, when it could be read.
    pub upstream_head: Option<String>,
    /// Packages installed by the validator during this run.
    pub installed_packages: Vec<String>,
    pub modules: Vec<ModuleRecord>,
    pub error: Option<ReportedError>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == PipelineState::Done
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Outcome of [`Orchestrator::execute`].
#[derive(Debug)]
pub struct PipelineRun {
    pub report: PipelineReport,
    pub error: Option<PipelineError>,
}

impl PipelineRun {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Zero on success, otherwise the code for the failure class.
    pub fn exit_code(&self) -> ExitCode {
        match &self.error {
            None => ExitCode::SUCCESS,
            Some(e) => e.exit_code(),
        }
    }
}

/// Runs validation, provisioning, integration and preparation in order.
pub struct Orchestrator {
    config: ForgeConfig,
    build: BuildConfig,
    runner: Arc<dyn CommandRunner>,
}

impl Orchestrator {
    pub fn new(config: ForgeConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            build: BuildConfig::default(),
            runner,
        }
    }

    /// Build configuration used for the next-step hints.
    pub fn with_build_config(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Validator configured for this host and interpreter.
    pub fn validator(&self) -> ToolchainValidator {
        ToolchainValidator::new(self.runner.clone(), self.config.platform)
            .with_python(self.config.python.clone())
    }

    /// Execute every step and return the report, without printing anything.
    pub fn execute(&self) -> PipelineRun {
        self.execute_with(|_| {})
    }

    /// Like [`execute`](Self::execute), calling `on_step` as each step starts.
    pub fn execute_with(&self, mut on_step: impl FnMut(PipelineStep)) -> PipelineRun {
        let run_id = Uuid::new_v4().to_string();
        let _span = RunSpan::enter(&run_id);
        let started_at = Utc::now();
        let start = Instant::now();

        let upstream = self.config.resolved_upstream();
        obs::emit_pipeline_started(&run_id, &upstream.url, &upstream.pinned_ref);

        let mut machine = StateMachine::new();
        let mut report = PipelineReport {
            run_id: run_id.clone(),
            started_at,
            finished_at: started_at,
            final_state: machine.current(),
            states: Vec::new(),
            steps: Vec::new(),
            cloned: false,
            upstream_head: None,
            installed_packages: Vec::new(),
            modules: Vec::new(),
            error: None,
        };

        let mut error = None;
        for step in PipelineStep::ALL {
            on_step(step);
            obs::emit_step_started(&run_id, step);
            let step_start = Instant::now();
            let outcome = self.run_step(step, &mut report);
            let duration_ms = step_start.elapsed().as_millis() as u64;

            report.steps.push(StepTiming {
                step,
                duration_ms,
                succeeded: outcome.is_ok(),
            });

            match outcome {
                Ok(()) => {
                    obs::emit_step_finished(&run_id, step, duration_ms);
                    let advanced = machine.advance();
                    debug_assert!(advanced.is_ok(), "step order out of sync: {advanced:?}");
                }
                Err(e) => {
                    obs::emit_pipeline_failed(&run_id, machine.current(), e.kind().name(), &e);
                    let failed = machine.fail();
                    debug_assert!(failed.is_ok(), "failure from terminal state: {failed:?}");
                    report.error = Some(ReportedError {
                        kind: e.kind(),
                        message: e.to_string(),
                        remediation: e.remediation(),
                    });
                    error = Some(e);
                    break;
                }
            }
        }

        report.final_state = machine.current();
        report.states = machine.history().to_vec();
        report.finished_at = Utc::now();

        if error.is_none() {
            obs::emit_pipeline_finished(
                &run_id,
                start.elapsed().as_millis() as u64,
                report.cloned,
            );
        }

        PipelineRun { report, error }
    }

    fn run_step(&self, step: PipelineStep, report: &mut PipelineReport) -> Result<(), PipelineError> {
        match step {
            PipelineStep::Validate => {
                let validation = self.validator().validate()?;
                report.installed_packages = validation.installed_packages;
            }
            PipelineStep::Provision => {
                let outcome = SourceTreeProvisioner::new(self.runner.clone())
                    .with_dirty_tree_policy(self.config.dirty_tree)
                    .provision(&self.config.resolved_upstream())?;
                report.cloned = outcome.cloned;
                report.upstream_head = outcome.head;
            }
            PipelineStep::Integrate => {
                let integrated = ModuleIntegrator::new()
                    .integrate(&self.config.resolved_modules(), &self.config.upstream_dir())?;
                report.modules = integrated
                    .into_iter()
                    .map(|m| ModuleRecord {
                        name: m.name,
                        digest: m.digest,
                        replaced: m.replaced,
                    })
                    .collect();
            }
            PipelineStep::Prepare => {
                BuildEnvironmentPreparer::new().prepare(
                    &self.config.config_file_path(),
                    &self.config.upstream_dir(),
                    &self.config.build_dir_path(),
                )?;
            }
        }
        Ok(())
    }

    /// Execute the pipeline, print hints or remediation, and map the
    /// outcome to a process exit code.
    pub fn run(&self) -> ExitCode {
        let run = self.execute_with(|step| println!("{}", step.progress_message()));

        if let Some(path) = &self.config.report_path {
            let path = self.config.resolve(path);
            match run.report.write_to(&path) {
                Ok(()) => info!(path = ?path, "Run report written"),
                Err(e) => eprintln!("warning: could not write run report to {}: {}", path.display(), e),
            }
        }

        match &run.error {
            None => {
                println!("Setup completed successfully!");
                println!();
                print!("{}", render_next_steps(&self.build, self.config.platform));
            }
            Some(e) => {
                eprintln!("error: {}", e);
                if let Some(remediation) = e.remediation() {
                    eprintln!();
                    eprintln!("{}", remediation);
                }
            }
        }

        run.exit_code()
    }
}
