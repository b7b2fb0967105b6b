//! Structured lifecycle events for pipeline runs.
//!
//! Every run is wrapped in a [`RunSpan`] so all events it logs carry its
//! `run_id`. The `emit_*` functions log one `event = "pipeline.*"` line each.

use tracing::{info, warn};

use crate::stage::{PipelineState, PipelineStep};

/// RAII guard that keeps a run-scoped span entered.
///
/// ```ignore
/// let _span = RunSpan::enter("5f0c...");
/// // events logged here carry run_id = "5f0c..."
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("forge.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_pipeline_started(run_id: &str, upstream_url: &str, pinned_ref: &str) {
    info!(
        event = "pipeline.started",
        run_id = %run_id,
        upstream_url = %upstream_url,
        pinned_ref = %pinned_ref,
    );
}

pub fn emit_step_started(run_id: &str, step: PipelineStep) {
    info!(event = "pipeline.step_started", run_id = %run_id, step = %step);
}

pub fn emit_step_finished(run_id: &str, step: PipelineStep, duration_ms: u64) {
    info!(
        event = "pipeline.step_finished",
        run_id = %run_id,
        step = %step,
        duration_ms = duration_ms,
    );
}

/// Run reached `Done`.
pub fn emit_pipeline_finished(run_id: &str, duration_ms: u64, cloned: bool) {
    info!(
        event = "pipeline.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        cloned = cloned,
    );
}

/// Run reached `Failed` while in `state` (warning level).
pub fn emit_pipeline_failed(
    run_id: &str,
    state: PipelineState,
    kind: &str,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "pipeline.failed",
        run_id = %run_id,
        state = %state,
        kind = %kind,
        error = %error,
    );
}
