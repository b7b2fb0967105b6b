//! Pipeline steps and the run state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four ordered steps of a setup run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    /// Toolchain checks and auxiliary package installation.
    Validate,

    /// Clone if absent, then pin the upstream tree.
    Provision,

    /// Mirror custom modules into the upstream tree.
    Integrate,

    /// Install `custom.py` and create the build directory.
    Prepare,
}

impl PipelineStep {
    /// Every step, in execution order.
    pub const ALL: [PipelineStep; 4] = [
        PipelineStep::Validate,
        PipelineStep::Provision,
        PipelineStep::Integrate,
        PipelineStep::Prepare,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::Validate => "validate",
            PipelineStep::Provision => "provision",
            PipelineStep::Integrate => "integrate",
            PipelineStep::Prepare => "prepare",
        }
    }

    /// Console line shown when the step starts.
    pub fn progress_message(&self) -> &'static str {
        match self {
            PipelineStep::Validate => "Checking build toolchain...",
            PipelineStep::Provision => "Setting up Godot repository...",
            PipelineStep::Integrate => "Installing custom modules...",
            PipelineStep::Prepare => "Setting up build environment...",
        }
    }

    /// Whether some failures of this step are remediated in place.
    ///
    /// Only validation recovers from anything (by installing missing
    /// packages); every failure of the other steps is fatal.
    pub fn auto_remediable(&self) -> bool {
        matches!(self, PipelineStep::Validate)
    }

    /// State the run is in while this step executes.
    pub fn state(&self) -> PipelineState {
        match self {
            PipelineStep::Validate => PipelineState::Validating,
            PipelineStep::Provision => PipelineState::Provisioning,
            PipelineStep::Integrate => PipelineState::Integrating,
            PipelineStep::Prepare => PipelineState::Preparing,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Validating,
    Provisioning,
    Integrating,
    Preparing,
    Done,
    Failed,
}

impl PipelineState {
    /// Successor on success. Terminal states have none.
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Validating => Some(PipelineState::Provisioning),
            PipelineState::Provisioning => Some(PipelineState::Integrating),
            PipelineState::Integrating => Some(PipelineState::Preparing),
            PipelineState::Preparing => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Validating => "validating",
            PipelineState::Provisioning => "provisioning",
            PipelineState::Integrating => "integrating",
            PipelineState::Preparing => "preparing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from driving the state machine out of order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from} to {to}")]
pub struct TransitionError {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Forward-only state machine recording every state it visits.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Validating,
            history: vec![PipelineState::Validating],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    /// Visited states, in order, starting with `Validating`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to the successor state.
    pub fn advance(&mut self) -> Result<PipelineState, TransitionError> {
        let next = self.current.next().ok_or(TransitionError {
            from: self.current,
            to: PipelineState::Done,
        })?;
        self.enter(next);
        Ok(next)
    }

    /// Move to `Failed`; allowed from any non-terminal state.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError {
                from: self.current,
                to: PipelineState::Failed,
            });
        }
        self.enter(PipelineState::Failed);
        Ok(())
    }

    fn enter(&mut self, state: PipelineState) {
        self.current = state;
        self.history.push(state);
    }
}
