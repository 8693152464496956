//! The `TestRun` record and its phase machine.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::inventory::TestTarget;
use crate::state::{AuditSnapshot, Delta};

// ============================================================================
// Phase
// ============================================================================

/// Where a run is in its lifecycle.
///
/// Non-terminal phases advance strictly one step at a time; `Failed` is
/// reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    EnvironmentValidated,
    PreAudited,
    ChangeApplied,
    PostAudited,
    Validated,
    SideEffectsChecked,
    Completed,
    Failed,
}

impl Phase {
    fn ordinal(self) -> u8 {
        match self {
            Phase::Init => 0,
            Phase::EnvironmentValidated => 1,
            Phase::PreAudited => 2,
            Phase::ChangeApplied => 3,
            Phase::PostAudited => 4,
            Phase::Validated => 5,
            Phase::SideEffectsChecked => 6,
            Phase::Completed => 7,
            Phase::Failed => u8::MAX,
        }
    }

    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Returns true if `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Phase::Failed || next.ordinal() == self.ordinal() + 1
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Init => "init",
            Phase::EnvironmentValidated => "environment_validated",
            Phase::PreAudited => "pre_audited",
            Phase::ChangeApplied => "change_applied",
            Phase::PostAudited => "post_audited",
            Phase::Validated => "validated",
            Phase::SideEffectsChecked => "side_effects_checked",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Failures and rollback
// ============================================================================

/// Failure taxonomy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Device unreachable or command timeout, after adapter-level retries
    ConnectivityFailure,
    /// Post-state does not match the requested change
    ValidationFailure,
    /// A port other than the target changed
    SideEffectFailure,
    /// Restoring the original VLAN failed
    RollbackFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ConnectivityFailure => "ConnectivityFailure",
            FailureKind::ValidationFailure => "ValidationFailure",
            FailureKind::SideEffectFailure => "SideEffectFailure",
            FailureKind::RollbackFailure => "RollbackFailure",
        };
        write!(f, "{s}")
    }
}

/// What happened when restoring the original VLAN.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RollbackOutcome {
    #[default]
    NotAttempted,
    Succeeded,
    Failed { reason: String },
}

/// Overall verdict of a finalized run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Passed,
    /// The change validated but the original VLAN could not be restored
    PassedRollbackFailed,
    Failed,
}

impl RunOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Passed => 0,
            RunOutcome::Failed => 1,
            RunOutcome::PassedRollbackFailed => 2,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Passed => "PASSED",
            RunOutcome::PassedRollbackFailed => "PASSED (rollback failed)",
            RunOutcome::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// TestRun
// ============================================================================

/// One end-to-end change validation.
///
/// Only the orchestrator mutates a `TestRun`. Finalizing consumes it and
/// yields a read-only [`FinalizedRun`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub run_id: Uuid,
    /// Human-facing id, `%Y%m%d_%H%M%S` local time plus a run id prefix; names the stored artifacts
    pub test_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,

    pub target_device: String,
    pub target_interface: String,
    pub target_vlan: String,
    pub voice_vlan: Option<String>,
    /// Access VLAN read from the pre-audit, used for rollback
    pub original_vlan: Option<String>,

    pub phase: Phase,
    pub success: bool,
    pub changes_applied: bool,
    pub rollback_performed: bool,
    pub rollback: RollbackOutcome,

    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub failures: Vec<FailureKind>,

    pub pre_snapshot_id: Option<String>,
    pub post_snapshot_id: Option<String>,

    #[serde(skip)]
    pub pre_audit: Option<AuditSnapshot>,
    #[serde(skip)]
    pub post_audit: Option<AuditSnapshot>,
    #[serde(skip)]
    pub delta: Option<Delta>,
}

/// Local start time plus the first eight hex digits of the run id, so two
/// runs started in the same second never share snapshot ids.
fn make_test_id(start: &DateTime<Local>, run_id: &Uuid) -> String {
    let suffix = run_id.simple().to_string();
    format!("{}_{}", start.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

impl TestRun {
    pub fn new(target: &TestTarget) -> Self {
        let now = Local::now();
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            test_id: make_test_id(&now, &run_id),
            start_time: now.with_timezone(&Utc),
            end_time: None,
            target_device: target.device.clone(),
            target_interface: target.interface.clone(),
            target_vlan: target.test_vlan.to_string(),
            voice_vlan: target.voice_vlan.as_ref().map(ToString::to_string),
            original_vlan: None,
            phase: Phase::Init,
            success: false,
            changes_applied: false,
            rollback_performed: false,
            rollback: RollbackOutcome::NotAttempted,
            errors: Vec::new(),
            warnings: Vec::new(),
            failures: Vec::new(),
            pre_snapshot_id: None,
            post_snapshot_id: None,
            pre_audit: None,
            post_audit: None,
            delta: None,
        }
    }

    /// Moves to `next`, refusing backwards moves, skips and moves out of a
    /// terminal phase.
    pub fn advance_to(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(Error::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
        Ok(())
    }

    /// `device:interface` of the target port.
    pub fn target_label(&self) -> String {
        format!("{}:{}", self.target_device, self.target_interface)
    }

    pub(crate) fn record_failure(&mut self, kind: FailureKind, message: impl fmt::Display) {
        self.errors.push(format!("{kind}: {message}"));
        if !self.failures.contains(&kind) {
            self.failures.push(kind);
        }
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Returns true if a failure of `kind` was recorded.
    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.failures.contains(&kind)
    }

    pub fn outcome(&self) -> RunOutcome {
        match (self.success, &self.rollback) {
            (true, RollbackOutcome::Failed { .. }) => RunOutcome::PassedRollbackFailed,
            (true, _) => RunOutcome::Passed,
            (false, _) => RunOutcome::Failed,
        }
    }

    /// Closes the record. A run that got through side-effect checking with
    /// no failures completes; anything else ends `Failed`.
    pub(crate) fn finalize(mut self) -> FinalizedRun {
        let passed = self.phase == Phase::SideEffectsChecked
            && !self.failures.iter().any(|k| *k != FailureKind::RollbackFailure);
        self.success = passed;
        let terminal = if passed { Phase::Completed } else { Phase::Failed };
        if self.phase != terminal {
            self.phase = terminal;
        }
        self.end_time = Some(Utc::now());
        FinalizedRun(self)
    }
}

/// A run that reached a terminal phase. Read-only.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct FinalizedRun(TestRun);

impl FinalizedRun {
    pub fn run(&self) -> &TestRun {
        &self.0
    }
}

impl std::ops::Deref for FinalizedRun {
    type Target = TestRun;

    fn deref(&self) -> &TestRun {
        &self.0
    }
}
