//! End-to-end VLAN change validation.
//!
//! The [`Orchestrator`] drives one [`TestRun`] through its phases:
//!
//! ```text
//! Init -> EnvironmentValidated -> PreAudited -> ChangeApplied -> PostAudited
//!      -> Validated -> SideEffectsChecked -> Completed
//! ```
//!
//! Any phase may instead end in `Failed`. Once the change has been applied,
//! rollback to the original VLAN is attempted on every exit path, and the
//! record is finalized exactly once into a [`FinalizedRun`].

pub mod record;

pub use record::{FailureKind, FinalizedRun, Phase, RollbackOutcome, RunOutcome, TestRun};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{Error, Result};
use crate::inventory::{Credentials, Inventory, TestTarget};
use crate::state::{
    capture_all, diff, AuditSnapshot, PortChange, SnapshotStore, NO_VOICE_VLAN, UNKNOWN,
};
use crate::traits::{ApplyError, ChangeApplier, ChangeRequest, DeviceAdapter};

/// Tunables for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Restore the original VLAN at the end of the run
    pub rollback: bool,
    /// Wait between applying the change and the post-audit
    pub settle_delay: Duration,
    /// Per-command timeout handed to the adapter and applier
    pub command_timeout: Duration,
    /// Devices captured at once during an audit
    pub max_concurrent: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            rollback: true,
            settle_delay: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
            max_concurrent: 1,
        }
    }
}

impl RunOptions {
    pub fn with_rollback(mut self, rollback: bool) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }
}

/// Why a phase stopped the run.
#[derive(Debug)]
struct PhaseFailure {
    kind: FailureKind,
    messages: Vec<String>,
}

impl PhaseFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            messages: vec![message.into()],
        }
    }
}

impl From<Error> for PhaseFailure {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::EnvironmentValidation { .. } | Error::Connection(_) => {
                FailureKind::ConnectivityFailure
            }
            _ => FailureKind::ValidationFailure,
        };
        Self::new(kind, err.to_string())
    }
}

type PhaseResult = std::result::Result<(), PhaseFailure>;

/// Stored snapshot id for a run's pre-change audit.
pub fn pre_snapshot_id(test_id: &str) -> String {
    format!("pre_test_audit_{test_id}")
}

/// Stored snapshot id for a run's post-change audit.
pub fn post_snapshot_id(test_id: &str) -> String {
    format!("post_test_audit_{test_id}")
}

/// Coordinates capture, change, validation and rollback for one target.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    adapter: Arc<dyn DeviceAdapter>,
    applier: Arc<dyn ChangeApplier>,
    store: Arc<dyn SnapshotStore>,
    inventory: Inventory,
    credentials: Credentials,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        adapter: Arc<dyn DeviceAdapter>,
        applier: Arc<dyn ChangeApplier>,
        store: Arc<dyn SnapshotStore>,
        inventory: Inventory,
        credentials: Credentials,
    ) -> Self {
        Self {
            adapter,
            applier,
            store,
            inventory,
            credentials,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Trial-captures every inventory device.
    ///
    /// Fails with [`Error::EnvironmentValidation`] listing every device that
    /// could not be captured.
    pub async fn validate_environment(&self) -> Result<()> {
        if self.inventory.is_empty() {
            return Err(Error::Config("inventory contains no devices".to_string()));
        }
        info!(devices = self.inventory.len(), "Validating environment");

        let capture = capture_all(
            self.adapter.as_ref(),
            &self.inventory,
            &self.credentials,
            self.options.command_timeout,
            self.options.max_concurrent,
        )
        .await;

        if capture.failed.is_empty() {
            info!("All devices reachable");
            Ok(())
        } else {
            Err(Error::EnvironmentValidation {
                unreachable: capture.failed_devices(),
            })
        }
    }

    /// Captures the whole fleet once, without a run around it.
    pub async fn audit(&self) -> crate::state::FleetCapture {
        capture_all(
            self.adapter.as_ref(),
            &self.inventory,
            &self.credentials,
            self.options.command_timeout,
            self.options.max_concurrent,
        )
        .await
    }

    /// Runs the full change validation for `target`.
    ///
    /// Never returns early: whatever happens, the result is a finalized
    /// record with `success` and `phase` set.
    pub async fn run(&self, target: &TestTarget) -> FinalizedRun {
        let mut run = TestRun::new(target);
        let span = info_span!(
            "run",
            test_id = %run.test_id,
            device = %run.target_device,
            interface = %run.target_interface,
        );

        async move {
            info!(vlan = %run.target_vlan, "Starting VLAN change test");

            if let Err(failure) = self.execute(&mut run).await {
                for message in &failure.messages {
                    error!(kind = %failure.kind, phase = %run.phase, "{}", message);
                    run.record_failure(failure.kind, message);
                }
                if let Err(e) = run.advance_to(Phase::Failed) {
                    debug!(error = %e, "Run already terminal");
                }
            }

            self.cleanup(&mut run).await;

            let finalized = run.finalize();
            info!(
                outcome = %finalized.outcome(),
                errors = finalized.errors.len(),
                warnings = finalized.warnings.len(),
                "Test finished"
            );
            finalized
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, run: &mut TestRun) -> PhaseResult {
        self.validate_environment().await?;
        run.advance_to(Phase::EnvironmentValidated)?;

        self.pre_audit(run).await?;
        run.advance_to(Phase::PreAudited)?;

        self.apply_change(run).await?;
        run.advance_to(Phase::ChangeApplied)?;

        self.post_audit(run).await?;
        run.advance_to(Phase::PostAudited)?;

        Self::validate_change(run)?;
        run.advance_to(Phase::Validated)?;

        Self::check_side_effects(run)?;
        run.advance_to(Phase::SideEffectsChecked)?;

        Ok(())
    }

    // ========================================================================
    // Phases
    // ========================================================================

    async fn capture_phase(
        &self,
        run: &mut TestRun,
        label: &str,
    ) -> std::result::Result<AuditSnapshot, PhaseFailure> {
        let capture = self.audit().await;
        for w in capture.warnings {
            run.warn(format!("{label}: {w}"));
        }
        for failed in &capture.failed {
            run.warn(format!(
                "{label}: device {} not captured ({})",
                failed.device, failed.reason
            ));
        }
        if capture.snapshot.is_empty() {
            return Err(PhaseFailure::new(
                FailureKind::ConnectivityFailure,
                format!("{label} captured no devices"),
            ));
        }
        Ok(capture.snapshot)
    }

    fn save_snapshot(&self, run: &mut TestRun, id: &str, snapshot: &AuditSnapshot) -> bool {
        match self.store.save(id, snapshot) {
            Ok(()) => {
                debug!(id = %id, devices = snapshot.len(), "Snapshot saved");
                true
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to save snapshot");
                run.warn(format!("could not save snapshot {id}: {e}"));
                false
            }
        }
    }

    async fn pre_audit(&self, run: &mut TestRun) -> PhaseResult {
        info!("Capturing pre-change audit");
        let snapshot = self.capture_phase(run, "pre-audit").await?;

        let id = pre_snapshot_id(&run.test_id);
        if self.save_snapshot(run, &id, &snapshot) {
            run.pre_snapshot_id = Some(id);
        }

        let Some(port) = snapshot.port(&run.target_device, &run.target_interface) else {
            let what = if snapshot.contains(&run.target_device) {
                format!("interface {} not found in pre-audit", run.target_label())
            } else {
                format!("target device {} missing from pre-audit", run.target_device)
            };
            run.pre_audit = Some(snapshot);
            return Err(PhaseFailure::new(FailureKind::ValidationFailure, what));
        };

        if port.access_vlan == UNKNOWN {
            let message = format!(
                "original VLAN of {} could not be determined",
                run.target_label()
            );
            run.pre_audit = Some(snapshot);
            return Err(PhaseFailure::new(FailureKind::ValidationFailure, message));
        }

        info!(original_vlan = %port.access_vlan, "Recorded original VLAN");
        if port.access_vlan == run.target_vlan {
            run.warn(format!(
                "{} is already in VLAN {}",
                run.target_label(),
                run.target_vlan
            ));
        }
        run.original_vlan = Some(port.access_vlan.clone());
        run.pre_audit = Some(snapshot);
        Ok(())
    }

    async fn apply_change(&self, run: &mut TestRun) -> PhaseResult {
        let device = self.inventory.device(&run.target_device)?;
        let request = ChangeRequest::new(&run.target_device, &run.target_interface, &run.target_vlan)
            .with_voice_vlan(run.voice_vlan.clone());

        info!(vlan = %request.vlan, "Applying VLAN change");
        self.applier
            .apply(device, &self.credentials, &request, self.options.command_timeout)
            .await
            .map_err(|e| {
                let kind = match e {
                    ApplyError::Connection { .. } => FailureKind::ConnectivityFailure,
                    ApplyError::Rejected(_) => FailureKind::ValidationFailure,
                };
                PhaseFailure::new(kind, format!("failed to apply change: {e}"))
            })?;

        run.changes_applied = true;
        Ok(())
    }

    async fn post_audit(&self, run: &mut TestRun) -> PhaseResult {
        if !self.options.settle_delay.is_zero() {
            info!(delay = ?self.options.settle_delay, "Waiting for change to settle");
            tokio::time::sleep(self.options.settle_delay).await;
        }

        info!("Capturing post-change audit");
        let snapshot = self.capture_phase(run, "post-audit").await?;

        let id = post_snapshot_id(&run.test_id);
        if self.save_snapshot(run, &id, &snapshot) {
            run.post_snapshot_id = Some(id);
        }
        run.post_audit = Some(snapshot);
        Ok(())
    }

    fn validate_change(run: &mut TestRun) -> PhaseResult {
        let label = run.target_label();
        let port = run
            .post_audit
            .as_ref()
            .and_then(|s| s.port(&run.target_device, &run.target_interface))
            .cloned()
            .ok_or_else(|| {
                PhaseFailure::new(
                    FailureKind::ValidationFailure,
                    format!("target interface {label} not found in post-audit"),
                )
            })?;

        if port.access_vlan != run.target_vlan {
            return Err(PhaseFailure::new(
                FailureKind::ValidationFailure,
                format!(
                    "{label} access VLAN is {}, expected {}",
                    port.access_vlan, run.target_vlan
                ),
            ));
        }

        if !port.is_link_up() {
            run.warn(format!(
                "{label} operational status is {}",
                port.operational_status
            ));
        }
        if let Some(voice) = run.voice_vlan.clone() {
            if port.voice_vlan != voice {
                run.warn(format!(
                    "{label} voice VLAN is {}, expected {voice}",
                    port.voice_vlan
                ));
            }
        }

        info!(vlan = %port.access_vlan, "Target port validated");
        Ok(())
    }

    fn check_side_effects(run: &mut TestRun) -> PhaseResult {
        let (Some(pre), Some(post)) = (&run.pre_audit, &run.post_audit) else {
            return Err(PhaseFailure::new(
                FailureKind::ValidationFailure,
                "side-effect check needs both audits",
            ));
        };
        let delta = diff(pre, post);

        let mut warnings = Vec::new();
        let mut violations = Vec::new();

        for device in &delta.removed_devices {
            warnings.push(format!("device {device} missing from post-audit"));
        }
        for device in &delta.added_devices {
            warnings.push(format!("device {device} appeared in post-audit"));
        }

        for (device, interface, change) in delta.port_changes() {
            if device == run.target_device && interface == run.target_interface {
                continue;
            }
            let port = format!("{device}:{interface}");
            match change {
                PortChange::Presence { .. } if change.is_removed() => {
                    warnings.push(format!("port {port} missing from post-audit"));
                }
                PortChange::Presence { .. } => {
                    warnings.push(format!("port {port} appeared in post-audit"));
                }
                PortChange::Modified { .. } => {
                    if let Some(vlan) = change.field("access_vlan") {
                        violations.push(format!(
                            "unexpected VLAN change on {port} ({} -> {})",
                            vlan.before_str().unwrap_or(UNKNOWN),
                            vlan.after_str().unwrap_or(UNKNOWN)
                        ));
                    }
                    if let Some(mode) = change.field("mode") {
                        warnings.push(format!(
                            "mode change on {port} ({} -> {})",
                            mode.before_str().unwrap_or(UNKNOWN),
                            mode.after_str().unwrap_or(UNKNOWN)
                        ));
                    }
                }
            }
        }

        let summary = delta.summary();
        info!(
            changed_devices = summary.changed_devices,
            modified_ports = summary.modified_ports,
            violations = violations.len(),
            "Side-effect check finished"
        );

        run.delta = Some(delta);
        for w in warnings {
            warn!("{}", w);
            run.warn(w);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PhaseFailure {
                kind: FailureKind::SideEffectFailure,
                messages: violations,
            })
        }
    }

    // ========================================================================
    // Rollback
    // ========================================================================

    async fn cleanup(&self, run: &mut TestRun) {
        if !run.changes_applied {
            return;
        }
        let Some(original) = run.original_vlan.clone() else {
            return;
        };

        if !self.options.rollback {
            let message = format!(
                "rollback disabled, {} left in VLAN {}",
                run.target_label(),
                run.target_vlan
            );
            warn!("{}", message);
            run.warn(message);
            return;
        }

        let voice = run
            .pre_audit
            .as_ref()
            .and_then(|s| s.port(&run.target_device, &run.target_interface))
            .map(|p| p.voice_vlan.clone())
            .filter(|v| v != NO_VOICE_VLAN && v != UNKNOWN);
        let request = ChangeRequest::new(&run.target_device, &run.target_interface, &original)
            .with_voice_vlan(voice);

        info!(vlan = %original, "Rolling back to original VLAN");
        let result = match self.inventory.device(&run.target_device) {
            Ok(device) => self
                .applier
                .apply(device, &self.credentials, &request, self.options.command_timeout)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => {
                info!("Rollback succeeded");
                run.rollback_performed = true;
                run.rollback = RollbackOutcome::Succeeded;
            }
            Err(reason) => {
                error!(error = %reason, "Rollback failed");
                run.record_failure(
                    FailureKind::RollbackFailure,
                    format!("could not restore {} to VLAN {original}: {reason}", run.target_label()),
                );
                run.rollback = RollbackOutcome::Failed { reason };
            }
        }
    }
}
