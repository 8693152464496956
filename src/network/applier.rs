//! Pushes access-VLAN changes to IOS switches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::ios;
use crate::connection::{ConnectionError, SessionFactory, SessionTarget};
use crate::inventory::{Credentials, DeviceEntry};
use crate::retry::RetryPolicy;
use crate::traits::{ApplyError, ChangeApplier, ChangeRequest};

/// Applies a [`ChangeRequest`] with `configure terminal`, retrying transient
/// connection failures.
#[derive(Debug, Clone)]
pub struct IosChangeApplier {
    factory: Arc<dyn SessionFactory>,
    retry: RetryPolicy,
}

impl IosChangeApplier {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            retry: RetryPolicy::constant(2, Duration::from_secs(5)),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn push_once(
        &self,
        target: &SessionTarget,
        credentials: &Credentials,
        lines: &[String],
    ) -> Result<(), ConnectionError> {
        let mut session = self.factory.open(target, credentials).await?;
        let result = session.send_config_set(lines).await;
        if let Err(e) = session.close().await {
            warn!(host = %target.host, error = %e, "Error closing session after push");
        }
        result.map(|_| ())
    }
}

#[async_trait]
impl ChangeApplier for IosChangeApplier {
    #[instrument(skip(self, device, credentials, request), fields(device = %request.device_name, interface = %request.interface))]
    async fn apply(
        &self,
        device: &DeviceEntry,
        credentials: &Credentials,
        request: &ChangeRequest,
        timeout: Duration,
    ) -> Result<(), ApplyError> {
        let target = SessionTarget::new(&device.host)
            .with_port(device.ssh_port())
            .with_timeout(timeout);
        let lines = ios::access_vlan_commands(
            &request.interface,
            &request.vlan,
            request.voice_vlan.as_deref(),
        );

        self.retry
            .execute_if(
                || self.push_once(&target, credentials, &lines),
                ConnectionError::is_transient,
            )
            .await
            .map_err(|e| {
                let attempts = e.attempts();
                match e.into_inner() {
                    ConnectionError::CommandRejected { command, output } => {
                        ApplyError::Rejected(format!("{command}: {output}"))
                    }
                    other => ApplyError::Connection {
                        attempts,
                        message: other.to_string(),
                    },
                }
            })?;

        info!(vlan = %request.vlan, "VLAN change applied");
        Ok(())
    }
}
