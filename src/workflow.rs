//! Provisioning workflow.
//!
//! [`ProvisioningService`] owns the collaborators and the Status Publisher and
//! runs the four actions a write can trigger. Actions never fail outward: every
//! collaborator failure is logged where it happens and the action carries on
//! with what it has. Whenever connectivity may have changed, an action ends by
//! publishing current truth (IP snapshot and status), because a write without
//! response cannot carry a reply.

use crate::gatt::StatusPublisher;
use crate::network::{NetworkClient, ResetActuator, WifiApplyResult, WifiCredentials};
use log::{info, warn};
use std::fmt;
use std::sync::Arc;

/// An action bound to a write characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowAction {
    /// Publish IP snapshot and status.
    Refresh,
    /// Apply Wi-Fi credentials, then refresh.
    ConfigureWifi,
    /// Start a factory reset. Nothing is published.
    Reset,
    /// Publish the IP snapshot only.
    ReadIpSnapshot,
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Refresh => "refresh",
            Self::ConfigureWifi => "configure-wifi",
            Self::Reset => "reset",
            Self::ReadIpSnapshot => "read-ip-snapshot",
        };
        f.write_str(name)
    }
}

/// Service context shared by every write handler.
pub struct ProvisioningService<C, R> {
    client: C,
    reset: R,
    publisher: Arc<StatusPublisher>,
}

impl<C: NetworkClient, R: ResetActuator> ProvisioningService<C, R> {
    pub fn new(client: C, reset: R) -> Self {
        Self {
            client,
            reset,
            publisher: Arc::new(StatusPublisher::new()),
        }
    }

    /// Response characteristics, shared with the GATT binding.
    pub fn publisher(&self) -> &Arc<StatusPublisher> {
        &self.publisher
    }

    #[cfg(test)]
    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    #[cfg(test)]
    pub(crate) fn reset_actuator(&self) -> &R {
        &self.reset
    }

    /// Run `action` with the raw write payload.
    pub async fn run(&self, action: WorkflowAction, payload: &[u8]) {
        match action {
            WorkflowAction::Refresh => self.refresh().await,
            WorkflowAction::ConfigureWifi => self.configure_wifi(payload).await,
            WorkflowAction::Reset => self.reset(payload).await,
            WorkflowAction::ReadIpSnapshot => self.read_ip_snapshot().await,
        }
    }

    /// Publish the IP snapshot and `online`/`offline`.
    ///
    /// A failed IP fetch leaves the IP characteristic as it was; a failed
    /// health check publishes `offline`.
    pub async fn refresh(&self) {
        let (snapshot, health) = tokio::join!(
            self.client.fetch_ip_snapshot(),
            self.client.check_internet_health()
        );

        if let Ok(snapshot) = snapshot {
            self.publisher.publish_ip(&snapshot).await;
        }

        let online = match health {
            Ok(status) => {
                if !status.success {
                    info!("Internet unreachable: {}", status.message);
                }
                status.success
            }
            Err(_) => false,
        };
        self.publisher.publish_status(online).await;
    }

    /// Forward credentials to the service, then refresh regardless of outcome.
    ///
    /// The payload goes out verbatim; the service is the one that rejects bad
    /// JSON. The apply result itself is only logged.
    pub async fn configure_wifi(&self, payload: &[u8]) {
        match WifiCredentials::from_payload(payload) {
            Ok(creds) => info!(
                "Applying Wi-Fi settings for {:?} ({})",
                creds.ssid,
                if creds.is_open() { "open" } else { "secured" }
            ),
            Err(e) => warn!("Wi-Fi settings payload looks wrong ({}), forwarding anyway", e),
        }

        match self
            .client
            .apply_wifi_credentials(payload)
            .await
            .and_then(WifiApplyResult::into_result)
        {
            Ok(()) => info!("Wi-Fi settings applied"),
            Err(e) => warn!("Wi-Fi settings not applied: {}", e),
        }

        self.refresh().await;
    }

    /// Ask the reset actuator to wipe the device. Fire-and-forget.
    pub async fn reset(&self, payload: &[u8]) {
        info!("Factory reset requested");
        match self.reset.trigger_reset(payload).await {
            Ok(ack) => info!("Factory reset acknowledged {}", ack.detail),
            Err(e) => warn!("Factory reset failed: {}", e),
        }
    }

    /// Publish the IP snapshot only.
    pub async fn read_ip_snapshot(&self) {
        if let Ok(snapshot) = self.client.fetch_ip_snapshot().await {
            self.publisher.publish_ip(&snapshot).await;
        }
    }
}
