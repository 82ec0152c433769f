//! Network Status Client.
//!
//! Boundary to the local network-configuration service that owns the real
//! interfaces. The provisioning workflow only sees [`NetworkClient`] and
//! [`ResetActuator`]; [`HttpNetworkClient`] is the production implementation.
//!
//! # Example
//!
//! ```ignore
//! use kiosk_ble_provisioner::config::AgentConfig;
//! use kiosk_ble_provisioner::network::{HttpNetworkClient, NetworkClient};
//!
//! let client = HttpNetworkClient::new(&AgentConfig::default())?;
//! match client.check_internet_health().await {
//!     Ok(status) => println!("online: {}", status.success),
//!     Err(e) => println!("unknown: {}", e),
//! }
//! ```

use log::warn;
use std::future::Future;

mod error;
mod http;
mod model;
mod reset;

pub use error::{Endpoint, FailureKind, NetworkError};
pub use http::HttpNetworkClient;
pub use model::{
    InterfaceInfo, IpSnapshot, NetworkStatus, PayloadError, WifiApplyResult, WifiCredentials,
    MAX_PASSWORD_LEN, MAX_SSID_LEN,
};
pub use reset::{CommandReset, ConfiguredReset, HttpReset, ResetAck, ResetActuator};

/// Operations the workflow needs from the local service.
///
/// Implementations never panic on collaborator failure; they log it and
/// return a [`NetworkError`].
pub trait NetworkClient: Send + Sync + 'static {
    /// Current IP/MAC of the wired and wireless interfaces.
    ///
    /// An error means "unknown", not "no interfaces".
    fn fetch_ip_snapshot(&self) -> impl Future<Output = Result<IpSnapshot, NetworkError>> + Send;

    /// Internet reachability right now.
    fn check_internet_health(
        &self,
    ) -> impl Future<Output = Result<NetworkStatus, NetworkError>> + Send;

    /// Forward a settings write verbatim as the JSON request body.
    fn apply_wifi_credentials(
        &self,
        payload: &[u8],
    ) -> impl Future<Output = Result<WifiApplyResult, NetworkError>> + Send;
}

/// Log a collaborator failure once and hand it back.
pub(crate) fn logged(e: NetworkError) -> NetworkError {
    warn!("{}", e);
    e
}
