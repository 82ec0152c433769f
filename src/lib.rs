//! BLE provisioning agent for headless signage kiosks.
//!
//! The agent advertises one GATT service. A companion app writes to trigger
//! characteristics to refresh network status, push Wi-Fi credentials, read the
//! IP snapshot or start a factory reset; results come back as notifications on
//! the Status and IP characteristics.
//!
//! Everything except the BlueZ binding is platform-independent and can be
//! tested on any host. The binding itself needs the `bluez` feature.

pub mod agent;
pub mod config;
pub mod gatt;
pub mod identity;
pub mod network;
#[cfg(test)]
pub(crate) mod testing;
pub mod workflow;

// Re-export commonly used items
pub use agent::{Agent, StartupError};
pub use config::{AgentConfig, Cli};
pub use gatt::{CharacteristicRole, StatusPublisher};
pub use identity::DeviceIdentity;
pub use network::{HttpNetworkClient, NetworkClient, NetworkError, ResetActuator};
pub use workflow::{ProvisioningService, WorkflowAction};

#[cfg(feature = "bluez")]
pub use agent::run;
