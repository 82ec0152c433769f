//! GATT provisioning service.
//!
//! The companion app talks to the device through one primary service. Writes
//! to trigger characteristics start a workflow action; results come back only
//! as notifications on the two response characteristics.
//!
//! # GATT Service Structure
//!
//! ```text
//! Service: Provisioning (d6cb1959-8010-43bd-8ef7-48dbd249b984)
//! ├── Refresh (Write, Write Without Response) - refresh status and IP
//! ├── Wi-Fi Settings (Write, Write Without Response) - {"ssid", "password"} JSON
//! ├── Reset (Write, Write Without Response) - factory reset
//! ├── Read IP (Write, Write Without Response) - publish IP only (optional)
//! ├── Status (Read, Notify) - "online" / "offline"
//! └── IP (Read, Notify) - IP snapshot JSON
//! ```
//!
//! # Components
//!
//! - [`value`] - notify characteristic values and the [`StatusPublisher`]
//! - [`router`] - per-characteristic write queues feeding the workflow
//! - `bluez` - BlueZ registration and advertising (`bluez` feature only)
//!
//! # Security Considerations
//!
//! - The service is neither paired nor encrypted. Wi-Fi credentials travel as
//!   plaintext JSON and anyone in range can trigger a factory reset.
//! - Provision in a physically controlled environment.

use crate::config::uuids::{
    IP_CHAR_UUID, READ_IP_CHAR_UUID, REFRESH_CHAR_UUID, RESET_CHAR_UUID, STATUS_CHAR_UUID,
    WIFI_SETTINGS_CHAR_UUID,
};
use crate::workflow::WorkflowAction;
use std::fmt;
use uuid::Uuid;

#[cfg(feature = "bluez")]
pub mod bluez;
pub mod router;
pub mod value;

pub use router::{RouteError, Router, RouterHandle};
pub use value::{
    CharacteristicValue, NotifySession, StatusPublisher, STATUS_OFFLINE, STATUS_ONLINE,
};

/// What a characteristic is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicRole {
    Refresh,
    WifiSettings,
    Reset,
    ReadIp,
    Status,
    Ip,
}

impl CharacteristicRole {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Refresh => REFRESH_CHAR_UUID,
            Self::WifiSettings => WIFI_SETTINGS_CHAR_UUID,
            Self::Reset => RESET_CHAR_UUID,
            Self::ReadIp => READ_IP_CHAR_UUID,
            Self::Status => STATUS_CHAR_UUID,
            Self::Ip => IP_CHAR_UUID,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::WifiSettings => "wifi-settings",
            Self::Reset => "reset",
            Self::ReadIp => "read-ip",
            Self::Status => "status",
            Self::Ip => "ip",
        }
    }
}

impl fmt::Display for CharacteristicRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GATT property flags of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
}

impl Permissions {
    /// Request trigger: write, write without response.
    pub const TRIGGER: Self = Self {
        read: false,
        write: true,
        write_without_response: true,
        notify: false,
    };

    /// Response channel: read, notify.
    pub const RESPONSE: Self = Self {
        read: true,
        write: false,
        write_without_response: false,
        notify: true,
    };

    pub fn is_writable(&self) -> bool {
        self.write || self.write_without_response
    }
}

/// Static description of one characteristic, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicBinding {
    pub uuid: Uuid,
    pub role: CharacteristicRole,
    pub permissions: Permissions,
    /// Action run on every remote write. `None` for response characteristics.
    pub on_write: Option<WorkflowAction>,
}

impl CharacteristicBinding {
    fn trigger(role: CharacteristicRole, action: WorkflowAction) -> Self {
        Self {
            uuid: role.uuid(),
            role,
            permissions: Permissions::TRIGGER,
            on_write: Some(action),
        }
    }

    fn response(role: CharacteristicRole) -> Self {
        Self {
            uuid: role.uuid(),
            role,
            permissions: Permissions::RESPONSE,
            on_write: None,
        }
    }
}

/// The characteristics of the provisioning service.
///
/// `ip_trigger` adds the optional Read-IP trigger.
pub fn service_bindings(ip_trigger: bool) -> Vec<CharacteristicBinding> {
    let mut bindings = vec![
        CharacteristicBinding::trigger(CharacteristicRole::Refresh, WorkflowAction::Refresh),
        CharacteristicBinding::trigger(
            CharacteristicRole::WifiSettings,
            WorkflowAction::ConfigureWifi,
        ),
        CharacteristicBinding::trigger(CharacteristicRole::Reset, WorkflowAction::Reset),
    ];
    if ip_trigger {
        bindings.push(CharacteristicBinding::trigger(
            CharacteristicRole::ReadIp,
            WorkflowAction::ReadIpSnapshot,
        ));
    }
    bindings.push(CharacteristicBinding::response(CharacteristicRole::Status));
    bindings.push(CharacteristicBinding::response(CharacteristicRole::Ip));
    bindings
}
