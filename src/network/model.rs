//! Payloads exchanged with the local network-configuration service.
//!
//! These types are platform-independent and double as the wire format of the
//! IP characteristic.
//!
//! # Example
//!
//! ```
//! use kiosk_ble_provisioner::network::WifiCredentials;
//!
//! let creds = WifiCredentials::from_payload(br#"{"ssid":"Guest","password":"secret123"}"#).unwrap();
//! assert_eq!(creds.ssid, "Guest");
//! assert!(!format!("{:?}", creds).contains("secret123"));
//! ```

use super::error::{Endpoint, NetworkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA2 passphrase length.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Addressing of one network interface. Fields are empty while the
/// interface is down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub name: String,
}

/// Wired and wireless addressing at the moment of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSnapshot {
    #[serde(default)]
    pub eth0: InterfaceInfo,
    #[serde(default)]
    pub wifi: InterfaceInfo,
}

impl IpSnapshot {
    /// Compact JSON, as published on the IP characteristic.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Internet reachability as reported by `internetHealthyCheck`.
///
/// `success == false` is a valid answer, not a failure of the call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkStatus {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Outcome of `setupNewWifi`. Says nothing about connectivity; only a later
/// health check does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WifiApplyResult {
    pub success: bool,
}

impl WifiApplyResult {
    /// Map `success == false` to an actuation failure.
    pub fn into_result(self) -> Result<(), NetworkError> {
        if self.success {
            Ok(())
        } else {
            Err(NetworkError::Actuation {
                endpoint: Endpoint::SetupWifi,
                reason: "service reported the credentials were not applied".to_string(),
            })
        }
    }
}

/// Answer of `getBleServiceName`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct BleName {
    #[serde(default)]
    pub ble: String,
}

/// Wi-Fi credentials written to the settings characteristic.
///
/// The password is zeroed on drop and never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WifiCredentials {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl WifiCredentials {
    /// Parse a settings write.
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        if payload.is_empty() {
            return Err(PayloadError::Empty);
        }
        let creds: Self =
            serde_json::from_slice(payload).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
        creds.validate()?;
        Ok(creds)
    }

    /// Check the 802.11 limits the service will enforce anyway.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.ssid.is_empty() {
            return Err(PayloadError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(PayloadError::SsidTooLong {
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(PayloadError::PasswordTooLong {
                len: self.password.len(),
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(())
    }

    /// Open network (no password).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A settings write that is not usable credentials JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Nothing was written.
    Empty,
    /// Not JSON of the `{ssid, password}` shape.
    InvalidJson(String),
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds 32 bytes.
    SsidTooLong { len: usize, max: usize },
    /// Password exceeds 64 bytes.
    PasswordTooLong { len: usize, max: usize },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty payload"),
            Self::InvalidJson(msg) => write!(f, "invalid credentials JSON: {}", msg),
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for PayloadError {}
