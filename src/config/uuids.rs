//! GATT identities for the provisioning service.
//!
//! These are fixed for this service generation. The companion app looks the
//! service up by [`SERVICE_UUID`] and addresses characteristics by UUID, so
//! changing any of them breaks every deployed app build.

use uuid::{uuid, Uuid};

/// Primary provisioning service, also carried in the advertisement.
pub const SERVICE_UUID: Uuid = uuid!("d6cb1959-8010-43bd-8ef7-48dbd249b984");

/// Refresh trigger (write). Payload ignored.
pub const REFRESH_CHAR_UUID: Uuid = uuid!("c537baa5-6201-4275-ab14-da353bde3dc3");

/// Wi-Fi settings (write). Payload is `{"ssid": .., "password": ..}` JSON.
pub const WIFI_SETTINGS_CHAR_UUID: Uuid = uuid!("493ebfb0-b690-4ae8-a77a-329619c6f613");

/// Factory reset trigger (write). Payload is opaque.
pub const RESET_CHAR_UUID: Uuid = uuid!("2d75504c-b822-44b3-bb81-65d7b6cbdae3");

/// Read-IP trigger (write). Payload ignored.
pub const READ_IP_CHAR_UUID: Uuid = uuid!("2d75504c-b822-44b3-bb81-65d7b6cbdae2");

/// Connectivity status (read, notify): ASCII `online` / `offline`.
pub const STATUS_CHAR_UUID: Uuid = uuid!("f9e9e098-77d4-4db3-a08f-8321c493431b");

/// IP snapshot (read, notify): compact JSON.
pub const IP_CHAR_UUID: Uuid = uuid!("2d75504c-b822-44b3-bb81-65d7b6cbdae1");
