//! Advertised device name.
//!
//! The name is read once at startup from a persisted source and used as
//! stored, minus one trailing newline. When the source is missing, unreadable
//! or empty, a fallback `<prefix>-<suffix>` is synthesized with a random
//! alphanumeric suffix. Resolution never fails.
//!
//! # Usage
//!
//! ```ignore
//! use kiosk_ble_provisioner::identity::{resolve_name, FileNameStore};
//!
//! let store = FileNameStore::new("/application/signage-device-application/db/device.txt");
//! let identity = resolve_name(&store, "kimacloud", 6).await;
//! log::info!("Advertising as {}", identity);
//! ```

use crate::config::{AgentConfig, NameSource};
use crate::network::HttpNetworkClient;
use log::{debug, info, warn};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// Name the device advertises for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    name: String,
}

impl DeviceIdentity {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A persisted device name.
pub trait NameStore: Send + Sync {
    /// The stored name, or `None` if there is no usable value.
    fn load(&self) -> impl Future<Output = Option<String>> + Send;
}

/// Name kept in a text file, as written by the signage application.
#[derive(Debug, Clone)]
pub struct FileNameStore {
    path: PathBuf,
}

impl FileNameStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NameStore for FileNameStore {
    async fn load(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => normalize(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No name file at {:?}", self.path);
                None
            }
            Err(e) => {
                warn!("Failed to read name file {:?}: {}", self.path, e);
                None
            }
        }
    }
}

/// Name served by the local service's `getBleServiceName`.
#[derive(Debug, Clone)]
pub struct ApiNameStore {
    client: HttpNetworkClient,
}

impl ApiNameStore {
    pub fn new(client: HttpNetworkClient) -> Self {
        Self { client }
    }
}

impl NameStore for ApiNameStore {
    async fn load(&self) -> Option<String> {
        self.client.fetch_ble_name().await.ok().and_then(normalize)
    }
}

/// The store selected by [`AgentConfig::name_source`].
#[derive(Debug, Clone)]
pub enum ConfiguredNameStore {
    File(FileNameStore),
    Api(ApiNameStore),
}

impl ConfiguredNameStore {
    pub fn from_config(config: &AgentConfig, client: &HttpNetworkClient) -> Self {
        match config.name_source {
            NameSource::File => Self::File(FileNameStore::new(config.name_file.clone())),
            NameSource::Api => Self::Api(ApiNameStore::new(client.clone())),
        }
    }
}

impl NameStore for ConfiguredNameStore {
    async fn load(&self) -> Option<String> {
        match self {
            Self::File(store) => store.load().await,
            Self::Api(store) => store.load().await,
        }
    }
}

/// The stored name, verbatim except for one trailing line terminator.
///
/// Editors and `echo` leave a final newline that is not part of the name,
/// so exactly one `\n` or `\r\n` is dropped. A name that is only whitespace
/// cannot be told apart in a scan list, so it counts as empty.
fn normalize(mut raw: String) -> Option<String> {
    if raw.ends_with('\n') {
        raw.pop();
        if raw.ends_with('\r') {
            raw.pop();
        }
    }
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw)
    }
}

/// `<prefix>-<suffix_len random [A-Za-z0-9]>`.
pub fn synthesize_name<R: Rng + ?Sized>(prefix: &str, suffix_len: usize, rng: &mut R) -> String {
    let suffix: String = (0..suffix_len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    format!("{}-{}", prefix, suffix)
}

/// Resolve the advertised name from `store`, falling back to a synthesized one.
pub async fn resolve_name<S: NameStore>(
    store: &S,
    prefix: &str,
    suffix_len: usize,
) -> DeviceIdentity {
    if let Some(name) = store.load().await {
        info!("Loaded device name {:?}", name);
        return DeviceIdentity { name };
    }

    let mut rng = StdRng::from_entropy();
    let name = synthesize_name(prefix, suffix_len, &mut rng);
    info!("No persisted device name, using {:?}", name);
    DeviceIdentity { name }
}
