//! Agent lifecycle.
//!
//! Wires configuration, collaborators, the provisioning service and the write
//! router together. [`Agent`] is platform-independent; [`run`] adds the BlueZ
//! registration and the signal-driven shutdown on top of it.

use crate::config::AgentConfig;
use crate::gatt::{service_bindings, CharacteristicBinding, Router, RouterHandle};
use crate::identity::{resolve_name, ConfiguredNameStore, DeviceIdentity};
use crate::network::{ConfiguredReset, HttpNetworkClient};
use crate::workflow::ProvisioningService;
use log::info;
use std::fmt;
use std::io;
use std::sync::Arc;

#[cfg(feature = "bluez")]
use crate::gatt::bluez::{self, PlatformError};

/// The provisioning service as the agent runs it.
pub type AgentService = ProvisioningService<HttpNetworkClient, ConfiguredReset>;

/// Errors that stop the agent before it serves anything.
#[derive(Debug)]
pub enum StartupError {
    /// The HTTP client could not be built.
    HttpClient(reqwest::Error),
    /// Signal handlers could not be installed.
    Signal(io::Error),
    /// Adapter, advertisement or GATT registration failed.
    #[cfg(feature = "bluez")]
    Platform(PlatformError),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::HttpClient(e) => write!(f, "failed to build HTTP client: {}", e),
            StartupError::Signal(e) => write!(f, "failed to install signal handler: {}", e),
            #[cfg(feature = "bluez")]
            StartupError::Platform(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::HttpClient(e) => Some(e),
            StartupError::Signal(e) => Some(e),
            #[cfg(feature = "bluez")]
            StartupError::Platform(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for StartupError {
    fn from(e: reqwest::Error) -> Self {
        StartupError::HttpClient(e)
    }
}

#[cfg(feature = "bluez")]
impl From<PlatformError> for StartupError {
    fn from(e: PlatformError) -> Self {
        StartupError::Platform(e)
    }
}

/// A started agent: name resolved, workers running, not yet on the air.
pub struct Agent {
    config: AgentConfig,
    identity: DeviceIdentity,
    service: Arc<AgentService>,
    bindings: Vec<CharacteristicBinding>,
    router: Router,
}

impl Agent {
    /// Build the collaborators, resolve the device name and start the workers.
    pub async fn start(config: AgentConfig) -> Result<Self, StartupError> {
        let client = HttpNetworkClient::new(&config)?;
        let reset = ConfiguredReset::from_config(&config, &client);
        let store = ConfiguredNameStore::from_config(&config, &client);
        let identity = resolve_name(&store, &config.name_prefix, config.name_suffix_len).await;

        let service = Arc::new(ProvisioningService::new(client, reset));
        let bindings = service_bindings(config.ip_trigger);
        let router = Router::start(service.clone(), &bindings, config.queue_depth);
        info!(
            "Provisioning service ready with {} characteristics",
            bindings.len()
        );

        Ok(Self {
            config,
            identity,
            service,
            bindings,
            router,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn service(&self) -> &Arc<AgentService> {
        &self.service
    }

    pub fn bindings(&self) -> &[CharacteristicBinding] {
        &self.bindings
    }

    pub fn router(&self) -> RouterHandle {
        self.router.handle()
    }

    /// Give the IP characteristic a value before the first write arrives.
    pub async fn prime(&self) {
        self.service.read_ip_snapshot().await;
    }

    /// Stop the workers, letting queued writes finish within the grace period.
    pub async fn shutdown(self) {
        info!("Draining write queues");
        self.router.shutdown(self.config.shutdown_grace).await;
    }
}

/// Run the agent until SIGINT or SIGTERM.
#[cfg(feature = "bluez")]
pub async fn run(config: AgentConfig) -> Result<(), StartupError> {
    use tokio::signal::unix::{signal, SignalKind};
    use tokio_util::sync::CancellationToken;

    let mut terminate = signal(SignalKind::terminate()).map_err(StartupError::Signal)?;

    let agent = Agent::start(config).await?;
    let mut registration = bluez::register(&agent).await?;
    agent.prime().await;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log::error!("Failed to wait for Ctrl-C: {}", e);
                }
            }
            _ = terminate.recv() => {}
        }
        signal_cancel.cancel();
    });

    cancel.cancelled().await;
    info!("Shutting down...");
    registration.stop_advertising();
    agent.shutdown().await;
    registration.unregister();
    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameSource;
    use crate::gatt::CharacteristicRole;
    use crate::gatt::RouteError;
    use crate::testing::FakeNetworkService;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_for(fake: &FakeNetworkService) -> AgentConfig {
        AgentConfig {
            api_base: fake.base_url(),
            name_file: PathBuf::from("/nonexistent/kiosk-provisioner/device.txt"),
            shutdown_grace: Duration::from_secs(5),
            ..AgentConfig::default()
        }
    }

    #[tokio::test]
    async fn test_start_with_fallback_name() {
        let fake = FakeNetworkService::start();
        let agent = Agent::start(config_for(&fake)).await.unwrap();

        assert!(agent.identity().name().starts_with("kimacloud-"));
        assert_eq!(agent.identity().name().len(), "kimacloud-".len() + 6);
        assert_eq!(agent.bindings().len(), 6);

        agent.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_with_api_name() {
        let fake = FakeNetworkService::start();
        fake.respond("getBleServiceName", 200, r#"{"ble":"Lobby"}"#);
        let config = AgentConfig {
            name_source: NameSource::Api,
            ..config_for(&fake)
        };

        let agent = Agent::start(config).await.unwrap();
        assert_eq!(agent.identity().name(), "Lobby");
        agent.shutdown().await;
    }

    #[tokio::test]
    async fn test_without_ip_trigger() {
        let fake = FakeNetworkService::start();
        let config = AgentConfig {
            ip_trigger: false,
            ..config_for(&fake)
        };
        let agent = Agent::start(config).await.unwrap();

        assert_eq!(agent.bindings().len(), 5);
        let read_ip = CharacteristicRole::ReadIp.uuid();
        assert_eq!(
            agent.router().dispatch(read_ip, Vec::new()).await,
            Err(RouteError::Unbound(read_ip))
        );
        agent.shutdown().await;
    }

    #[tokio::test]
    async fn test_prime_publishes_ip() {
        let fake = FakeNetworkService::start();
        let ip = r#"{"eth0":{"ip":"10.1.1.4","mac":"aa:bb:cc:dd:ee:01","name":"eth0"},"wifi":{"ip":"","mac":"","name":"wlan0"}}"#;
        fake.respond("getLocalIPAddress", 200, ip);
        let agent = Agent::start(config_for(&fake)).await.unwrap();

        agent.prime().await;

        let publisher = agent.service().publisher();
        assert_eq!(publisher.ip().read().await, ip.as_bytes());
        assert!(publisher.status().read().await.is_empty());
        assert!(fake.requests_to("internetHealthyCheck").is_empty());
        agent.shutdown().await;
    }

    #[tokio::test]
    async fn test_overlapping_wifi_writes_are_serialized() {
        let fake = FakeNetworkService::start();
        fake.respond_after(
            "setupNewWifi",
            200,
            r#"{"success":true}"#,
            Duration::from_millis(150),
        );
        fake.respond("getLocalIPAddress", 200, r#"{"eth0":{},"wifi":{}}"#);
        fake.respond(
            "internetHealthyCheck",
            200,
            r#"{"success":true,"message":"ok"}"#,
        );
        let agent = Agent::start(config_for(&fake)).await.unwrap();
        let wifi = CharacteristicRole::WifiSettings.uuid();

        let first = br#"{"ssid":"Office","password":"one"}"#.to_vec();
        let second = br#"{"ssid":"Guest","password":"two"}"#.to_vec();
        let handle = agent.router();
        let (a, b) = tokio::join!(
            handle.dispatch(wifi, first.clone()),
            handle.dispatch(wifi, second.clone())
        );
        a.unwrap();
        b.unwrap();
        agent.shutdown().await;

        let posts = fake.requests_to("setupNewWifi");
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].body, first);
        assert_eq!(posts[1].body, second);
        assert_eq!(fake.max_in_flight("setupNewWifi"), 1);
    }

    #[tokio::test]
    async fn test_status_reflects_state_after_apply() {
        let fake = FakeNetworkService::start();
        fake.respond("getLocalIPAddress", 200, r#"{"eth0":{},"wifi":{}}"#);
        fake.respond(
            "internetHealthyCheck",
            200,
            r#"{"success":true,"message":"ok"}"#,
        );
        fake.respond_after(
            "setupNewWifi",
            500,
            "boom",
            Duration::from_millis(50),
        );
        let agent = Agent::start(config_for(&fake)).await.unwrap();
        let mut status = agent.service().publisher().status().subscribe().await;

        agent
            .router()
            .dispatch(
                CharacteristicRole::WifiSettings.uuid(),
                br#"{"ssid":"Guest","password":"secret123"}"#.to_vec(),
            )
            .await
            .unwrap();

        let published = tokio::time::timeout(Duration::from_secs(5), status.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published, b"online");

        let paths: Vec<_> = fake.requests().into_iter().map(|r| r.path).collect();
        let apply = paths.iter().position(|p| p == "setupNewWifi").unwrap();
        assert!(paths[apply + 1..].iter().any(|p| p == "internetHealthyCheck"));
        agent.shutdown().await;
    }

    #[test]
    fn test_startup_error_display() {
        let err = StartupError::Signal(io::Error::new(io::ErrorKind::Other, "denied"));
        assert_eq!(err.to_string(), "failed to install signal handler: denied");
    }
}
