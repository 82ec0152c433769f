//! Factory reset actuators.
//!
//! Two interchangeable strategies behind [`ResetActuator`]: run a local
//! executable ([`CommandReset`]) or ask the local service ([`HttpReset`]).
//! Both stop waiting after a timeout because the actuator may take the device
//! down before it answers. Giving up on the wait never stops the reset: a
//! local executable keeps running until it exits on its own.

use super::error::{Endpoint, NetworkError};
use super::http::HttpNetworkClient;
use super::logged;
use crate::config::{AgentConfig, ResetStrategy};
use log::{debug, info};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Acknowledgment of a reset request. The device may still be running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetAck {
    /// Whatever the actuator printed or answered.
    pub detail: String,
}

/// Something that can start a factory reset.
pub trait ResetActuator: Send + Sync + 'static {
    /// Attempt the reset with the opaque write payload.
    fn trigger_reset(
        &self,
        payload: &[u8],
    ) -> impl Future<Output = Result<ResetAck, NetworkError>> + Send;
}

/// Runs a local executable and captures its stdout.
#[derive(Debug, Clone)]
pub struct CommandReset {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandReset {
    /// Run `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    /// Pass fixed arguments to the program.
    #[cfg(test)]
    pub(crate) fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl ResetActuator for CommandReset {
    async fn trigger_reset(&self, payload: &[u8]) -> Result<ResetAck, NetworkError> {
        debug!(
            "Running {} (payload {:?} not forwarded)",
            self.program.display(),
            String::from_utf8_lossy(payload)
        );

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                logged(NetworkError::Transport {
                    endpoint: Endpoint::ResetCommand,
                    reason: format!("cannot run {}: {}", self.program.display(), e),
                })
            })?;

        // The child is owned by its own task so it runs to completion even
        // when we stop waiting or this future is dropped.
        let program = self.program.clone();
        let mut waiter = tokio::spawn(async move {
            let result = child.wait_with_output().await;
            if let Ok(output) = &result {
                debug!("{} exited with {}", program.display(), output.status);
            }
            result
        });

        let output = match tokio::time::timeout(self.timeout, &mut waiter).await {
            Ok(Ok(Ok(output))) => output,
            Ok(Ok(Err(e))) => {
                return Err(logged(NetworkError::Transport {
                    endpoint: Endpoint::ResetCommand,
                    reason: format!("waiting for {}: {}", self.program.display(), e),
                }))
            }
            Ok(Err(e)) => {
                return Err(logged(NetworkError::Transport {
                    endpoint: Endpoint::ResetCommand,
                    reason: format!("waiter for {} failed: {}", self.program.display(), e),
                }))
            }
            Err(_) => {
                info!(
                    "{} still running after {:?}, no longer waiting",
                    self.program.display(),
                    self.timeout
                );
                return Err(logged(NetworkError::Timeout {
                    endpoint: Endpoint::ResetCommand,
                    after: self.timeout,
                }));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !stdout.is_empty() {
            info!("Reset output: {}", stdout);
        }

        if !output.status.success() {
            return Err(logged(NetworkError::Actuation {
                endpoint: Endpoint::ResetCommand,
                reason: format!("{} exited with {}", self.program.display(), output.status),
            }));
        }

        Ok(ResetAck { detail: stdout })
    }
}

/// Posts the write payload to `factoryResetForBle`.
#[derive(Debug, Clone)]
pub struct HttpReset {
    client: HttpNetworkClient,
}

impl HttpReset {
    pub fn new(client: HttpNetworkClient) -> Self {
        Self { client }
    }
}

impl ResetActuator for HttpReset {
    async fn trigger_reset(&self, payload: &[u8]) -> Result<ResetAck, NetworkError> {
        self.client.factory_reset(payload).await
    }
}

/// The actuator selected by [`AgentConfig::reset`].
#[derive(Debug, Clone)]
pub enum ConfiguredReset {
    Command(CommandReset),
    Http(HttpReset),
}

impl ConfiguredReset {
    pub fn from_config(config: &AgentConfig, client: &HttpNetworkClient) -> Self {
        match &config.reset {
            ResetStrategy::Command { program } => {
                Self::Command(CommandReset::new(program.clone(), config.reset_timeout))
            }
            ResetStrategy::Http => Self::Http(HttpReset::new(client.clone())),
        }
    }
}

impl ResetActuator for ConfiguredReset {
    async fn trigger_reset(&self, payload: &[u8]) -> Result<ResetAck, NetworkError> {
        match self {
            Self::Command(reset) => reset.trigger_reset(payload).await,
            Self::Http(reset) => reset.trigger_reset(payload).await,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::network::FailureKind;
    use crate::testing::FakeNetworkService;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_command_captures_stdout() {
        let reset = CommandReset::new("sh", TIMEOUT).with_args(["-c", "echo wiping; exit 0"]);
        let ack = reset.trigger_reset(b"v1").await.unwrap();
        assert_eq!(ack.detail, "wiping");
    }

    #[tokio::test]
    async fn test_command_nonzero_exit_is_actuation_failure() {
        let reset = CommandReset::new("sh", TIMEOUT).with_args(["-c", "exit 3"]);
        let err = reset.trigger_reset(b"").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Actuation);
        assert_eq!(err.endpoint(), Endpoint::ResetCommand);
    }

    #[tokio::test]
    async fn test_command_missing_program() {
        let reset = CommandReset::new("/nonexistent/resetTerminal", TIMEOUT);
        let err = reset.trigger_reset(b"").await.unwrap_err();
        assert!(matches!(err, NetworkError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let reset = CommandReset::new("sleep", Duration::from_millis(100)).with_args(["5"]);
        let started = std::time::Instant::now();
        let err = reset.trigger_reset(b"").await.unwrap_err();
        assert!(matches!(err, NetworkError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    fn unique_marker() -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "kiosk-reset-marker-{}-{}",
            std::process::id(),
            id
        ))
    }

    /// A reset script that sleeps, then leaves `marker` behind.
    fn slow_script(marker: &Path, timeout: Duration) -> CommandReset {
        CommandReset::new("sh", timeout).with_args([
            "-c".to_string(),
            format!("sleep 1; touch '{}'", marker.display()),
        ])
    }

    async fn wait_for(marker: &Path) -> bool {
        for _ in 0..50 {
            if marker.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_command_keeps_running_after_timeout() {
        let marker = unique_marker();
        let reset = slow_script(&marker, Duration::from_millis(200));

        let err = reset.trigger_reset(b"").await.unwrap_err();
        assert!(matches!(err, NetworkError::Timeout { .. }));
        assert!(!marker.exists());

        assert!(wait_for(&marker).await, "reset script was cut short");
        let _ = std::fs::remove_file(&marker);
    }

    #[tokio::test]
    async fn test_command_survives_dropped_wait() {
        let marker = unique_marker();
        let reset = slow_script(&marker, Duration::from_secs(30));

        let task = tokio::spawn(async move { reset.trigger_reset(b"").await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(wait_for(&marker).await, "reset script was cut short");
        let _ = std::fs::remove_file(&marker);
    }

    #[tokio::test]
    async fn test_configured_http_reset() {
        let fake = FakeNetworkService::start();
        fake.respond("factoryResetForBle", 200, "{}");
        let config = AgentConfig {
            api_base: fake.base_url(),
            reset: ResetStrategy::Http,
            ..AgentConfig::default()
        };
        let client = HttpNetworkClient::new(&config).unwrap();
        let reset = ConfiguredReset::from_config(&config, &client);
        assert!(matches!(reset, ConfiguredReset::Http(_)));

        reset.trigger_reset(b"factory").await.unwrap();
        let requests = fake.requests_to("factoryResetForBle");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, b"factory".to_vec());
    }

    #[test]
    fn test_configured_command_reset() {
        let config = AgentConfig::default();
        let client = HttpNetworkClient::new(&config).unwrap();
        match ConfiguredReset::from_config(&config, &client) {
            ConfiguredReset::Command(reset) => {
                assert_eq!(reset.program, PathBuf::from("/home/player/resetTerminal"));
                assert!(reset.args.is_empty());
            }
            other => panic!("unexpected actuator: {:?}", other),
        }
    }
}
