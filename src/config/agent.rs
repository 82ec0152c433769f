//! Agent configuration.
//!
//! [`AgentConfig`] is built once at startup and shared read-only with every
//! component. [`Cli`] is the command-line front end; each flag also reads an
//! environment variable so the unit file can configure the agent without
//! rewriting its `ExecStart` line.
//!
//! # Example
//!
//! ```
//! use clap::Parser;
//! use kiosk_ble_provisioner::config::{AgentConfig, Cli};
//!
//! let cli = Cli::try_parse_from(["kiosk-ble-provisioner", "--name-prefix", "lobby"]).unwrap();
//! let config = AgentConfig::from(cli);
//! assert_eq!(config.name_prefix, "lobby");
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Base URL of the local network-configuration service.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:3002/";

/// Text file holding the advertised device name.
pub const DEFAULT_NAME_FILE: &str = "/application/signage-device-application/db/device.txt";

/// Prefix for synthesized device names.
pub const DEFAULT_NAME_PREFIX: &str = "kimacloud";

/// Number of random characters after the prefix.
pub const DEFAULT_NAME_SUFFIX_LEN: usize = 6;

/// Local executable that performs a factory reset.
pub const DEFAULT_RESET_PROGRAM: &str = "/home/player/resetTerminal";

/// Bound for IP snapshot and health-check calls.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound for applying Wi-Fi credentials (the service may reassociate first).
pub const DEFAULT_WIFI_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound for the reset actuator, which may never answer.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(10);

/// How long in-flight handlers get to finish on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Writes buffered per characteristic before the BLE callback waits.
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Where the persisted device name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NameSource {
    /// Read the name file.
    File,
    /// Ask the local service (`getBleServiceName`).
    Api,
}

/// Selects the reset actuator flag-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResetMode {
    /// Run a local executable.
    Command,
    /// POST to the local service (`factoryResetForBle`).
    Http,
}

/// How a factory reset is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetStrategy {
    /// Run `program` with no arguments and log its stdout.
    Command { program: PathBuf },
    /// POST the write payload to the local service.
    Http,
}

/// Immutable agent configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Base URL of the local service, always ending in `/`.
    pub api_base: String,
    /// Persisted device name file.
    pub name_file: PathBuf,
    /// Where the persisted name is read from.
    pub name_source: NameSource,
    /// Prefix of synthesized names.
    pub name_prefix: String,
    /// Random suffix length of synthesized names.
    pub name_suffix_len: usize,
    pub status_timeout: Duration,
    pub wifi_timeout: Duration,
    pub reset_timeout: Duration,
    pub reset: ResetStrategy,
    /// Expose the optional Read-IP trigger characteristic.
    pub ip_trigger: bool,
    pub shutdown_grace: Duration,
    /// Per-characteristic write queue depth.
    pub queue_depth: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            name_file: PathBuf::from(DEFAULT_NAME_FILE),
            name_source: NameSource::File,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            name_suffix_len: DEFAULT_NAME_SUFFIX_LEN,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            wifi_timeout: DEFAULT_WIFI_TIMEOUT,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            reset: ResetStrategy::Command {
                program: PathBuf::from(DEFAULT_RESET_PROGRAM),
            },
            ip_trigger: true,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "kiosk-ble-provisioner",
    version,
    about = "Advertises the signage provisioning GATT service over BlueZ"
)]
pub struct Cli {
    /// Base URL of the local network-configuration service.
    #[arg(long, env = "PROVISIONER_API_BASE", default_value = DEFAULT_API_BASE, value_parser = parse_api_base)]
    pub api_base: String,

    /// File holding the persisted device name.
    #[arg(long, env = "PROVISIONER_NAME_FILE", default_value = DEFAULT_NAME_FILE)]
    pub name_file: PathBuf,

    /// Where to read the persisted device name from.
    #[arg(long, env = "PROVISIONER_NAME_SOURCE", value_enum, default_value_t = NameSource::File)]
    pub name_source: NameSource,

    /// Prefix for a synthesized device name.
    #[arg(long, env = "PROVISIONER_NAME_PREFIX", default_value = DEFAULT_NAME_PREFIX)]
    pub name_prefix: String,

    /// Random characters appended to a synthesized device name.
    #[arg(long, env = "PROVISIONER_NAME_SUFFIX_LEN", default_value_t = DEFAULT_NAME_SUFFIX_LEN, value_parser = parse_nonzero)]
    pub name_suffix_len: usize,

    /// Reset actuator.
    #[arg(long, env = "PROVISIONER_RESET_MODE", value_enum, default_value_t = ResetMode::Command)]
    pub reset_mode: ResetMode,

    /// Executable run by the command reset actuator.
    #[arg(long, env = "PROVISIONER_RESET_PROGRAM", default_value = DEFAULT_RESET_PROGRAM)]
    pub reset_program: PathBuf,

    #[arg(long, env = "PROVISIONER_STATUS_TIMEOUT_SECS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub status_timeout_secs: u64,

    #[arg(long, env = "PROVISIONER_WIFI_TIMEOUT_SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub wifi_timeout_secs: u64,

    #[arg(long, env = "PROVISIONER_RESET_TIMEOUT_SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub reset_timeout_secs: u64,

    /// Seconds in-flight handlers get to finish on shutdown.
    #[arg(long, env = "PROVISIONER_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Do not expose the Read-IP trigger characteristic.
    #[arg(long, env = "PROVISIONER_NO_IP_TRIGGER")]
    pub no_ip_trigger: bool,

    /// Writes buffered per characteristic.
    #[arg(long, env = "PROVISIONER_QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH, value_parser = parse_nonzero)]
    pub queue_depth: usize,
}

impl From<Cli> for AgentConfig {
    fn from(cli: Cli) -> Self {
        let reset = match cli.reset_mode {
            ResetMode::Command => ResetStrategy::Command {
                program: cli.reset_program,
            },
            ResetMode::Http => ResetStrategy::Http,
        };

        Self {
            api_base: cli.api_base,
            name_file: cli.name_file,
            name_source: cli.name_source,
            name_prefix: cli.name_prefix,
            name_suffix_len: cli.name_suffix_len,
            status_timeout: Duration::from_secs(cli.status_timeout_secs),
            wifi_timeout: Duration::from_secs(cli.wifi_timeout_secs),
            reset_timeout: Duration::from_secs(cli.reset_timeout_secs),
            reset,
            ip_trigger: !cli.no_ip_trigger,
            shutdown_grace: Duration::from_secs(cli.shutdown_grace_secs),
            queue_depth: cli.queue_depth,
        }
    }
}

/// Accept an absolute http(s) URL and normalise it to end with `/`.
fn parse_api_base(s: &str) -> Result<String, String> {
    let url = reqwest::Url::parse(s).map_err(|e| format!("invalid URL: {}", e))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme: {}", other)),
    }
    let mut base = url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(base)
}

fn parse_nonzero(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let mut full = vec!["kiosk-ble-provisioner"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full)
    }

    #[test]
    fn test_defaults_match_agent_default() {
        let config = AgentConfig::from(parse(&[]).unwrap());
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn test_api_base_gets_trailing_slash() {
        let cli = parse(&["--api-base", "http://127.0.0.1:4000"]).unwrap();
        assert_eq!(cli.api_base, "http://127.0.0.1:4000/");

        let cli = parse(&["--api-base", "http://127.0.0.1:4000/api"]).unwrap();
        assert_eq!(cli.api_base, "http://127.0.0.1:4000/api/");
    }

    #[test]
    fn test_api_base_rejects_non_http() {
        assert!(parse(&["--api-base", "ftp://127.0.0.1/"]).is_err());
        assert!(parse(&["--api-base", "not a url"]).is_err());
    }

    #[test]
    fn test_zero_suffix_rejected() {
        assert!(parse(&["--name-suffix-len", "0"]).is_err());
        assert!(parse(&["--queue-depth", "0"]).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(parse(&["--wifi-timeout-secs", "0"]).is_err());
    }

    #[test]
    fn test_http_reset_mode() {
        let config = AgentConfig::from(parse(&["--reset-mode", "http"]).unwrap());
        assert_eq!(config.reset, ResetStrategy::Http);
    }

    #[test]
    fn test_command_reset_program() {
        let config =
            AgentConfig::from(parse(&["--reset-program", "/usr/local/bin/wipe"]).unwrap());
        assert_eq!(
            config.reset,
            ResetStrategy::Command {
                program: PathBuf::from("/usr/local/bin/wipe")
            }
        );
    }

    #[test]
    fn test_no_ip_trigger_flag() {
        let config = AgentConfig::from(parse(&["--no-ip-trigger"]).unwrap());
        assert!(!config.ip_trigger);
    }

    #[test]
    fn test_api_name_source() {
        let config = AgentConfig::from(parse(&["--name-source", "api"]).unwrap());
        assert_eq!(config.name_source, NameSource::Api);
    }
}
