//! Agent configuration.
//!
//! # Components
//!
//! - `agent` - runtime configuration ([`AgentConfig`]) and its command-line
//!   front end ([`Cli`])
//! - [`uuids`] - fixed GATT service and characteristic UUIDs

mod agent;
pub mod uuids;

pub use agent::{
    AgentConfig, Cli, NameSource, ResetMode, ResetStrategy, DEFAULT_API_BASE,
    DEFAULT_NAME_FILE, DEFAULT_NAME_PREFIX, DEFAULT_NAME_SUFFIX_LEN, DEFAULT_QUEUE_DEPTH,
    DEFAULT_RESET_PROGRAM, DEFAULT_RESET_TIMEOUT, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_STATUS_TIMEOUT, DEFAULT_WIFI_TIMEOUT,
};
