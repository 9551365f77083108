//! Receiver configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the state-history receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Upstream node hostname.
    #[serde(default = "default_host")]
    pub host: String,
    /// Upstream state-history port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory the `receiver-state/` store lives under.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Mapped size of the state store, in megabytes.
    #[serde(default = "default_db_size_mb")]
    pub state_db_size_mb: u64,
    /// Emit a progress report every N blocks (0 disables).
    #[serde(default = "default_report_every")]
    pub report_every: u32,
    /// Bus backlog depth that triggers backpressure.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Per-subscriber buffer of each bus channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    8080
}
fn default_data_dir() -> PathBuf {
    ".".into()
}
fn default_db_size_mb() -> u64 {
    1024
}
fn default_report_every() -> u32 {
    10_000
}
fn default_max_queue_size() -> usize {
    10_000
}
fn default_channel_capacity() -> usize {
    1_024
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            state_db_size_mb: default_db_size_mb(),
            report_every: default_report_every(),
            max_queue_size: default_max_queue_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ReceiverConfig {
    /// The websocket endpoint of the upstream state-history plugin.
    pub fn url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }

    /// Where the memory-mapped store lives.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("receiver-state")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_document() {
        let config: ReceiverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert_eq!(config.state_db_size_mb, 1024);
        assert_eq!(config.report_every, 10_000);
        assert_eq!(config.max_queue_size, 10_000);
    }

    #[test]
    fn url_and_state_dir() {
        let config = ReceiverConfig {
            host: "node1".into(),
            port: 9090,
            data_dir: "/var/lib/feed".into(),
            ..Default::default()
        };
        assert_eq!(config.url(), "ws://node1:9090/");
        assert_eq!(
            config.state_dir(),
            PathBuf::from("/var/lib/feed/receiver-state")
        );
    }
}
