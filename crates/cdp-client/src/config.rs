//! Connection settings for the remote-debugging endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach the browser's debugging endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpConfig {
    /// Debugging endpoint host
    pub host: String,

    /// Debugging endpoint port
    pub port: u16,

    /// Timeout for target discovery and the WebSocket handshake
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Per-command response deadline
    #[serde(with = "duration_ms")]
    pub command_timeout: Duration,

    /// How long navigate waits for the page load event before proceeding
    #[serde(with = "duration_ms")]
    pub load_timeout: Duration,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9222,
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(10),
            load_timeout: Duration::from_secs(15),
        }
    }
}

impl CdpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Base URL of the HTTP discovery surface, e.g. `http://localhost:9222`.
    pub fn http_base(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
