//! Project configuration.
//!
//! Loaded from `.questline/config.json` when present, with environment
//! variable overrides on top. Absence of the file is fine - defaults target a
//! local dev server and a local Chrome.

use anyhow::{Context, Result};
use cdp_client::CdpConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name inside the hidden state directory.
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestlineConfig {
    /// Environment label shown in run output
    pub environment: String,

    /// Base URL of the application under test
    pub base_url: String,

    /// Chrome remote-debugging host
    pub chrome_host: String,

    /// Chrome remote-debugging port
    pub chrome_port: u16,

    /// Dev mailbox HTTP API base (Mailpit-compatible)
    pub mailbox_url: String,

    /// Catalog TTL in seconds
    pub catalog_ttl_secs: u64,
}

impl Default for QuestlineConfig {
    fn default() -> Self {
        Self {
            environment: "local".to_string(),
            base_url: "http://localhost:3000".to_string(),
            chrome_host: "localhost".to_string(),
            chrome_port: 9222,
            mailbox_url: "http://localhost:8025".to_string(),
            catalog_ttl_secs: 300,
        }
    }
}

impl QuestlineConfig {
    /// Load configuration for `project_root`, merging file and environment.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(flow_catalog::STATE_DIR).join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read config at {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("config at {} is not valid JSON", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("QUESTLINE_BASE_URL") {
            self.base_url = value;
        }
        if let Ok(value) = std::env::var("QUESTLINE_CHROME_HOST") {
            self.chrome_host = value;
        }
        if let Ok(value) = std::env::var("QUESTLINE_CHROME_PORT") {
            if let Ok(port) = value.parse() {
                self.chrome_port = port;
            }
        }
        if let Ok(value) = std::env::var("QUESTLINE_MAILBOX_URL") {
            self.mailbox_url = value;
        }
    }

    pub fn cdp(&self) -> CdpConfig {
        CdpConfig::new(self.chrome_host.clone(), self.chrome_port)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }
}

/// Project root resolution: the current directory.
pub fn project_root() -> Result<PathBuf> {
    std::env::current_dir().context("cannot resolve current directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_stack() {
        let config = QuestlineConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.cdp().http_base(), "http://localhost:9222");
        assert_eq!(config.catalog_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn partial_config_file_fills_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join(flow_catalog::STATE_DIR);
        std::fs::create_dir_all(&state).unwrap();
        std::fs::write(
            state.join(CONFIG_FILE),
            r#"{"base_url": "http://localhost:5173"}"#,
        )
        .unwrap();

        let config = QuestlineConfig::load(dir.path()).unwrap();
        assert_eq!(config.base_url, "http://localhost:5173");
        assert_eq!(config.chrome_port, 9222);
    }
}
