//! Daemon configuration file.

use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    coordinator::config::CoordinatorConfig, ephemeris::Site,
    socket_server::config::SocketServerConfig,
};

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: SocketServerConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub site: Site,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: SocketServerConfig::default(),
            coordinator: CoordinatorConfig::default(),
            site: Site::default(),
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: DaemonConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (-90.0..=90.0).contains(&self.site.latitude),
            "site.latitude must be within [-90, 90]"
        );
        ensure!(
            (-180.0..=180.0).contains(&self.site.longitude),
            "site.longitude must be within [-180, 180]"
        );
        ensure!(
            self.server.max_connections > 0,
            "server.max_connections must be positive"
        );
        ensure!(
            !self.server.control_ips.is_empty(),
            "server.control_ips must list at least one address"
        );
        self.coordinator.validate()
    }
}
