use std::time::Duration;

use anyhow::{Context, Error};
use config::Config;
use serde::Deserialize;

use crate::domain::executor::{RestartMode, SyncOptions};

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub docker_socket: String,
    pub listen_address: String,
    /// Id or name of the running container to keep in sync.
    pub container: String,
    pub dockerfile: String,
    pub context: String,
    pub restart_timeout_secs: u64,
    pub restart_mode: RestartMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_string(),
            listen_address: "127.0.0.1:3000".to_string(),
            container: String::new(),
            dockerfile: "Dockerfile".to_string(),
            context: ".".to_string(),
            restart_timeout_secs: 30,
            restart_mode: RestartMode::Kill,
        }
    }
}

impl AppConfig {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            restart_timeout: Duration::from_secs(self.restart_timeout_secs),
            restart_mode: self.restart_mode,
        }
    }
}

pub fn load_config() -> Result<AppConfig, Error> {
    let config = Config::builder()
        .add_source(config::Environment::with_prefix("livesync"))
        .build()
        .context("Can't load configuration")?;

    config
        .try_deserialize()
        .context("Can't deserialize AppConfig from loaded configuration")
}
