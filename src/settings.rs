use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use config::{Config, ConfigError, File};
use directories::ProjectDirs;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Storage {
    /// Empty means the per-user data directory.
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Rates {
    pub coingecko_url: String,
    pub interval_secs: u64,
    pub max_backoff_secs: u64,
}

impl Rates {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Service {
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub storage: Storage,
    pub rates: Rates,
    pub server: Server,
    pub service: Service,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("storage.path", "")?
            .set_default("rates.coingecko_url", "https://api.coingecko.com")?
            .set_default("rates.interval_secs", 15)?
            .set_default("rates.max_backoff_secs", 300)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("service.channel_capacity", 512)?
            .add_source(File::with_name(path).required(false))
            .build()?;

        config.try_deserialize()
    }

    pub fn storage_path(&self) -> Result<PathBuf, anyhow::Error> {
        if !self.storage.path.is_empty() {
            return Ok(PathBuf::from(&self.storage.path));
        }

        let proj_dirs = ProjectDirs::from("com", "oryx", "exchange")
            .ok_or_else(|| anyhow!("Could not determine a data directory"))?;
        Ok(proj_dirs.data_dir().join("store"))
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
