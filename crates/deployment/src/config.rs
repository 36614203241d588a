//! Settings read from the environment (and `.env`, when present).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use db::models::page::MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use services::services::list::ListConfig;
use tracing::debug;

use crate::DeploymentError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://studio.db";
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub list: ListConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            list: ListConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, DeploymentError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DeploymentError> {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            config.database_url = url;
        }
        if let Some(host) = lookup("HOST") {
            config.host = parse("HOST", &host)?;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(page_size) = lookup("LIST_PAGE_SIZE") {
            config.list.page_size = parse("LIST_PAGE_SIZE", &page_size)?;
        }
        if let Some(timeout) = lookup("MUTATION_TIMEOUT_MS") {
            config.list.mutation_timeout_ms = parse("MUTATION_TIMEOUT_MS", &timeout)?;
        }

        config
            .list
            .validate()
            .map_err(|e| DeploymentError::Config(e.to_string()))?;
        if config.list.page_size as i64 > MAX_PAGE_SIZE {
            return Err(DeploymentError::Config(format!(
                "LIST_PAGE_SIZE cannot exceed {MAX_PAGE_SIZE}"
            )));
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DeploymentError> {
    value
        .trim()
        .parse()
        .map_err(|_| DeploymentError::Config(format!("{key} has invalid value {value:?}")))
}
