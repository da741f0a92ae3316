/*!
 * Pick'em service config file
 */

use std::net::SocketAddr;

use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub db_config: DbConfig,
    #[serde(default)]
    pub server_config: ServerConfig,
    #[serde(default)]
    pub schedule_config: ScheduleConfig,
    pub tracing_config: Option<TracingConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct DbConfig {
    /// Database URL
    pub database_url: String,

    /// Rows fetched per query when reading whole tables
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Address the HTTP API listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Refuse picks on games that already kicked off
    #[serde(default)]
    pub enforce_kickoff: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleConfig {
    /// Upstream season document. The bundled season is used when absent.
    pub feed_url: Option<String>,

    /// Seconds between two syncs of the current week, no background sync if absent
    pub sync_interval: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TracingConfig {
    /// Jaeger agent endpoint, as `host:port`
    pub jaeger: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen: default_listen(), enforce_kickoff: false }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_batch_size() -> i64 {
    1000
}

pub fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
}
