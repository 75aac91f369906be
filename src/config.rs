use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::{clients::messaging::MULTICAST_LIMIT, services::dispatcher::DispatchSettings};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    pub fcm_project_id: String,
    #[serde(default = "default_fcm_base_url")]
    pub fcm_base_url: String,
    #[serde(default = "default_batch_size")]
    pub fcm_batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub fcm_batch_delay_ms: u64,

    /// Accept `custom` audience filters. Only enable behind trusted callers.
    #[serde(default)]
    pub allow_custom_filters: bool,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_sweep_deadline")]
    pub sweep_deadline_seconds: u64,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct SweepSettings {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        Ok(config)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            batch_size: self.fcm_batch_size.clamp(1, MULTICAST_LIMIT),
            batch_delay: Duration::from_millis(self.fcm_batch_delay_ms),
        }
    }

    pub fn sweep_settings(&self) -> SweepSettings {
        SweepSettings {
            interval: Duration::from_secs(self.sweep_interval_seconds.max(1)),
            deadline: Duration::from_secs(self.sweep_deadline_seconds.max(1)),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_fcm_base_url() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_batch_size() -> usize {
    MULTICAST_LIMIT
}

fn default_batch_delay_ms() -> u64 {
    100
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_sweep_deadline() -> u64 {
    50
}

fn default_server_port() -> u16 {
    8080
}
