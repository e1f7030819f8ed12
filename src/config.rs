//! Application configuration, layered: defaults < environment.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_settlement_delay_secs")]
    pub settlement_delay_secs: u64,
    #[serde(default = "default_worker_count")]
    pub workflow_worker_count: usize,
    #[serde(default = "default_max_retries")]
    pub workflow_max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub workflow_retry_backoff_ms: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_settlement_delay_secs() -> u64 {
    10
}

fn default_worker_count() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let cfg = config::Config::builder()
            .set_default("port", default_port() as i64)?
            .set_default("settlement_delay_secs", default_settlement_delay_secs() as i64)?
            .set_default("workflow_worker_count", default_worker_count() as i64)?
            .set_default("workflow_max_retries", default_max_retries() as i64)?
            .set_default("workflow_retry_backoff_ms", default_retry_backoff_ms() as i64)?
            .add_source(
                config::Environment::with_prefix("OMC")
                    .try_parsing(true)
                    .separator("_"),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    pub fn settlement_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.settlement_delay_secs as i64)
    }
}
