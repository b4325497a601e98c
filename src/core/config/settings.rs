use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use validator::Validate;

/// Which backing store the reflectors write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Etcd,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "etcd" => Ok(StoreBackend::Etcd),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("unknown store backend '{other}'")),
        }
    }
}

/// Process settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone, Validate)]
pub struct Settings {
    pub store_backend: StoreBackend,

    #[validate(url)]
    pub etcd_endpoint: String,

    #[validate(length(min = 1))]
    pub key_prefix: String,

    #[validate(length(min = 1))]
    pub resources: Vec<String>,

    /// Fixed wait between resync attempts. Not exponential.
    #[validate(range(min = 1, max = 60000))]
    pub resync_backoff_ms: u64,

    #[validate(range(min = 1, max = 3600))]
    pub health_probe_secs: u64,

    #[validate(range(min = 1))]
    pub event_buffer: usize,

    #[validate(length(min = 1))]
    pub server_addr: String,

    pub log_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Etcd,
            etcd_endpoint: "http://127.0.0.1:2379".to_string(),
            key_prefix: "/ksr/".to_string(),
            resources: ["namespace", "pod", "service", "node"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            resync_backoff_ms: 100,
            health_probe_secs: 5,
            event_buffer: 1024,
            server_addr: "0.0.0.0:9191".to_string(),
            log_dir: None,
        }
    }
}

impl Settings {
    /// Load `.env` (if any), then read `KSR_*` variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Settings::default();

        if let Some(v) = lookup("KSR_STORE_BACKEND") {
            s.store_backend = v.parse()?;
        }
        if let Some(v) = lookup("KSR_ETCD_ENDPOINT") {
            s.etcd_endpoint = v;
        }
        if let Some(v) = lookup("KSR_KEY_PREFIX") {
            s.key_prefix = v;
        }
        if let Some(v) = lookup("KSR_RESOURCES") {
            s.resources = v
                .split(',')
                .map(|r| r.trim().to_ascii_lowercase())
                .filter(|r| !r.is_empty())
                .collect();
        }
        if let Some(v) = lookup("KSR_RESYNC_BACKOFF_MS") {
            s.resync_backoff_ms = v.parse().context("KSR_RESYNC_BACKOFF_MS must be an integer")?;
        }
        if let Some(v) = lookup("KSR_HEALTH_PROBE_SECS") {
            s.health_probe_secs = v.parse().context("KSR_HEALTH_PROBE_SECS must be an integer")?;
        }
        if let Some(v) = lookup("KSR_EVENT_BUFFER") {
            s.event_buffer = v.parse().context("KSR_EVENT_BUFFER must be an integer")?;
        }
        if let Some(v) = lookup("KSR_SERVER_ADDR") {
            s.server_addr = v;
        }
        s.log_dir = lookup("KSR_LOG_DIR").filter(|v| !v.is_empty());

        if !s.key_prefix.ends_with('/') {
            s.key_prefix.push('/');
        }

        s.validate()?;
        Ok(s)
    }

    pub fn resync_backoff(&self) -> Duration {
        Duration::from_millis(self.resync_backoff_ms)
    }

    pub fn health_probe_interval(&self) -> Duration {
        Duration::from_secs(self.health_probe_secs)
    }
}
