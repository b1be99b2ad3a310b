//! Runtime configuration, read from `AGRI_*` environment variables (and `.env`).

use std::path::PathBuf;
use std::time::Duration;

use ag_core::models::Language;
use anyhow::{ensure, Context};
use config::{Config, Environment};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Used only when `AGRI_SESSION_SALT` is unset.
const DEV_SESSION_SALT: &str = "agri-sentinel-dev-salt";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub upload_url: String,
    pub session_salt: Option<SecretString>,
    pub session_ttl_hours: i64,
    pub language: Language,
    pub processing_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_url: "sqlite:agri_sentinel.db".into(),
            upload_dir: PathBuf::from("./data/uploads"),
            upload_url: "/static/uploads".into(),
            session_salt: None,
            session_ttl_hours: 12,
            language: Language::English,
            processing_delay_ms: 1500,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(None)
    }

    /// `vars` replaces the process environment when given.
    fn load(vars: Option<config::Map<String, String>>) -> anyhow::Result<Self> {
        let source = Environment::with_prefix("AGRI")
            .try_parsing(true)
            .ignore_empty(true)
            .source(vars);
        let config: AppConfig = Config::builder()
            .add_source(source)
            .build()
            .context("reading AGRI_* settings")?
            .try_deserialize()
            .context("invalid AGRI_* settings")?;

        ensure!(config.session_ttl_hours > 0, "AGRI_SESSION_TTL_HOURS must be positive");
        Ok(config)
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn has_session_salt(&self) -> bool {
        self.session_salt.is_some()
    }

    pub fn session_salt(&self) -> &str {
        match &self.session_salt {
            Some(salt) => salt.expose_secret(),
            None => DEV_SESSION_SALT,
        }
    }
}
