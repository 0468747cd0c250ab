use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as RConfig, Environment, File, FileFormat};
use ghtail_common::constants::{DEFAULT_API_BASE_URL, DEFAULT_WEB_BASE_URL};
use serde::{Deserialize, Serialize};

const STATUS_REFRESH_INTERVAL_MS: u64 = 5000;
const STARTUP_POLL_INTERVAL_MS: u64 = 1000;
const RESOLVE_ATTEMPTS: u64 = 10;
const RESOLVE_RETRY_DELAY_MS: u64 = 1000;
const RUN_POLL_INTERVAL_MS: u64 = 4000;
const RUN_POLL_PAGE_SIZE: u64 = 10;
const EVENT_BUFFER: u64 = 64;
const USER_AGENT: &str = concat!("ghtail/", env!("CARGO_PKG_VERSION"));

const ENV_PREFIX: &str = "GHTAIL";
const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
const USER_SESSION_ENV: &str = "GITHUB_USER_SESSION";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub github_token: Option<String>,
    /// Value of the `user_session` cookie of a signed-in browser session.
    pub user_session: Option<String>,

    pub api_base_url: String,
    pub web_base_url: String,
    pub user_agent: String,

    pub status_refresh_interval_ms: u64,
    pub startup_poll_interval_ms: u64,
    pub resolve_attempts: u64,
    pub resolve_retry_delay_ms: u64,
    pub run_poll_interval_ms: u64,
    pub run_poll_page_size: u64,
    pub event_buffer: u64,

    /// Report runs that were already finished when tailing started instead of
    /// silently treating them as tailed.
    pub report_already_completed: bool,

    pub log_dir: Option<String>,

    pub config_sources: Vec<String>,
}

impl Config {
    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.status_refresh_interval_ms)
    }

    pub fn startup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.startup_poll_interval_ms)
    }

    pub fn resolve_retry_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_retry_delay_ms)
    }

    pub fn run_poll_interval(&self) -> Duration {
        Duration::from_millis(self.run_poll_interval_ms)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_default_config() -> Result<Config> {
        Self::load_config(None)
    }

    /// Defaults, then the optional TOML file, then `GHTAIL_*` environment variables.
    pub fn load_config(path: Option<&str>) -> Result<Config> {
        let mut builder = RConfig::builder();

        // set defaults
        builder = builder
            .set_default("github_token", None::<String>)?
            .set_default("user_session", None::<String>)?
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("web_base_url", DEFAULT_WEB_BASE_URL)?
            .set_default("user_agent", USER_AGENT)?
            .set_default("status_refresh_interval_ms", STATUS_REFRESH_INTERVAL_MS)?
            .set_default("startup_poll_interval_ms", STARTUP_POLL_INTERVAL_MS)?
            .set_default("resolve_attempts", RESOLVE_ATTEMPTS)?
            .set_default("resolve_retry_delay_ms", RESOLVE_RETRY_DELAY_MS)?
            .set_default("run_poll_interval_ms", RUN_POLL_INTERVAL_MS)?
            .set_default("run_poll_page_size", RUN_POLL_PAGE_SIZE)?
            .set_default("event_buffer", EVENT_BUFFER)?
            .set_default("report_already_completed", false)?
            .set_default("log_dir", None::<String>)?;

        let mut sources = vec![];
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
            sources.push(path.to_string());
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        // set overrides
        builder = builder.set_override("config_sources", sources)?;

        let mut config: Config = builder
            .build()?
            .try_deserialize()
            .context("failed to parse config file")?;

        if config.github_token.is_none() {
            config.github_token = non_empty_env(GITHUB_TOKEN_ENV);
        }
        if config.user_session.is_none() {
            config.user_session = non_empty_env(USER_SESSION_ENV);
        }

        Ok(config)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}
