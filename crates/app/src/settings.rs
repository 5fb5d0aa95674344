//! Settings of the settlement driver, read from an optional `settings.toml`
//! and overridden by `CLASSBANK__*` environment variables, e.g.
//! `CLASSBANK__SCHEDULER__INTERVAL_SECS=30`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Scheduler {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            enabled: default_enabled(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    #[serde(default)]
    pub scheduler: Scheduler,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_enabled() -> bool {
    true
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", default_level())?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("CLASSBANK").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
