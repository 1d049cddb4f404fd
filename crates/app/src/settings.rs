//! Handles settings for the application.
//!
//! Configuration is read from `settings.toml` (optional) and from `DIVVY_*`
//! environment variables (`DIVVY_APP__LEVEL=debug`, `DIVVY_DATABASE=memory`),
//! which win over the file:
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [database]
//! sqlite = "divvy.db"   # or: database = "memory"
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    #[serde(default = "default_database")]
    pub database: Database,
}

fn default_database() -> Database {
    Database::Sqlite("divvy.db".to_string())
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("DIVVY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }
}
