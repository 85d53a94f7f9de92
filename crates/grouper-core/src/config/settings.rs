use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

impl Settings {
    /// Layered load: optional `config/settings.*` file, then
    /// `APP__`-prefixed environment variables (e.g. `APP__DATABASE__URL`).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl DatabaseConfig {
    /// For tests and tooling that only have a connection URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_max_size: 10,
            pool_timeout_seconds: 30,
        }
    }
}
