use crate::application::InventoryConfig;
use crate::domain::{Capacity, DelayMillis, ProductId};
use crate::error::Error;
use config::builder::DefaultState;
pub use config::ConfigError;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::env;

/// Origins of the local dashboard
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub inventory: InventorySettings,
    #[serde(default)]
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// Browser origins allowed to call the API
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database_name: String,
    pub max_connections: u32,
}

/// Raw sale parameters; validated by [`Settings::inventory_config`]
#[derive(Debug, Deserialize, Clone)]
pub struct InventorySettings {
    pub product_id: i32,
    pub initial_capacity: i64,
    pub naive_delay_ms: u64,
}

/// Fast counter backend; without a `url` the counter is process-local
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheSettings {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Self::with_defaults(&environment)?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix, e.g. FLASH_SALE__INVENTORY__INITIAL_CAPACITY
            .add_source(
                Environment::with_prefix("FLASH_SALE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("application.cors_origins"),
            )
            .build()?
            .try_deserialize()
    }

    fn with_defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 8080)?
            .set_default("application.environment", environment)?
            .set_default("application.cors_origins", DEFAULT_CORS_ORIGINS.to_vec())?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.username", "postgres")?
            .set_default("database.password", "password")?
            .set_default("database.database_name", "flash_sale")?
            .set_default("database.max_connections", 20)?
            .set_default("inventory.product_id", 1)?
            .set_default("inventory.initial_capacity", 100)?
            .set_default("inventory.naive_delay_ms", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.host,
            self.database.port,
            self.database.database_name
        )
    }

    pub fn inventory_config(&self) -> Result<InventoryConfig, Error> {
        let inventory = &self.inventory;
        Ok(InventoryConfig {
            product_id: ProductId::try_new(inventory.product_id)
                .map_err(|_| Error::invalid_config("inventory.product_id"))?,
            initial_capacity: Capacity::try_new(inventory.initial_capacity)
                .map_err(|_| Error::invalid_config("inventory.initial_capacity"))?,
            naive_delay: DelayMillis::new(inventory.naive_delay_ms),
        })
    }
}
