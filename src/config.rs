use config::{ConfigError, Environment};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret_key: String, // Ed25519 private key (PEM)
    pub jwt_public_key: String, // Ed25519 public key (PEM)
    pub auth_issuer: String,
    pub default_timezone: String,
    pub lock_timeout_ms: u64,
    pub db_max_connections: u32,
    pub log_dir: String,
    pub admin_username: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        config::Config::builder()
            .add_source(Environment::default().try_parsing(true))
            .set_default("database_url", "sqlite://fitness_studio.db")?
            .set_default("port", 8000)?
            .set_default("auth_issuer", "https://api.fitness-studio.local")?
            .set_default("default_timezone", "Asia/Kolkata")?
            .set_default("lock_timeout_ms", 5000)?
            .set_default("db_max_connections", 10)?
            .set_default("log_dir", "./logs")?
            .build()?
            .try_deserialize()
    }
}
