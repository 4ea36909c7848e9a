use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub processor: ProcessorConfig,
    pub identity: ServiceEndpoint,
    pub peer: ServiceEndpoint,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessorConfig {
    pub secret_key: String,
    #[serde(default = "default_processor_url")]
    pub base_url: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

fn default_processor_url() -> String { "https://api.stripe.com".to_string() }
fn default_currency() -> String { "eur".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceEndpoint {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Applied to every outbound call (processor, identity, peer).
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, uncommitted overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `PAYSYNC_PROCESSOR__SECRET_KEY=sk_live_...`
            .add_source(config::Environment::with_prefix("PAYSYNC").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
