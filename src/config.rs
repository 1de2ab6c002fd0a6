use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL. Without it the gateway runs on in-memory stores.
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Seller notification settings (e-mail API credentials and the fallback chain)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Marketplace name used in the mailto sign-off
    pub brand: String,
    pub emailjs_base_url: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    /// Wait before the first delivery attempt
    pub init_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub api_enabled: bool,
    pub form_enabled: bool,
    pub mailto_enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            brand: "Campus Market".to_string(),
            emailjs_base_url: "https://api.emailjs.com".to_string(),
            service_id: String::new(),
            template_id: String::new(),
            public_key: String::new(),
            init_delay_ms: 0,
            request_timeout_ms: 5000,
            api_enabled: false,
            form_enabled: false,
            mailto_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`; `DATABASE_URL` overrides `postgres_url`.
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })?;

        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.is_empty()
        {
            config.postgres_url = Some(url);
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}
