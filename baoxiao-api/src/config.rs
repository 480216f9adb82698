use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub server: Option<ServerConfig>,
    pub cors: Option<CorsConfig>,
    pub ledger: Option<LedgerConfig>,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: Some(ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            }),
            cors: Some(CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            }),
            ledger: None,
            admin: AdminConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// External ledger (Feishu Bitable) access parameters. All optional: a sync
/// request may carry its own, and token acquisition can derive an access
/// token from `app_id` + `app_secret`.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    pub app_token: Option<String>,
    pub table_id: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

/// Credentials that authorize mutations of write-protected months.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin123".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Only ledger rows whose resolved month is on/after this month take
    /// part in a sync pass. Accepts any of the parseable month forms.
    pub cutoff_month: String,
    pub page_size: u32,
    pub max_records: usize,
    pub max_pages: usize,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cutoff_month: "2025-12".to_string(),
            page_size: 500,
            max_records: 2000,
            max_pages: 200,
            retry_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl ApiConfig {
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let config_path = get_config_path();

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        // Create default config file if it doesn't exist
        if !config_path.exists() {
            let default_config = r#"
[server]
host = "127.0.0.1"
port = 8080

[cors]
allowed_origins = ["http://localhost:3000"]

[ledger]
# External ledger (Feishu Bitable) access. A sync request may also carry
# these; app_id + app_secret let the server fetch a tenant access token.
# app_token = "bascnXXXX"
# table_id = "tblXXXX"
# app_id = "cli_XXXX"
# app_secret = "XXXX"

[admin]
# Credentials that unlock mutations of protected historical months
username = "admin"
password = "admin123"

[sync]
cutoff_month = "2025-12"
page_size = 500
max_records = 2000
max_pages = 200
retry_attempts = 3
retry_backoff_ms = 500
"#;
            std::fs::write(&config_path, default_config).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            // BAOXIAO__LEDGER__APP_TOKEN=... style overrides
            .add_source(Environment::with_prefix("BAOXIAO").separator("__"))
            .build()?;

        let config: ApiConfig = builder.try_deserialize()?;

        Ok((config, config_path))
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("baoxiao").join("api.toml")
    } else {
        PathBuf::from("api.toml")
    }
}
