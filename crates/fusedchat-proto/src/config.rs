use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

/// Process-wide settings. Built once at startup (file + environment
/// overrides) and handed to every component that needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub ai_service: AiServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub operator: OperatorConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origin allowed by CORS.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

/// External Python AI service. No URL means the podcast endpoints answer 503.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of `<user>/<category>/<file>` uploads.
    #[serde(default = "platform::assets_dir")]
    pub assets_dir: PathBuf,
    /// JSON array of user records.
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
}

/// Operator-wide provider keys, substituted for users whose access request
/// was approved.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grok_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Sent as `x-user-id` on every gateway request.
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "platform::history_dir")]
    pub history_dir: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        Self {
            url: None,
            health_timeout_secs: default_health_timeout_secs(),
        }
    }
}

impl AiServiceConfig {
    /// Configured base URL without a trailing slash; blank counts as unset.
    pub fn base_url(&self) -> Option<String> {
        self.url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .map(str::to_string)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            assets_dir: platform::assets_dir(),
            users_file: default_users_file(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            user_id: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            history_dir: platform::history_dir(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_health_timeout_secs() -> u64 {
    7
}

fn default_users_file() -> PathBuf {
    platform::data_dir().join("users.json")
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Apply environment overrides. Called once at startup with
    /// `|k| std::env::var(k).ok()`; nothing reads the environment later.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("PYTHON_AI_CORE_SERVICE_URL") {
            self.ai_service.url = Some(url);
        }
        if let Some(port) = get("PORT") {
            match port.trim().parse() {
                Ok(p) => self.http.port = p,
                Err(_) => tracing::warn!("Ignoring invalid PORT value {:?}", port),
            }
        }
        if let Some(key) = get("ADMIN_GEMINI_API_KEY") {
            self.operator.gemini_api_key = Some(key);
        }
        if let Some(key) = get("ADMIN_GROQ_API_KEY") {
            self.operator.grok_api_key = Some(key);
        }
        if let Some(user) = get("FUSEDCHAT_USER_ID") {
            self.client.user_id = user;
        }
        if let Some(url) = get("FUSEDCHAT_GATEWAY_URL") {
            self.client.gateway_url = url;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            ai_service: AiServiceConfig::default(),
            storage: StorageConfig::default(),
            operator: OperatorConfig::default(),
            client: ClientConfig::default(),
        }
    }
}
