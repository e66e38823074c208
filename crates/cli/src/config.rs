use std::path::Path;

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

use fedlink_telegram::TelegramConfig;

/// Adapter configuration, loaded from a TOML file with environment variable
/// overrides for the values that differ per deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub federation: FederationSection,
    pub retry: RetrySection,
    pub validation: ValidationSection,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 4001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://fedlink.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationSection {
    /// Registry base URL, no trailing slash.
    pub registry_url: String,
    /// Platform tag announced to the registry.
    pub platform: String,
    /// Address where peers can reach this adapter's HTTP surface.
    pub public_url: String,
}

impl Default for FederationSection {
    fn default() -> Self {
        Self {
            registry_url: "http://localhost:5000".into(),
            platform: "telegram".into(),
            public_url: "http://localhost:4001".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    pub startup_delay_secs: u64,
    /// 0 disables periodic revalidation; the startup pass still runs.
    pub interval_secs: u64,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            startup_delay_secs: 30,
            interval_secs: 3_600,
        }
    }
}

/// Load config from `path` when it exists, else defaults, then apply
/// environment overrides.
pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
        toml::from_str(&raw)?
    } else {
        AppConfig::default()
    };

    if let Ok(token) = std::env::var("FEDLINK_TELEGRAM_TOKEN") {
        config.telegram.token = Secret::new(token);
    }
    if let Ok(url) = std::env::var("FEDLINK_REGISTRY_URL") {
        config.federation.registry_url = url;
    }
    if let Ok(url) = std::env::var("FEDLINK_PUBLIC_URL") {
        config.federation.public_url = url;
    }
    if let Ok(url) = std::env::var("FEDLINK_DATABASE_URL") {
        config.database.url = url;
    }

    Ok(config)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 4001);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.federation.platform, "telegram");
    }

    #[test]
    fn partial_toml_keeps_defaults_for_the_rest() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [federation]
            registry_url = "http://registry:5000"

            [telegram]
            token = "123:ABC"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.federation.registry_url, "http://registry:5000");
        assert_eq!(config.retry.base_delay_ms, 1_000);
    }
}
