//! Configuration management for the sync daemon.

use crate::{CoreError, CoreResult, EngineSettings, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Connection settings for one external system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Base URL of the target instance, e.g. `https://isp.splynx.app`.
    pub base_url: String,
    /// API key (Splynx API key / ERPNext API key).
    pub api_key: String,
    /// API secret paired with `api_key`.
    pub api_secret: String,
}

impl TargetSettings {
    /// Parse the base URL.
    pub fn url(&self) -> CoreResult<Url> {
        Url::parse(&self.base_url).map_err(CoreError::from)
    }
}

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Retry/batching settings.
    #[serde(default)]
    pub engine: EngineSettings,
    /// Splynx connection, if write-back to Splynx is enabled.
    #[serde(default)]
    pub splynx: Option<TargetSettings>,
    /// ERPNext connection, if write-back to ERPNext is enabled.
    #[serde(default)]
    pub erpnext: Option<TargetSettings>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            engine: EngineSettings::default(),
            splynx: None,
            erpnext: None,
        }
    }
}

impl Config {
    /// Load configuration from the config file (if present), then apply
    /// environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Check that every configured target has a usable URL and credentials.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, target) in [("splynx", &self.splynx), ("erpnext", &self.erpnext)] {
            let Some(target) = target else { continue };
            let url = target.url()?;
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(CoreError::Config(format!(
                    "{} base_url must be http(s), got {}",
                    name,
                    url.scheme()
                )));
            }
            if target.api_key.trim().is_empty() {
                return Err(CoreError::Config(format!("{} api_key is empty", name)));
            }
        }
        Ok(())
    }

    /// Override configuration from `OUTSYNC_*` environment variables.
    fn load_from_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).and_then(non_empty);

        if let Some(level) = lookup("OUTSYNC_LOG_LEVEL") {
            self.log_level = level;
        }
        apply_target_env(&mut self.splynx, "SPLYNX", &lookup);
        apply_target_env(&mut self.erpnext, "ERPNEXT", &lookup);
    }
}

fn apply_target_env(
    target: &mut Option<TargetSettings>,
    prefix: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) {
    let url = lookup(&format!("OUTSYNC_{}_URL", prefix));
    let key = lookup(&format!("OUTSYNC_{}_API_KEY", prefix));
    let secret = lookup(&format!("OUTSYNC_{}_API_SECRET", prefix));

    match target {
        Some(existing) => {
            if let Some(url) = url {
                existing.base_url = url;
            }
            if let Some(key) = key {
                existing.api_key = key;
            }
            if let Some(secret) = secret {
                existing.api_secret = secret;
            }
        }
        None => {
            // A target configured purely from env needs at least URL and key
            if let (Some(base_url), Some(api_key)) = (url, key) {
                *target = Some(TargetSettings {
                    base_url,
                    api_key,
                    api_secret: secret.unwrap_or_default(),
                });
            }
        }
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.splynx.is_none());
        assert!(config.erpnext.is_none());
        assert_eq!(config.engine, EngineSettings::default());
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "engine": { "batch_size": 10 },
            "erpnext": {
                "base_url": "https://erp.example.com",
                "api_key": "key",
                "api_secret": "secret"
            }
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.engine.batch_size, 10);
        assert_eq!(config.engine.max_retries, EngineSettings::default().max_retries);
        assert_eq!(config.erpnext.unwrap().base_url, "https://erp.example.com");
        assert!(config.splynx.is_none());
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.log_level = "trace".to_string();
        config.splynx = Some(TargetSettings {
            base_url: "https://isp.splynx.app".to_string(),
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
        });
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.splynx, config.splynx);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.engine, EngineSettings::default());
    }

    #[test]
    fn env_overrides_existing_target_fields() {
        let mut config = Config::default();
        config.erpnext = Some(TargetSettings {
            base_url: "https://old.example.com".to_string(),
            api_key: "old-key".to_string(),
            api_secret: "old-secret".to_string(),
        });

        config.apply_env(env(&[
            ("OUTSYNC_LOG_LEVEL", "warn"),
            ("OUTSYNC_ERPNEXT_URL", "https://new.example.com"),
            ("OUTSYNC_ERPNEXT_API_SECRET", "  "),
        ]));

        let erpnext = config.erpnext.unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(erpnext.base_url, "https://new.example.com");
        assert_eq!(erpnext.api_key, "old-key");
        assert_eq!(erpnext.api_secret, "old-secret");
    }

    #[test]
    fn env_creates_target_only_with_url_and_key() {
        let mut config = Config::default();
        config.apply_env(env(&[("OUTSYNC_SPLYNX_URL", "https://isp.splynx.app")]));
        assert!(config.splynx.is_none());

        config.apply_env(env(&[
            ("OUTSYNC_SPLYNX_URL", "https://isp.splynx.app"),
            ("OUTSYNC_SPLYNX_API_KEY", "key"),
        ]));
        let splynx = config.splynx.unwrap();
        assert_eq!(splynx.api_key, "key");
        assert_eq!(splynx.api_secret, "");
    }

    #[test]
    fn validate_rejects_bad_targets() {
        let mut config = Config::default();
        config.splynx = Some(TargetSettings {
            base_url: "not a url".to_string(),
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
        });
        assert!(matches!(config.validate(), Err(CoreError::InvalidUrl(_))));

        config.splynx = Some(TargetSettings {
            base_url: "ftp://isp.example.com".to_string(),
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
        });
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        config.splynx = Some(TargetSettings {
            base_url: "https://isp.example.com".to_string(),
            api_key: " ".to_string(),
            api_secret: "s".to_string(),
        });
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }
}
