use std::path::PathBuf;

use crate::doc::Actor;
use crate::scheduler::ReplayConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Chat-completion endpoint.
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable that holds the API key. We
    /// don't store the key itself in the config file.
    pub api_key_env: String,
    /// Give up on the oracle after this many seconds.
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port of the HTTP surface.
    pub port: u16,
    /// Milliseconds between two replay actions.
    pub text_latency_ms: u64,
    /// Document used by requests that don't name one.
    pub doc_name: String,
    /// How the correction shows up on the presence channel.
    pub actor: Actor,
    pub oracle: OracleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 3000,
            text_latency_ms: 400,
            doc_name: "quill-demo".to_string(),
            actor: Actor::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    /// Check values serde can't check for us.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.text_latency_ms == 0 {
            anyhow::bail!("text_latency_ms must be at least 1");
        }
        Ok(())
    }

    /// The replay cadence. A zero latency is taken as 1ms, the replay
    /// ticker can't run with a zero period.
    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            period: Duration::from_millis(self.text_latency_ms.max(1)),
            actor: self.actor.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Option<PathBuf>,
    base_dirs: xdg::BaseDirectories,
    config: Config,
}

impl ConfigManager {
    /// Load the config from `config_location`, or from the standard
    /// (XDG) config location if it's None. A missing config file
    /// means default config.
    pub fn new(
        config_location: Option<PathBuf>,
        profile: Option<String>,
    ) -> anyhow::Result<ConfigManager> {
        let base_dirs = if let Some(profile) = profile {
            xdg::BaseDirectories::with_profile("collab-fix", profile)?
        } else {
            xdg::BaseDirectories::with_prefix("collab-fix")?
        };
        let mut config_man = ConfigManager {
            config_dir: config_location,
            base_dirs,
            config: Config::default(),
        };
        config_man.config = config_man.load()?;
        Ok(config_man)
    }

    /// Return a copy of the current config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    fn config_file(&self) -> Option<PathBuf> {
        if let Some(config_dir) = &self.config_dir {
            Some(config_dir.join(CONFIG_FILE_NAME))
        } else {
            self.base_dirs.find_config_file(CONFIG_FILE_NAME)
        }
    }

    fn load(&self) -> anyhow::Result<Config> {
        let Some(config_file) = self.config_file() else {
            return Ok(Config::default());
        };
        if !config_file.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&config_file)
            .with_context(|| format!("Failed to read config file {:?}", config_file))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", config_file))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {:?}", config_file))?;
        tracing::info!("Loaded config from {:?}", config_file);
        Ok(config)
    }

    /// Replace the current config with `config` and write it to disk.
    pub fn replace_and_save(&mut self, config: Config) -> anyhow::Result<()> {
        config.validate()?;
        let config_file = if let Some(config_dir) = &self.config_dir {
            std::fs::create_dir_all(config_dir)?;
            config_dir.join(CONFIG_FILE_NAME)
        } else {
            self.base_dirs
                .place_config_file(CONFIG_FILE_NAME)
                .context("Failed to find/create config directory")?
        };
        let content = serde_json::to_string_pretty(&config)?;
        std::fs::write(&config_file, content)
            .with_context(|| format!("Failed to save config to {:?}", config_file))?;
        self.config = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_man =
            ConfigManager::new(Some(temp_dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config_man.config(), Config::default());
        assert_eq!(config_man.config().replay_config().period, Duration::from_millis(400));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            r#"{ "text_latency_ms": 50, "actor": { "name": "Editor", "color": "green" } }"#,
        )
        .unwrap();
        let config = ConfigManager::new(Some(temp_dir.path().to_path_buf()), None)
            .unwrap()
            .config();
        assert_eq!(config.text_latency_ms, 50);
        assert_eq!(config.actor.name, "Editor");
        assert_eq!(config.port, 3000);
        assert_eq!(config.oracle, OracleConfig::default());
    }

    #[test]
    fn test_replace_and_save() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_dir = temp_dir.path().join("nested");
        let mut config_man = ConfigManager::new(Some(config_dir.clone()), None).unwrap();
        let config = Config {
            port: 4000,
            doc_name: "notes".to_string(),
            ..Config::default()
        };
        config_man.replace_and_save(config.clone()).unwrap();
        assert_eq!(config_man.config(), config);

        let reloaded = ConfigManager::new(Some(config_dir), None).unwrap();
        assert_eq!(reloaded.config(), config);
    }

    #[test]
    fn test_zero_latency_is_rejected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            r#"{ "text_latency_ms": 0 }"#,
        )
        .unwrap();
        assert!(ConfigManager::new(Some(temp_dir.path().to_path_buf()), None).is_err());

        let mut config_man =
            ConfigManager::new(Some(temp_dir.path().join("other")), None).unwrap();
        let config = Config {
            text_latency_ms: 0,
            ..Config::default()
        };
        assert!(config_man.replace_and_save(config.clone()).is_err());
        assert_eq!(config_man.config(), Config::default());

        // Built by hand, the config still yields a usable period.
        assert_eq!(config.replay_config().period, Duration::from_millis(1));
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "{ port: ").unwrap();
        assert!(ConfigManager::new(Some(temp_dir.path().to_path_buf()), None).is_err());
    }
}
