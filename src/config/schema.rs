use crate::slack::cache::DEFAULT_IM_CAPACITY;
use crate::slack::error::{SlackError, SlackResult};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables consulted for the token, in order.
const TOKEN_ENV_VARS: [&str; 2] = ["SLACKLINE_TOKEN", "SLACK_TOKEN"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where this config was loaded from (not serialized)
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_level: String,
    pub slack: SlackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            log_level: "info".into(),
            slack: SlackConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot token ("Bot Integration" token, `xoxb-…`)
    pub token: Option<String>,
    /// Base URL of the Web API
    pub api_base: String,
    /// Pause between event batches
    pub poll_interval_ms: u64,
    /// Number of memoized direct conversations
    pub im_cache_capacity: usize,
    /// User names allowed to run admin commands
    pub admins: Vec<String>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://slack.com/api".into(),
            poll_interval_ms: 1000,
            im_cache_capacity: DEFAULT_IM_CAPACITY,
            admins: Vec::new(),
        }
    }
}

impl SlackConfig {
    /// The configured token.
    ///
    /// # Errors
    ///
    /// `MissingToken` when unset or blank.
    pub fn token(&self) -> SlackResult<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SlackError::MissingToken)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// `<platform config dir>/slackline/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "slackline").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path` (tilde-expanded) or the default location, then apply
    /// environment overrides. A missing file yields defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(p).as_ref()),
            None => Self::default_path()
                .context("could not determine a config directory; pass --config")?,
        };
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = TOKEN_ENV_VARS
            .iter()
            .filter_map(|key| lookup(key))
            .find(|v| !v.trim().is_empty())
        {
            self.slack.token = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.slack.api_base, "https://slack.com/api");
        assert_eq!(config.slack.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.slack.im_cache_capacity, 50);
        assert!(matches!(config.slack.token(), Err(SlackError::MissingToken)));
    }

    #[test]
    fn blank_token_is_missing() {
        let slack = SlackConfig {
            token: Some("   ".into()),
            ..SlackConfig::default()
        };
        assert!(matches!(slack.token(), Err(SlackError::MissingToken)));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.config_path, path);
        assert!(config.slack.token.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[slack]
token = "xoxb-file"
admins = ["alice"]
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.slack.token().unwrap(), "xoxb-file");
        assert_eq!(config.slack.admins, ["alice"]);
        assert_eq!(config.slack.poll_interval_ms, 1000);
    }

    #[test]
    fn invalid_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "slack = 3").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn env_token_overrides_file() {
        let env: HashMap<&str, &str> = [("SLACK_TOKEN", "xoxb-env")].into();
        let mut config = Config::default();
        config.slack.token = Some("xoxb-file".into());
        config.apply_env_overrides(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.slack.token().unwrap(), "xoxb-env");
    }

    #[test]
    fn slackline_token_wins_over_slack_token() {
        let env: HashMap<&str, &str> =
            [("SLACKLINE_TOKEN", "xoxb-a"), ("SLACK_TOKEN", "xoxb-b")].into();
        let mut config = Config::default();
        config.apply_env_overrides(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.slack.token().unwrap(), "xoxb-a");
    }

    #[test]
    fn empty_env_token_is_ignored() {
        let env: HashMap<&str, &str> = [("SLACKLINE_TOKEN", "")].into();
        let mut config = Config::default();
        config.slack.token = Some("xoxb-file".into());
        config.apply_env_overrides(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.slack.token().unwrap(), "xoxb-file");
    }
}
