use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::query::RetryPolicy;

const DEFAULT_API_URL: &str = "http://localhost:4000";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub queries: QueriesConfig,
  #[serde(default)]
  pub mutations: MutationsConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the posts API (e.g., "http://localhost:4000")
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Page size sent as `_per_page`
  #[serde(default = "default_per_page")]
  pub per_page: u32,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      per_page: default_per_page(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueriesConfig {
  /// Freshness window for post pages, in seconds
  #[serde(default = "default_posts_stale_secs")]
  pub posts_stale_secs: u64,
  /// Keep showing the previous page while the next one loads
  #[serde(default = "default_true")]
  pub keep_previous_page: bool,
}

impl Default for QueriesConfig {
  fn default() -> Self {
    Self {
      posts_stale_secs: default_posts_stale_secs(),
      keep_previous_page: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MutationsConfig {
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
  #[serde(default = "default_retry_max_delay_ms")]
  pub retry_max_delay_ms: u64,
}

impl Default for MutationsConfig {
  fn default() -> Self {
    Self {
      max_attempts: default_max_attempts(),
      retry_base_delay_ms: default_retry_base_delay_ms(),
      retry_max_delay_ms: default_retry_max_delay_ms(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter directive when POSTBOARD_LOG / RUST_LOG are unset
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Directory for postboard.log (defaults to the platform data dir)
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      dir: None,
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_per_page() -> u32 {
  10
}

fn default_posts_stale_secs() -> u64 {
  5 * 60
}

fn default_true() -> bool {
  true
}

fn default_max_attempts() -> u32 {
  3
}

fn default_retry_base_delay_ms() -> u64 {
  1000
}

fn default_retry_max_delay_ms() -> u64 {
  30_000
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./postboard.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/postboard/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found. The API URL can be
  /// overridden with POSTBOARD_API_URL.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("POSTBOARD_API_URL") {
      config.api.url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("postboard.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("postboard").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Check values that serde cannot express.
  pub fn validate(&self) -> Result<()> {
    self.api_url()?;
    if self.api.per_page == 0 {
      return Err(eyre!("api.per_page must be at least 1"));
    }
    if self.mutations.max_attempts == 0 {
      return Err(eyre!("mutations.max_attempts must be at least 1"));
    }
    Ok(())
  }

  /// Parsed API base URL.
  pub fn api_url(&self) -> Result<Url> {
    Url::parse(&self.api.url).map_err(|e| eyre!("Invalid api.url '{}': {}", self.api.url, e))
  }

  pub fn posts_stale_time(&self) -> Duration {
    Duration::from_secs(self.queries.posts_stale_secs)
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.mutations.max_attempts,
      base_delay: Duration::from_millis(self.mutations.retry_base_delay_ms),
      max_delay: Duration::from_millis(self.mutations.retry_max_delay_ms),
    }
  }

  /// Directory the log file is written to.
  pub fn log_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.log.dir {
      return Ok(dir.clone());
    }
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;
    Ok(data_dir.join("postboard"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tmp file");
    file.write_all(contents.as_bytes()).expect("write tmp");
    file
  }

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.url, "http://localhost:4000");
    assert_eq!(config.api.per_page, 10);
    assert_eq!(config.posts_stale_time(), Duration::from_secs(300));
    assert!(config.queries.keep_previous_page);
    assert_eq!(config.retry_policy().max_attempts, 3);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let file = write_config("api:\n  url: http://example.test:8080\nmutations:\n  max_attempts: 5\n");
    let config = Config::load_from_path(file.path()).expect("config");
    assert_eq!(config.api.url, "http://example.test:8080");
    assert_eq!(config.api.per_page, 10);
    assert_eq!(config.mutations.max_attempts, 5);
    assert_eq!(config.mutations.retry_base_delay_ms, 1000);
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_invalid_url_rejected() {
    let file = write_config("api:\n  url: not a url\n");
    let config = Config::load_from_path(file.path()).expect("config");
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_zero_page_size_rejected() {
    let file = write_config("api:\n  per_page: 0\n");
    let config = Config::load_from_path(file.path()).expect("config");
    assert!(config.validate().is_err());
  }
}
