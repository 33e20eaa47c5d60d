use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Jira instance used when neither the config file nor `JIRA_URL` names one.
const DEFAULT_JIRA_URL: &str = "https://ultidev";

/// Board reported on when none is given.
pub const DEFAULT_BOARD_ID: u64 = 2924;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub jira: JiraConfig,
  /// Board id used when none is passed on the command line
  pub board: Option<u64>,
  pub report: ReportConfig,
  pub cache: CacheConfig,
  /// Write logs to this file instead of stderr
  pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
  /// Password if set, otherwise the API token: Basic auth for
  /// .atlassian.net, Bearer auth elsewhere
  #[default]
  Auto,
  /// Basic auth with username and password (or API token as password)
  Basic,
  /// Bearer auth with a personal access token
  Bearer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
  pub url: Option<String>,
  pub username: Option<String>,
  pub auth_type: AuthType,
  /// Skip TLS certificate verification (self-signed on-premise servers)
  pub insecure_tls: bool,
  pub timeout_secs: u64,
}

impl Default for JiraConfig {
  fn default() -> Self {
    Self {
      url: None,
      username: None,
      auth_type: AuthType::Auto,
      insecure_tls: false,
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
  /// Statuses to report on, in display order
  pub statuses: Vec<String>,
  /// Statuses that never show up in the report
  pub ignore_statuses: Vec<String>,
  /// Append statuses missing from `statuses`, alphabetically
  pub include_unlisted: bool,
  /// IANA zone "today" is taken in (default: system local time)
  pub timezone: Option<String>,
}

impl Default for ReportConfig {
  fn default() -> Self {
    Self {
      statuses: vec![
        "In Progress".into(),
        "In Progress - 1".into(),
        "In Progress - 2".into(),
        "In Testing".into(),
      ],
      ignore_statuses: vec!["Open".into(), "Reopened".into(), "Closed".into()],
      include_unlisted: false,
      timezone: None,
    }
  }
}

impl ReportConfig {
  /// Parse the configured timezone, if any.
  pub fn timezone(&self) -> Result<Option<chrono_tz::Tz>> {
    self
      .timezone
      .as_deref()
      .map(|name| {
        name
          .parse::<chrono_tz::Tz>()
          .map_err(|e| eyre!("Unknown timezone '{}': {}", name, e))
      })
      .transpose()
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// One JSON file per page
  #[default]
  File,
  /// Single SQLite database
  Sqlite,
  /// No caching
  None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend: CacheBackend,
  /// Cache directory (default: $XDG_CACHE_HOME/jira-aging)
  pub dir: Option<PathBuf>,
  /// Age after which a cached page is refetched
  pub stale_minutes: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::File,
      dir: None,
      stale_minutes: 60,
    }
  }
}

impl CacheConfig {
  /// Resolve the cache directory.
  pub fn dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.dir {
      return Ok(dir.clone());
    }

    let cache_dir = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or_else(|| eyre!("Could not determine cache directory"))?;

    Ok(cache_dir.join("jira-aging"))
  }

  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.stale_minutes.max(0))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jira-aging.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jira-aging/config.yaml
  ///
  /// Without a file, defaults plus environment variables are used.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("jira-aging.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jira-aging").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Jira base URL: `JIRA_URL`, then the config file, then the built-in default.
  pub fn jira_url(&self) -> String {
    resolve_setting(std::env::var("JIRA_URL").ok(), self.jira.url.as_deref())
      .unwrap_or_else(|| DEFAULT_JIRA_URL.to_string())
  }

  /// Jira username: `JIRA_USERNAME`, then the config file.
  pub fn username(&self) -> Option<String> {
    resolve_setting(std::env::var("JIRA_USERNAME").ok(), self.jira.username.as_deref())
  }

  /// Get the Jira password from environment variables.
  ///
  /// Checks JIRA_PASSWORD.
  pub fn get_password() -> Option<String> {
    std::env::var("JIRA_PASSWORD").ok().filter(|s| !s.is_empty())
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JIRA_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("JIRA_API_TOKEN").ok().filter(|s| !s.is_empty())
  }
}

/// Non-empty environment value wins over the configured one.
fn resolve_setting(env: Option<String>, configured: Option<&str>) -> Option<String> {
  env
    .filter(|s| !s.is_empty())
    .or_else(|| configured.map(String::from))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = Config::from_yaml("").unwrap();

    assert_eq!(config.board, None);
    assert_eq!(config.jira.auth_type, AuthType::Auto);
    assert_eq!(config.jira.timeout_secs, 30);
    assert_eq!(config.report.statuses.len(), 4);
    assert_eq!(config.report.ignore_statuses, vec!["Open", "Reopened", "Closed"]);
    assert_eq!(config.cache.backend, CacheBackend::File);
    assert_eq!(config.cache.stale_time(), chrono::Duration::hours(1));
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
jira:
  url: https://jira.example.com
  username: jdoe
  auth_type: bearer
  insecure_tls: true
board: 42
report:
  statuses: ["In Review", "In Progress"]
  include_unlisted: true
  timezone: America/Chicago
cache:
  backend: sqlite
  dir: /tmp/aging
  stale_minutes: 15
log_file: /tmp/aging.log
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.jira.url.as_deref(), Some("https://jira.example.com"));
    assert_eq!(config.jira.auth_type, AuthType::Bearer);
    assert!(config.jira.insecure_tls);
    assert_eq!(config.board, Some(42));
    assert_eq!(config.report.statuses, vec!["In Review", "In Progress"]);
    // Partially specified sections keep their other defaults
    assert_eq!(config.report.ignore_statuses.len(), 3);
    assert_eq!(config.report.timezone().unwrap(), Some(chrono_tz::America::Chicago));
    assert_eq!(config.cache.backend, CacheBackend::Sqlite);
    assert_eq!(config.cache.dir().unwrap(), PathBuf::from("/tmp/aging"));
    assert_eq!(config.cache.stale_time(), chrono::Duration::minutes(15));
    assert_eq!(config.log_file, Some(PathBuf::from("/tmp/aging.log")));
  }

  #[test]
  fn test_unknown_timezone_is_error() {
    let config = Config::from_yaml("report:\n  timezone: Mars/Olympus_Mons\n").unwrap();
    assert!(config.report.timezone().is_err());
  }

  #[test]
  fn test_invalid_backend_is_error() {
    assert!(Config::from_yaml("cache:\n  backend: redis\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/nonexistent/jira-aging.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "board: 7\n").unwrap();

    assert_eq!(Config::load(Some(&path)).unwrap().board, Some(7));
  }

  #[test]
  fn test_env_setting_wins() {
    assert_eq!(
      resolve_setting(Some("https://env".into()), Some("https://file")),
      Some("https://env".to_string())
    );
    assert_eq!(
      resolve_setting(Some(String::new()), Some("https://file")),
      Some("https://file".to_string())
    );
    assert_eq!(resolve_setting(None, None), None);
  }
}
