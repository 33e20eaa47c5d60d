use crate::config::{AuthType, Config};
use crate::jira::api_types::ApiBoardIssuesPage;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// How requests authenticate against Jira.
#[derive(Clone)]
pub enum Credentials {
  Basic { username: String, password: String },
  Bearer(String),
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Basic { username, .. } => f
        .debug_struct("Basic")
        .field("username", username)
        .finish_non_exhaustive(),
      Self::Bearer(_) => f.write_str("Bearer"),
    }
  }
}

impl Credentials {
  /// Pick credentials from the auth type and whatever secrets are available.
  pub fn resolve(
    auth_type: AuthType,
    url: &str,
    username: Option<String>,
    password: Option<String>,
    api_token: Option<String>,
  ) -> Result<Self> {
    let basic = |secret: String| -> Result<Self> {
      let username = username
        .clone()
        .ok_or_else(|| eyre!("Jira username not found. Set JIRA_USERNAME or jira.username."))?;
      Ok(Self::Basic {
        username,
        password: secret,
      })
    };

    match auth_type {
      AuthType::Basic => match password.or(api_token) {
        Some(secret) => basic(secret),
        None => Err(eyre!(
          "Jira password not found. Set JIRA_PASSWORD or JIRA_API_TOKEN environment variable."
        )),
      },
      AuthType::Bearer => api_token
        .map(Self::Bearer)
        .ok_or_else(|| eyre!("Jira API token not found. Set JIRA_API_TOKEN environment variable.")),
      AuthType::Auto => match (password, api_token) {
        (Some(password), _) => basic(password),
        // Jira Cloud takes the API token as a Basic auth password
        (None, Some(token)) if url.contains(".atlassian.net") => basic(token),
        (None, Some(token)) => Ok(Self::Bearer(token)),
        (None, None) => Err(eyre!(
          "Jira credentials not found. Set JIRA_USERNAME and JIRA_PASSWORD, or JIRA_API_TOKEN."
        )),
      },
    }
  }
}

/// Jira REST client
#[derive(Clone)]
pub struct JiraClient {
  http: reqwest::Client,
  base_url: Url,
  /// Resolution error kept until a request needs credentials, so pages
  /// served from cache work without any configured.
  credentials: std::result::Result<Credentials, String>,
}

impl JiraClient {
  pub fn new(config: &Config) -> Result<Self> {
    let credentials = Credentials::resolve(
      config.jira.auth_type,
      &config.jira_url(),
      config.username(),
      Config::get_password(),
      Config::get_api_token(),
    );
    Self::with_credentials(config, credentials)
  }

  fn with_credentials(config: &Config, credentials: Result<Credentials>) -> Result<Self> {
    let url = config.jira_url();
    let base_url = Url::parse(&url).map_err(|e| eyre!("Invalid Jira URL '{}': {}", url, e))?;
    let credentials = credentials.map_err(|e| e.to_string());

    let http = reqwest::Client::builder()
      .danger_accept_invalid_certs(config.jira.insecure_tls)
      .timeout(Duration::from_secs(config.jira.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    debug!(url = %base_url, credentials = ?credentials.as_ref().ok(), "created Jira client");

    Ok(Self {
      http,
      base_url,
      credentials,
    })
  }

  /// Jira server every request goes to.
  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Get one page of a board's issues with their changelogs.
  pub async fn get_board_issues_page(
    &self,
    board_id: u64,
    start_at: u64,
  ) -> Result<ApiBoardIssuesPage> {
    let credentials = self.credentials.as_ref().map_err(|e| eyre!("{}", e))?;
    let url = board_issues_url(&self.base_url, board_id, start_at)?;
    debug!(%url, "fetching board issues");

    let request = match credentials {
      Credentials::Basic { username, password } => {
        self.http.get(url).basic_auth(username, Some(password))
      }
      Credentials::Bearer(token) => self.http.get(url).bearer_auth(token),
    };

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Failed to get board issues: {}", e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("HTTP response {}", status));
    }

    response
      .json::<ApiBoardIssuesPage>()
      .await
      .map_err(|e| eyre!("Failed to parse board issues: {}", e))
  }
}

/// `{base}/rest/agile/1.0/board/{id}/issue?fields=changelog&expand=changelog&startAt={n}`
pub fn board_issues_url(base: &Url, board_id: u64, start_at: u64) -> Result<Url> {
  let mut base = base.clone();
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }

  let mut url = base
    .join(&format!("rest/agile/1.0/board/{}/issue", board_id))
    .map_err(|e| eyre!("Failed to build board issues URL: {}", e))?;

  url
    .query_pairs_mut()
    .append_pair("fields", "changelog")
    .append_pair("expand", "changelog")
    .append_pair("startAt", &start_at.to_string());

  Ok(url)
}
