//! Caching implementations for Jira types.

use sha2::{Digest, Sha256};
use url::Url;

use crate::cache::{Cacheable, QueryKey};

use super::api_types::ApiBoardIssuesPage;

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for ApiBoardIssuesPage {
  fn entity_type() -> &'static str {
    "board_issues_page"
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for Jira API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JiraQueryKey {
  /// One page of a board's issues, with changelogs expanded
  BoardIssuesPage {
    server: Url,
    board_id: u64,
    start_at: u64,
  },
}

impl QueryKey for JiraQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::BoardIssuesPage {
        server,
        board_id,
        start_at,
      } => format!(
        "board_issues_page:{}:{}:{}",
        server_label(server),
        board_id,
        start_at
      ),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn description(&self) -> String {
    match self {
      Self::BoardIssuesPage {
        server,
        board_id,
        start_at,
      } => format!(
        "board {} issues from {} on {}",
        board_id,
        start_at,
        server_label(server)
      ),
    }
  }

  fn file_stem(&self) -> String {
    match self {
      Self::BoardIssuesPage {
        server,
        board_id,
        start_at,
      } => format!("{}.board.{}.issue.{}", server_label(server), board_id, start_at),
    }
  }
}

/// Filesystem-safe name for a Jira server, e.g. `example.com_8443_jira`.
///
/// A trailing slash on the base URL does not change the name.
fn server_label(server: &Url) -> String {
  let mut parts = vec![server.host_str().unwrap_or("jira").to_string()];
  if let Some(port) = server.port() {
    parts.push(port.to_string());
  }
  parts.extend(
    server
      .path_segments()
      .into_iter()
      .flatten()
      .filter(|segment| !segment.is_empty())
      .map(String::from),
  );
  parts.join("_")
}
