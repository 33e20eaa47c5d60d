//! Cached Jira client that wraps JiraClient with transparent caching.

use color_eyre::Result;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::cache::{CacheLayer, CacheSource, Storage};
use crate::config::Config;

use super::api_types::{ApiBoardIssuesPage, ApiIssue};
use super::cache::JiraQueryKey;
use super::client::JiraClient;

/// Jira client with transparent caching support.
///
/// Every page is cached on its own, so a partially cached board only
/// refetches the pages that went stale.
#[derive(Clone)]
pub struct CachedJiraClient {
  inner: JiraClient,
  cache: CacheLayer<Storage>,
}

impl CachedJiraClient {
  /// Create a new cached Jira client.
  ///
  /// `refresh` ignores fresh cache entries and always asks the server first.
  pub fn new(config: &Config, refresh: bool) -> Result<Self> {
    let inner = JiraClient::new(config)?;
    let storage = Storage::open(&config.cache)?;
    let cache = CacheLayer::new(storage)
      .with_stale_time(config.cache.stale_time())
      .with_refresh(refresh);

    Ok(Self { inner, cache })
  }

  /// Drop every cached page.
  pub fn clear_cache(&self) -> Result<()> {
    self.cache.clear()
  }

  /// Get all issues of a board, changelogs included.
  pub async fn get_board_issues(&self, board_id: u64) -> Result<Vec<ApiIssue>> {
    let issues = collect_pages(|start_at| self.get_board_issues_page(board_id, start_at)).await?;
    info!(board_id, issues = issues.len(), "fetched board issues");
    Ok(issues)
  }

  async fn get_board_issues_page(
    &self,
    board_id: u64,
    start_at: u64,
  ) -> Result<ApiBoardIssuesPage> {
    let query_key = JiraQueryKey::BoardIssuesPage {
      server: self.inner.base_url().clone(),
      board_id,
      start_at,
    };

    let result = self
      .cache
      .fetch(&query_key, || self.inner.get_board_issues_page(board_id, start_at))
      .await?;

    match result.source {
      CacheSource::Offline => warn!(
        board_id,
        start_at,
        cached_at = ?result.cached_at,
        "serving cached page, Jira unreachable"
      ),
      source => debug!(board_id, start_at, ?source, "loaded page"),
    }

    Ok(result.data)
  }
}

/// Walk `startAt`-paginated pages until `total` issues have been seen.
///
/// Stops early on an empty page or one that does not move `startAt` forward.
pub async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<ApiIssue>>
where
  F: FnMut(u64) -> Fut,
  Fut: Future<Output = Result<ApiBoardIssuesPage>>,
{
  let mut issues: Vec<ApiIssue> = Vec::new();
  let mut start_at = 0u64;
  let mut total = 1u64;

  while start_at < total {
    let page = fetch_page(start_at).await?;
    total = page.total;

    let count = page.issues.len() as u64;
    let next = page.start_at.saturating_add(count);
    if count == 0 || next <= start_at {
      if start_at < total {
        warn!(start_at, total, "pagination stalled, stopping early");
      }
      break;
    }

    if issues.is_empty() {
      issues.reserve(usize::try_from(total).unwrap_or(0));
    }
    issues.extend(page.issues);
    start_at = next;
  }

  Ok(issues)
}
