//! Group in-flight issues by status and age them in business days.

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::calendar;
use crate::config::ReportConfig;
use crate::jira::api_types::ApiIssue;

/// An issue sitting in a status, and for how long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgingIssue {
  pub key: String,
  pub status: String,
  /// When the issue entered its current status
  pub since: DateTime<FixedOffset>,
  /// Who moved it there
  pub author: Option<String>,
  pub business_days: u32,
}

/// Issues sharing a status, youngest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusGroup {
  pub status: String,
  pub issues: Vec<AgingIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AgingReport {
  pub groups: Vec<StatusGroup>,
}

impl AgingReport {
  /// Build the report as of `now`.
  ///
  /// Issues that never changed status, or whose status is ignored, are left
  /// out. Groups follow the configured status order; other statuses are only
  /// listed when `include_unlisted` is set.
  pub fn build<Tz: TimeZone>(
    issues: &[ApiIssue],
    now: &DateTime<Tz>,
    config: &ReportConfig,
  ) -> Self {
    let today = calendar::normalize(now);
    let mut by_status: BTreeMap<String, Vec<AgingIssue>> = BTreeMap::new();

    for issue in issues {
      let Some(change) = issue.latest_status_change() else {
        debug!(key = %issue.key, "no status history, skipping");
        continue;
      };

      if change.status.is_empty() || config.ignore_statuses.contains(&change.status) {
        continue;
      }

      let business_days = calendar::normalize(&change.at).business_days_until(&today);

      by_status
        .entry(change.status.clone())
        .or_default()
        .push(AgingIssue {
          key: issue.key.clone(),
          status: change.status,
          since: change.at,
          author: change.author,
          business_days,
        });
    }

    let mut groups = Vec::new();
    for status in &config.statuses {
      let issues = by_status.remove(status).unwrap_or_default();
      groups.push(StatusGroup::new(status.clone(), issues));
    }

    if config.include_unlisted {
      // BTreeMap keeps the remainder alphabetical
      for (status, issues) in by_status {
        groups.push(StatusGroup::new(status, issues));
      }
    }

    Self { groups }
  }

  pub fn issue_count(&self) -> usize {
    self.groups.iter().map(|g| g.issues.len()).sum()
  }
}

impl StatusGroup {
  fn new(status: String, mut issues: Vec<AgingIssue>) -> Self {
    issues.sort_by_key(|i| i.business_days);
    Self { status, issues }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::api_types::{ApiChangelog, ApiHistory, ApiHistoryItem, ApiUser, JiraTimestamp};
  use chrono_tz::America::Chicago;

  fn issue(key: &str, transitions: &[(&str, &str)]) -> ApiIssue {
    ApiIssue {
      id: key.into(),
      key: key.into(),
      changelog: ApiChangelog {
        histories: transitions
          .iter()
          .map(|(created, status)| ApiHistory {
            id: String::new(),
            author: ApiUser {
              display_name: "Jane Doe".into(),
              ..Default::default()
            },
            created: JiraTimestamp::parse(created).unwrap(),
            items: vec![ApiHistoryItem {
              field: "status".into(),
              from: None,
              from_string: None,
              to: None,
              to_string: Some(status.to_string()),
            }],
          })
          .collect(),
        ..Default::default()
      },
    }
  }

  fn friday_nov_16() -> DateTime<chrono_tz::Tz> {
    Chicago.with_ymd_and_hms(2018, 11, 16, 9, 30, 0).unwrap()
  }

  #[test]
  fn test_groups_in_configured_order() {
    let issues = vec![
      issue("ABC-1", &[("2018-11-09T10:00:00.000-0600", "In Testing")]),
      issue("ABC-2", &[("2018-11-14T10:00:00.000-0600", "In Progress")]),
      issue("ABC-3", &[("2018-11-02T10:00:00.000-0500", "In Progress")]),
    ];

    let report = AgingReport::build(&issues, &friday_nov_16(), &ReportConfig::default());

    let statuses: Vec<_> = report.groups.iter().map(|g| g.status.as_str()).collect();
    assert_eq!(
      statuses,
      vec!["In Progress", "In Progress - 1", "In Progress - 2", "In Testing"]
    );

    let in_progress = &report.groups[0].issues;
    assert_eq!(in_progress[0].key, "ABC-2");
    assert_eq!(in_progress[0].business_days, 2);
    assert_eq!(in_progress[1].key, "ABC-3");
    assert_eq!(in_progress[1].business_days, 10);

    assert!(report.groups[1].issues.is_empty());
    assert_eq!(report.groups[3].issues[0].business_days, 5);
    assert_eq!(report.issue_count(), 3);
  }

  #[test]
  fn test_ignored_and_unchanged_issues_are_skipped() {
    let issues = vec![
      issue("ABC-1", &[("2018-11-09T10:00:00.000-0600", "Closed")]),
      issue(
        "ABC-2",
        &[
          ("2018-11-01T10:00:00.000-0500", "In Progress"),
          ("2018-11-05T10:00:00.000-0600", "Reopened"),
        ],
      ),
      issue("ABC-3", &[]),
    ];

    let report = AgingReport::build(&issues, &friday_nov_16(), &ReportConfig::default());
    assert_eq!(report.issue_count(), 0);
  }

  #[test]
  fn test_unlisted_statuses() {
    let issues = vec![
      issue("ABC-1", &[("2018-11-15T10:00:00.000-0600", "Review")]),
      issue("ABC-2", &[("2018-11-15T10:00:00.000-0600", "Blocked")]),
    ];

    let hidden = AgingReport::build(&issues, &friday_nov_16(), &ReportConfig::default());
    assert_eq!(hidden.issue_count(), 0);

    let config = ReportConfig {
      statuses: vec![],
      include_unlisted: true,
      ..Default::default()
    };
    let shown = AgingReport::build(&issues, &friday_nov_16(), &config);
    let statuses: Vec<_> = shown.groups.iter().map(|g| g.status.as_str()).collect();
    assert_eq!(statuses, vec!["Blocked", "Review"]);
    assert_eq!(shown.groups[0].issues[0].business_days, 1);
  }

  #[test]
  fn test_status_changed_today_is_zero_days() {
    let issues = vec![issue("ABC-1", &[("2018-11-16T08:00:00.000-0600", "In Progress")])];
    let report = AgingReport::build(&issues, &friday_nov_16(), &ReportConfig::default());

    let aged = &report.groups[0].issues[0];
    assert_eq!(aged.business_days, 0);
    assert_eq!(aged.author.as_deref(), Some("Jane Doe"));
  }
}
