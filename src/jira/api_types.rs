//! Serde-deserializable types matching the Jira agile API responses.
//!
//! Pages are cached as-is, so every type here also serializes back into the
//! same shape it was read from.

use chrono::{DateTime, FixedOffset};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Timestamp layout Jira uses in changelogs, e.g. `2017-12-15T11:02:01.443-0500`.
const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

// ============================================================================
// Timestamps
// ============================================================================

/// A Jira timestamp, carrying the offset it was reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JiraTimestamp(pub DateTime<FixedOffset>);

impl JiraTimestamp {
  /// Parse Jira's changelog format, falling back to RFC 3339.
  pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
    DateTime::parse_from_str(s, JIRA_TIMESTAMP_FORMAT)
      .or_else(|_| DateTime::parse_from_rfc3339(s))
      .map(Self)
  }
}

impl fmt::Display for JiraTimestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format(JIRA_TIMESTAMP_FORMAT))
  }
}

impl Serialize for JiraTimestamp {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for JiraTimestamp {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Self::parse(&s).map_err(|e| de::Error::custom(format!("invalid timestamp {:?}: {}", s, e)))
  }
}

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiUser {
  #[serde(default)]
  pub name: String,
  #[serde(rename = "emailAddress", default)]
  pub email_address: String,
  #[serde(rename = "displayName", default)]
  pub display_name: String,
  #[serde(rename = "timeZone", default)]
  pub time_zone: String,
}

// ============================================================================
// Changelog
// ============================================================================

/// A single field change inside a history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHistoryItem {
  pub field: String,
  pub from: Option<String>,
  #[serde(rename = "fromString")]
  pub from_string: Option<String>,
  pub to: Option<String>,
  #[serde(rename = "toString")]
  pub to_string: Option<String>,
}

/// One changelog entry: who changed what, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHistory {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub author: ApiUser,
  pub created: JiraTimestamp,
  #[serde(default)]
  pub items: Vec<ApiHistoryItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiChangelog {
  #[serde(rename = "startAt", default)]
  pub start_at: u64,
  #[serde(rename = "maxResults", default)]
  pub max_results: u64,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub histories: Vec<ApiHistory>,
}

// ============================================================================
// Board issues endpoint response
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIssue {
  #[serde(default)]
  pub id: String,
  pub key: String,
  #[serde(default)]
  pub changelog: ApiChangelog,
}

/// One page of `GET /rest/agile/1.0/board/{id}/issue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiBoardIssuesPage {
  #[serde(rename = "startAt", default)]
  pub start_at: u64,
  #[serde(rename = "maxResults", default)]
  pub max_results: u64,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub issues: Vec<ApiIssue>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

use super::types::StatusChange;

/// Changelog field name for workflow transitions.
const STATUS_FIELD: &str = "status";

impl ApiUser {
  /// Display name, falling back to the login name.
  pub fn label(&self) -> Option<String> {
    [&self.display_name, &self.name]
      .into_iter()
      .find(|s| !s.is_empty())
      .cloned()
  }
}

impl ApiIssue {
  /// Latest status transition recorded in the changelog.
  ///
  /// Histories are walked in the order Jira returns them (oldest first), so
  /// the last status item seen wins.
  pub fn latest_status_change(&self) -> Option<StatusChange> {
    let mut latest = None;

    for history in &self.changelog.histories {
      for item in history.items.iter().filter(|i| i.field == STATUS_FIELD) {
        latest = Some(StatusChange {
          status: item.to_string.clone().unwrap_or_default(),
          at: history.created.0,
          author: history.author.label(),
        });
      }
    }

    latest
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Timelike;

  fn history(created: &str, items: &[(&str, &str)]) -> ApiHistory {
    ApiHistory {
      id: String::new(),
      author: ApiUser {
        name: "jdoe".into(),
        ..Default::default()
      },
      created: JiraTimestamp::parse(created).unwrap(),
      items: items
        .iter()
        .map(|(field, to)| ApiHistoryItem {
          field: field.to_string(),
          from: None,
          from_string: None,
          to: None,
          to_string: Some(to.to_string()),
        })
        .collect(),
    }
  }

  fn issue(histories: Vec<ApiHistory>) -> ApiIssue {
    ApiIssue {
      id: "1".into(),
      key: "ABC-1".into(),
      changelog: ApiChangelog {
        histories,
        ..Default::default()
      },
    }
  }

  #[test]
  fn test_latest_status_change_wins() {
    let issue = issue(vec![
      history("2018-11-01T09:00:00.000-0500", &[("status", "In Progress")]),
      history("2018-11-02T09:00:00.000-0500", &[("assignee", "someone")]),
      history(
        "2018-11-05T14:10:25.073-0500",
        &[("status", "In Testing"), ("resolution", "Done")],
      ),
    ]);

    let change = issue.latest_status_change().unwrap();
    assert_eq!(change.status, "In Testing");
    assert_eq!(change.at, JiraTimestamp::parse("2018-11-05T14:10:25.073-0500").unwrap().0);
    assert_eq!(change.author.as_deref(), Some("jdoe"));
  }

  #[test]
  fn test_no_status_change() {
    let issue = issue(vec![history(
      "2018-11-02T09:00:00.000-0500",
      &[("assignee", "someone")],
    )]);
    assert_eq!(issue.latest_status_change(), None);
  }

  #[test]
  fn test_user_label_prefers_display_name() {
    let user = ApiUser {
      name: "jdoe".into(),
      display_name: "Jane Doe".into(),
      ..Default::default()
    };
    assert_eq!(user.label().as_deref(), Some("Jane Doe"));
    assert_eq!(ApiUser::default().label(), None);
  }

  const PAGE: &str = r#"{
    "expand": "schema,names",
    "startAt": 0,
    "maxResults": 50,
    "total": 2,
    "issues": [
      {
        "id": "10001",
        "key": "ABC-1",
        "changelog": {
          "startAt": 0,
          "maxResults": 1,
          "total": 1,
          "histories": [
            {
              "id": "5001",
              "author": { "name": "jdoe", "displayName": "Jane Doe", "timeZone": "America/Chicago" },
              "created": "2017-12-15T11:02:01.443-0500",
              "items": [
                { "field": "status", "fieldtype": "jira", "from": "1", "fromString": "Open", "to": "3", "toString": "In Progress" }
              ]
            }
          ]
        }
      },
      { "id": "10002", "key": "ABC-2" }
    ]
  }"#;

  #[test]
  fn test_parse_jira_timestamp_without_colon() {
    let ts = JiraTimestamp::parse("2017-12-15T11:02:01.443-0500").unwrap();
    assert_eq!(ts.0.offset().local_minus_utc(), -5 * 3600);
    assert_eq!(ts.0.hour(), 11);
    assert_eq!(ts.0.nanosecond(), 443_000_000);
  }

  #[test]
  fn test_parse_rfc3339_timestamp() {
    let ts = JiraTimestamp::parse("2018-11-06T15:39:07.272826-06:00").unwrap();
    assert_eq!(ts.0.offset().local_minus_utc(), -6 * 3600);
    assert_eq!(ts.0.nanosecond(), 272_826_000);
  }

  #[test]
  fn test_parse_invalid_timestamp() {
    assert!(JiraTimestamp::parse("yesterday").is_err());
  }

  #[test]
  fn test_deserialize_page() {
    let page: ApiBoardIssuesPage = serde_json::from_str(PAGE).unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.issues.len(), 2);

    let history = &page.issues[0].changelog.histories[0];
    assert_eq!(history.author.display_name, "Jane Doe");
    assert_eq!(history.items[0].to_string.as_deref(), Some("In Progress"));

    // Issues without an expanded changelog still decode
    assert!(page.issues[1].changelog.histories.is_empty());
  }

  #[test]
  fn test_cached_page_keeps_timestamps() {
    let page: ApiBoardIssuesPage = serde_json::from_str(PAGE).unwrap();
    let cached = serde_json::to_string(&page).unwrap();
    let restored: ApiBoardIssuesPage = serde_json::from_str(&cached).unwrap();

    assert_eq!(
      restored.issues[0].changelog.histories[0].created,
      page.issues[0].changelog.histories[0].created
    );
  }
}
