use chrono::{DateTime, FixedOffset};

/// The most recent workflow transition of an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
  /// Status the issue moved into
  pub status: String,
  /// When it moved, in the offset Jira reported
  pub at: DateTime<FixedOffset>,
  /// Who moved it (display name, falling back to user name)
  pub author: Option<String>,
}
