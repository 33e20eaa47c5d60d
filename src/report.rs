//! Rendering of aging reports.

use color_eyre::{eyre::eyre, Result};
use std::fmt::Write;

use crate::aging::AgingReport;

/// Timestamp layout used in the text report.
const SINCE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %:z";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
  /// One bracketed block per status
  #[default]
  Text,
  /// JSON array of status groups
  Json,
}

/// Render `report` in the requested format.
pub fn render(report: &AgingReport, format: OutputFormat, show_author: bool) -> Result<String> {
  match format {
    OutputFormat::Text => Ok(render_text(report, show_author)),
    OutputFormat::Json => render_json(report),
  }
}

/// ```text
/// In Progress: [
///   ABC-1 (3 days old since 2018-11-05 14:10:25.073 -05:00)
/// ]
/// ```
pub fn render_text(report: &AgingReport, show_author: bool) -> String {
  let mut out = String::new();

  for group in &report.groups {
    let _ = writeln!(out, "{}: [", group.status);
    for issue in &group.issues {
      let _ = write!(
        out,
        "  {} ({} days old since {})",
        issue.key,
        issue.business_days,
        issue.since.format(SINCE_FORMAT)
      );
      if show_author {
        if let Some(author) = &issue.author {
          let _ = write!(out, " by {}", author);
        }
      }
      out.push('\n');
    }
    out.push_str("]\n");
  }

  out
}

pub fn render_json(report: &AgingReport) -> Result<String> {
  serde_json::to_string_pretty(report).map_err(|e| eyre!("Failed to serialize report: {}", e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::aging::{AgingIssue, StatusGroup};
  use chrono::DateTime;

  fn report() -> AgingReport {
    AgingReport {
      groups: vec![
        StatusGroup {
          status: "In Progress".into(),
          issues: vec![AgingIssue {
            key: "ABC-1".into(),
            status: "In Progress".into(),
            since: DateTime::parse_from_rfc3339("2018-11-05T14:10:25.073-05:00").unwrap(),
            author: Some("Jane Doe".into()),
            business_days: 3,
          }],
        },
        StatusGroup {
          status: "In Testing".into(),
          issues: vec![],
        },
      ],
    }
  }

  #[test]
  fn test_render_text() {
    assert_eq!(
      render_text(&report(), false),
      "In Progress: [\n  ABC-1 (3 days old since 2018-11-05 14:10:25.073 -05:00)\n]\nIn Testing: [\n]\n"
    );
  }

  #[test]
  fn test_render_text_with_author() {
    assert!(render_text(&report(), true).contains("-05:00) by Jane Doe\n"));
  }

  #[test]
  fn test_render_json() {
    let json = render(&report(), OutputFormat::Json, false).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value[0]["status"], "In Progress");
    assert_eq!(value[0]["issues"][0]["key"], "ABC-1");
    assert_eq!(value[0]["issues"][0]["business_days"], 3);
    assert_eq!(value[0]["issues"][0]["since"], "2018-11-05T14:10:25.073-05:00");
    assert_eq!(value[1]["issues"].as_array().unwrap().len(), 0);
  }
}
