mod aging;
mod cache;
mod calendar;
mod config;
mod jira;
mod logging;
mod report;

use chrono::{Local, Utc};
use clap::{ArgAction, Parser};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

use crate::aging::AgingReport;
use crate::config::{CacheBackend, CacheConfig, Config};
use crate::jira::cached_client::CachedJiraClient;
use crate::report::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "jira-aging")]
#[command(about = "Report how many business days in-flight Jira issues have sat in their status")]
#[command(version)]
struct Args {
  /// Agile board id (non-numeric values fall back to the configured board)
  board: Option<String>,

  /// Path to config file (default: $XDG_CONFIG_HOME/jira-aging/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Output format
  #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  /// Ignore fresh cache entries and refetch every page
  #[arg(long)]
  refresh: bool,

  /// Disable the response cache
  #[arg(long, conflicts_with = "refresh")]
  no_cache: bool,

  /// Delete cached pages before fetching
  #[arg(long)]
  clear_cache: bool,

  /// Show who moved each issue into its status
  #[arg(long)]
  show_author: bool,

  /// Increase log verbosity (-v, -vv, -vvv)
  #[arg(short, long, action = ArgAction::Count)]
  verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override cache backend if disabled on command line
  let config = if args.no_cache {
    Config {
      cache: CacheConfig {
        backend: CacheBackend::None,
        ..config.cache
      },
      ..config
    }
  } else {
    config
  };

  let _log_guard = logging::init(args.verbose, config.log_file.as_deref())?;

  let board_id = resolve_board(args.board.as_deref(), config.board);
  info!(board_id, "building aging report");

  let client = CachedJiraClient::new(&config, args.refresh)?;
  if args.clear_cache {
    client.clear_cache()?;
  }
  let issues = client.get_board_issues(board_id).await?;

  let report = match config.report.timezone()? {
    Some(tz) => AgingReport::build(&issues, &Utc::now().with_timezone(&tz), &config.report),
    None => AgingReport::build(&issues, &Local::now(), &config.report),
  };
  info!(issues = report.issue_count(), "report ready");

  print!("{}", report::render(&report, args.format, args.show_author)?);

  Ok(())
}

/// Board from the command line if it parses, else the configured or built-in default.
fn resolve_board(arg: Option<&str>, configured: Option<u64>) -> u64 {
  arg
    .and_then(|s| s.trim().parse().ok())
    .or(configured)
    .unwrap_or(config::DEFAULT_BOARD_ID)
}
