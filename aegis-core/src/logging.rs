use std::fs;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "aegis-server.log";
const FALLBACK_LEVEL: &str = "info";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Daily-rolling file under `log_dir` plus a compact stderr stream.
/// Old server logs past `retention_days` are pruned first.
pub fn init_server_logging(log_dir: &Path, cfg: &LoggingConfig) -> anyhow::Result<()> {
  fs::create_dir_all(log_dir)?;
  let pruned = prune_server_logs(log_dir, cfg.retention_days, SystemTime::now());

  let (filter, rejected_level) = match EnvFilter::try_new(&cfg.level) {
    Ok(f) => (f, None),
    Err(e) => (EnvFilter::new(FALLBACK_LEVEL), Some(e)),
  };

  let (file_writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));
  let _ = FILE_GUARD.set(guard);

  tracing_subscriber::registry()
    .with(filter)
    .with(
      tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr),
    )
    .try_init()?;

  if let Some(e) = rejected_level {
    tracing::warn!(level = %cfg.level, error = %e, "invalid logging.level; using {FALLBACK_LEVEL}");
  }
  if pruned > 0 {
    tracing::info!(pruned, retention_days = cfg.retention_days, "removed expired log files");
  }
  Ok(())
}

/// Removes server log files last modified before `now - retention_days`.
/// Zero retention keeps everything. Returns how many files were removed.
fn prune_server_logs(log_dir: &Path, retention_days: u64, now: SystemTime) -> usize {
  if retention_days == 0 {
    return 0;
  }
  let cutoff = now
    .checked_sub(Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)))
    .unwrap_or(SystemTime::UNIX_EPOCH);

  let Ok(entries) = fs::read_dir(log_dir) else {
    return 0;
  };
  entries
    .flatten()
    .filter(|entry| is_server_log(&entry.path()))
    .filter(|entry| {
      entry
        .metadata()
        .and_then(|m| m.modified())
        .is_ok_and(|modified| modified < cutoff)
    })
    .filter(|entry| fs::remove_file(entry.path()).is_ok())
    .count()
}

fn is_server_log(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .and_then(|n| n.strip_prefix(LOG_FILE_PREFIX))
    .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_server_logs_are_recognised() {
    assert!(is_server_log(Path::new("/var/log/aegis-server.log")));
    assert!(is_server_log(Path::new("aegis-server.log.2026-01-02")));
    assert!(!is_server_log(Path::new("other.log")));
    assert!(!is_server_log(Path::new("aegis-server.logger")));
  }

  #[test]
  fn retention_zero_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("aegis-server.log.2000-01-01");
    fs::write(&file, "old").unwrap();
    let far_future = SystemTime::now() + Duration::from_secs(365 * 24 * 60 * 60);
    assert_eq!(prune_server_logs(dir.path(), 0, far_future), 0);
    assert!(file.exists());
  }

  #[test]
  fn expired_server_logs_are_pruned() {
    let dir = tempfile::tempdir().unwrap();
    let server_log = dir.path().join("aegis-server.log.2026-01-01");
    let unrelated = dir.path().join("notes.txt");
    fs::write(&server_log, "old").unwrap();
    fs::write(&unrelated, "keep").unwrap();

    let later = SystemTime::now() + Duration::from_secs(30 * 24 * 60 * 60);
    assert_eq!(prune_server_logs(dir.path(), 14, later), 1);
    assert!(!server_log.exists());
    assert!(unrelated.exists());
  }

  #[test]
  fn fresh_logs_survive_pruning() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("aegis-server.log.2026-10-17");
    fs::write(&file, "fresh").unwrap();
    assert_eq!(prune_server_logs(dir.path(), 14, SystemTime::now()), 0);
    assert!(file.exists());
  }
}
