use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedFile {
  pub path: PathBuf,
  pub sha256: String,
}

#[derive(Debug, Default)]
pub struct SweepReport {
  /// One entry per distinct digest, in walk order.
  pub files: Vec<HashedFile>,
  pub scanned: u64,
  pub duplicates: u64,
  pub unreadable: u64,
}

/// Streams the file through SHA-256 and returns the lower-case hex digest.
pub fn sha256_hex(path: &Path) -> anyhow::Result<String> {
  let mut file = fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buf = [0u8; 64 * 1024];
  loop {
    let n = file.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(format!("{:x}", hasher.finalize()))
}

/// Hashes `root` (a file or a directory tree), skipping paths under any of
/// the `excludes` prefixes. Prefixes match case-insensitively.
pub fn sweep(root: &Path, excludes: &[String]) -> anyhow::Result<SweepReport> {
  if !root.exists() {
    anyhow::bail!("path does not exist: {}", root.display());
  }

  let excludes: Vec<String> = excludes
    .iter()
    .map(|s| s.trim().to_ascii_lowercase())
    .filter(|s| !s.is_empty())
    .collect();

  let mut report = SweepReport::default();
  let mut seen_hashes: HashSet<String> = HashSet::new();

  let walker = WalkDir::new(root)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| !is_excluded(&excludes, e.path()));

  for entry in walker {
    let entry = match entry {
      Ok(entry) => entry,
      Err(e) => {
        tracing::debug!(path = ?e.path(), error = %e, "cannot walk entry");
        report.unreadable += 1;
        continue;
      }
    };
    if !entry.file_type().is_file() {
      continue;
    }

    report.scanned += 1;
    if report.scanned % 250 == 0 {
      tracing::info!(scanned = report.scanned, current = %safe_filename(entry.path()), "hashing");
    }

    let sha256 = match sha256_hex(entry.path()) {
      Ok(h) => h,
      Err(e) => {
        tracing::debug!(path = %entry.path().display(), error = %e, "cannot hash file");
        report.unreadable += 1;
        continue;
      }
    };
    if !seen_hashes.insert(sha256.clone()) {
      report.duplicates += 1;
      continue;
    }
    report.files.push(HashedFile {
      path: entry.into_path(),
      sha256,
    });
  }

  Ok(report)
}

fn is_excluded(excludes: &[String], path: &Path) -> bool {
  let p = path.to_string_lossy().to_ascii_lowercase();
  excludes.iter().any(|ex| p.starts_with(ex))
}

fn safe_filename(p: &Path) -> String {
  p.file_name()
    .and_then(|s| s.to_str())
    .unwrap_or("<file>")
    .to_string()
}
