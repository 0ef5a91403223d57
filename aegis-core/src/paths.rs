use std::path::{Path, PathBuf};

pub fn base_dir() -> anyhow::Result<PathBuf> {
  if let Ok(home) = std::env::var("AEGIS_HOME") {
    if !home.trim().is_empty() {
      return Ok(PathBuf::from(home));
    }
  }
  Ok(std::env::current_dir()?.join("aegis-data"))
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}

pub fn index_path(client_dir: &Path) -> PathBuf {
  client_dir.join("index.html")
}

/// Returns the `--config <path>` override when one was passed.
pub fn config_override(args: &[String]) -> Option<PathBuf> {
  let i = args.iter().position(|a| a == "--config")?;
  args.get(i + 1).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn config_override_reads_following_argument() {
    let args: Vec<String> = ["aegis-server", "--config", "/etc/aegis.toml"]
      .iter()
      .map(|s| s.to_string())
      .collect();
    assert_eq!(config_override(&args), Some(PathBuf::from("/etc/aegis.toml")));
  }

  #[test]
  fn config_override_without_value_is_ignored() {
    let args = vec!["aegis-server".to_string(), "--config".to_string()];
    assert_eq!(config_override(&args), None);
  }
}
