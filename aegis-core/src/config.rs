use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEMO_VIRUSTOTAL_KEY: &str = "mock_vt_key";
pub const DEMO_HIBP_KEY: &str = "mock_hibp_key";

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub server: ServerConfig,
  pub logging: LoggingConfig,
  pub virustotal: VirusTotalConfig,
  pub breach: BreachConfig,
  pub ip: IpConfig,
  pub url_probe: UrlProbeConfig,
  pub whois: WhoisConfig,
}

impl Config {
  pub fn uses_demo_virustotal_key(&self) -> bool {
    self.virustotal.api_key.trim().is_empty() || self.virustotal.api_key == DEMO_VIRUSTOTAL_KEY
  }

  pub fn uses_demo_hibp_key(&self) -> bool {
    self.breach.api_key.trim().is_empty() || self.breach.api_key == DEMO_HIBP_KEY
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host: String,

  #[serde(default = "default_port")]
  pub port: u16,

  #[serde(default = "default_client_dir")]
  pub client_dir: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      client_dir: default_client_dir(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirusTotalConfig {
  #[serde(default = "default_virustotal_key")]
  pub api_key: String,

  #[serde(default = "default_virustotal_base_url")]
  pub base_url: String,

  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,
}

impl Default for VirusTotalConfig {
  fn default() -> Self {
    Self {
      api_key: default_virustotal_key(),
      base_url: default_virustotal_base_url(),
      timeout_seconds: default_timeout_seconds(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachProvider {
  XposedOrNot,
  Hibp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachConfig {
  #[serde(default = "default_breach_provider")]
  pub provider: BreachProvider,

  #[serde(default = "default_breach_base_url")]
  pub base_url: String,

  #[serde(default = "default_hibp_base_url")]
  pub hibp_base_url: String,

  #[serde(default = "default_hibp_key")]
  pub api_key: String,

  #[serde(default = "default_user_agent")]
  pub user_agent: String,

  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,
}

impl Default for BreachConfig {
  fn default() -> Self {
    Self {
      provider: default_breach_provider(),
      base_url: default_breach_base_url(),
      hibp_base_url: default_hibp_base_url(),
      api_key: default_hibp_key(),
      user_agent: default_user_agent(),
      timeout_seconds: default_timeout_seconds(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpConfig {
  #[serde(default = "default_public_ip_url")]
  pub public_ip_url: String,

  #[serde(default = "default_geo_url")]
  pub geo_url: String,

  #[serde(default = "default_true")]
  pub geo_lookup: bool,

  #[serde(default = "default_dev_fallback_ip")]
  pub dev_fallback_ip: String,

  #[serde(default = "default_short_timeout_seconds")]
  pub timeout_seconds: u64,
}

impl Default for IpConfig {
  fn default() -> Self {
    Self {
      public_ip_url: default_public_ip_url(),
      geo_url: default_geo_url(),
      geo_lookup: true,
      dev_fallback_ip: default_dev_fallback_ip(),
      timeout_seconds: default_short_timeout_seconds(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlProbeConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,

  #[serde(default = "default_short_timeout_seconds")]
  pub timeout_seconds: u64,

  #[serde(default = "default_max_redirects")]
  pub max_redirects: usize,

  #[serde(default)]
  pub allow_private_targets: bool,
}

impl Default for UrlProbeConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      timeout_seconds: default_short_timeout_seconds(),
      max_redirects: default_max_redirects(),
      allow_private_targets: false,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoisConfig {
  #[serde(default = "default_whois_root_server")]
  pub root_server: String,

  #[serde(default = "default_whois_port")]
  pub port: u16,

  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,
}

impl Default for WhoisConfig {
  fn default() -> Self {
    Self {
      root_server: default_whois_root_server(),
      port: default_whois_port(),
      timeout_seconds: default_timeout_seconds(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_host() -> String {
  "0.0.0.0".to_string()
}

fn default_port() -> u16 {
  3000
}

fn default_client_dir() -> String {
  "client".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

fn default_virustotal_key() -> String {
  DEMO_VIRUSTOTAL_KEY.to_string()
}

fn default_virustotal_base_url() -> String {
  "https://www.virustotal.com/api/v3/".to_string()
}

fn default_timeout_seconds() -> u64 {
  10
}

fn default_short_timeout_seconds() -> u64 {
  5
}

fn default_breach_provider() -> BreachProvider {
  BreachProvider::XposedOrNot
}

fn default_breach_base_url() -> String {
  "https://api.xposedornot.com/".to_string()
}

fn default_hibp_base_url() -> String {
  "https://haveibeenpwned.com/".to_string()
}

fn default_hibp_key() -> String {
  DEMO_HIBP_KEY.to_string()
}

fn default_user_agent() -> String {
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_public_ip_url() -> String {
  "https://api.ipify.org/?format=json".to_string()
}

fn default_geo_url() -> String {
  "http://ip-api.com/json/".to_string()
}

fn default_dev_fallback_ip() -> String {
  "8.8.8.8".to_string()
}

fn default_max_redirects() -> usize {
  5
}

fn default_whois_root_server() -> String {
  "whois.iana.org".to_string()
}

fn default_whois_port() -> u16 {
  43
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub server: Option<ServerConfig>,

  #[serde(default)]
  pub logging: Option<LoggingConfig>,

  #[serde(default)]
  pub virustotal: Option<VirusTotalConfig>,

  #[serde(default)]
  pub breach: Option<BreachConfig>,

  #[serde(default)]
  pub ip: Option<IpConfig>,

  #[serde(default)]
  pub url_probe: Option<UrlProbeConfig>,

  #[serde(default)]
  pub whois: Option<WhoisConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(s) = self.server {
      cfg.server = s;
    }
    if let Some(l) = self.logging {
      cfg.logging = l;
    }
    if let Some(vt) = self.virustotal {
      cfg.virustotal = vt;
    }
    if let Some(b) = self.breach {
      cfg.breach = b;
    }
    if let Some(ip) = self.ip {
      cfg.ip = ip;
    }
    if let Some(p) = self.url_probe {
      cfg.url_probe = p;
    }
    if let Some(w) = self.whois {
      cfg.whois = w;
    }

    sanitize(&mut cfg);
    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.server.is_none()
      || self.logging.is_none()
      || self.virustotal.is_none()
      || self.breach.is_none()
      || self.ip.is_none()
      || self.url_probe.is_none()
      || self.whois.is_none()
  }
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

pub fn load_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  if allow_writes {
    fs::create_dir_all(parent)?;
  }

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let cfg = file.clone().normalize();
      if allow_writes && file.needs_upgrade() {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let backup = parent.join(format!("config.toml.bak-{}", now_unix_s()));
        let _ = fs::copy(path, &backup);
        let _ = write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?);
        eprintln!(
          "AEGIS: upgraded config defaults written to {} (backup: {})",
          path.display(),
          backup.display()
        );
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let backup = parent.join(format!("config.toml.bad-{}", now_unix_s()));
        let _ = fs::rename(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "AEGIS: invalid config at {} (backed up to {}): {e}",
          path.display(),
          backup.display()
        );
      } else {
        eprintln!(
          "AEGIS: invalid config at {}; using defaults: {e}",
          path.display()
        );
      }
      Ok(cfg)
    }
  }
}

/// Applies `PORT`, `VIRUSTOTAL_API_KEY` (and its legacy alias `TotaVirus_API`),
/// `HIBP_API_KEY` and `AEGIS_LOG` on top of the file values.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F)
where
  F: Fn(&str) -> Option<String>,
{
  let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

  if let Some(port) = non_empty("PORT") {
    match port.trim().parse::<u16>() {
      Ok(p) if p > 0 => cfg.server.port = p,
      _ => eprintln!("AEGIS: ignoring invalid PORT value {port:?}"),
    }
  }

  // The legacy alias wins when both are set.
  if let Some(key) = non_empty("TotaVirus_API").or_else(|| non_empty("VIRUSTOTAL_API_KEY")) {
    cfg.virustotal.api_key = key;
  }

  if let Some(key) = non_empty("HIBP_API_KEY") {
    cfg.breach.api_key = key;
  }

  if let Some(level) = non_empty("AEGIS_LOG") {
    cfg.logging.level = level;
  }
}

pub fn apply_process_env(cfg: &mut Config) {
  apply_env_overrides(cfg, |key| std::env::var(key).ok());
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    server: Some(cfg.server.clone()),
    logging: Some(cfg.logging.clone()),
    virustotal: Some(cfg.virustotal.clone()),
    breach: Some(cfg.breach.clone()),
    ip: Some(cfg.ip.clone()),
    url_probe: Some(cfg.url_probe.clone()),
    whois: Some(cfg.whois.clone()),
  }
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

fn sanitize(cfg: &mut Config) {
  if cfg.server.port == 0 {
    eprintln!("AEGIS: server.port must be > 0; using {}", default_port());
    cfg.server.port = default_port();
  }

  if let Some(reason) = validate_upstream_url(&cfg.virustotal.base_url) {
    eprintln!("AEGIS: virustotal.base_url {reason}; using default");
    cfg.virustotal.base_url = default_virustotal_base_url();
  }
  if let Some(reason) = validate_upstream_url(&cfg.breach.base_url) {
    eprintln!("AEGIS: breach.base_url {reason}; using default");
    cfg.breach.base_url = default_breach_base_url();
  }
  if let Some(reason) = validate_upstream_url(&cfg.breach.hibp_base_url) {
    eprintln!("AEGIS: breach.hibp_base_url {reason}; using default");
    cfg.breach.hibp_base_url = default_hibp_base_url();
  }
  if let Some(reason) = validate_upstream_url(&cfg.ip.public_ip_url) {
    eprintln!("AEGIS: ip.public_ip_url {reason}; using default");
    cfg.ip.public_ip_url = default_public_ip_url();
  }
  if let Some(reason) = validate_upstream_url(&cfg.ip.geo_url) {
    eprintln!("AEGIS: ip.geo_url {reason}; using default");
    cfg.ip.geo_url = default_geo_url();
  }

  for (name, value, fallback) in [
    (
      "virustotal.timeout_seconds",
      &mut cfg.virustotal.timeout_seconds,
      default_timeout_seconds(),
    ),
    (
      "breach.timeout_seconds",
      &mut cfg.breach.timeout_seconds,
      default_timeout_seconds(),
    ),
    (
      "ip.timeout_seconds",
      &mut cfg.ip.timeout_seconds,
      default_short_timeout_seconds(),
    ),
    (
      "url_probe.timeout_seconds",
      &mut cfg.url_probe.timeout_seconds,
      default_short_timeout_seconds(),
    ),
    (
      "whois.timeout_seconds",
      &mut cfg.whois.timeout_seconds,
      default_timeout_seconds(),
    ),
  ] {
    if *value == 0 {
      eprintln!("AEGIS: {name} must be > 0; using {fallback}");
      *value = fallback;
    }
  }
}

fn validate_upstream_url(raw: &str) -> Option<String> {
  let Ok(url) = reqwest::Url::parse(raw) else {
    return Some(format!("is not a valid URL ({raw})"));
  };
  if url.scheme() != "https" && url.scheme() != "http" {
    return Some(format!("must use http or https ({raw})"));
  }
  if url.host_str().is_none() {
    return Some(format!("has no host ({raw})"));
  }
  None
}

fn now_unix_s() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn missing_file_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.server.port, 3000);
    assert!(path.exists());

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("[virustotal]"));
    assert!(raw.contains("mock_vt_key"));
  }

  #[test]
  fn readonly_load_never_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let cfg = load_readonly(&path).unwrap();
    assert!(cfg.uses_demo_virustotal_key());
    assert!(!path.exists());
  }

  #[test]
  fn partial_file_is_upgraded_with_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server]\nport = 8080\n").unwrap();

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.url_probe.max_redirects, 5);

    let backups = fs::read_dir(dir.path())
      .unwrap()
      .flatten()
      .filter(|e| e.file_name().to_string_lossy().starts_with("config.toml.bak-"))
      .count();
    assert_eq!(backups, 1);
    assert!(fs::read_to_string(&path).unwrap().contains("[whois]"));
  }

  #[test]
  fn invalid_file_is_replaced_by_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "this is = = not toml").unwrap();

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.server.port, 3000);
    let bad = fs::read_dir(dir.path())
      .unwrap()
      .flatten()
      .any(|e| e.file_name().to_string_lossy().starts_with("config.toml.bad-"));
    assert!(bad);
  }

  #[test]
  fn zero_timeouts_and_bad_urls_fall_back() {
    let file: ConfigFile = toml::from_str(
      "[virustotal]\napi_key = \"k\"\nbase_url = \"ftp://vt\"\ntimeout_seconds = 0\n",
    )
    .unwrap();
    let cfg = file.normalize();
    assert_eq!(cfg.virustotal.api_key, "k");
    assert_eq!(cfg.virustotal.base_url, "https://www.virustotal.com/api/v3/");
    assert_eq!(cfg.virustotal.timeout_seconds, 10);
  }

  #[test]
  fn env_overrides_apply_and_legacy_alias_wins() {
    let vars = env(&[
      ("PORT", "8081"),
      ("VIRUSTOTAL_API_KEY", "modern"),
      ("TotaVirus_API", "legacy"),
      ("HIBP_API_KEY", "hibp-key"),
    ]);
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg, |k| vars.get(k).cloned());

    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.virustotal.api_key, "legacy");
    assert_eq!(cfg.breach.api_key, "hibp-key");
    assert!(!cfg.uses_demo_virustotal_key());
    assert!(!cfg.uses_demo_hibp_key());
  }

  #[test]
  fn invalid_port_env_is_ignored() {
    let vars = env(&[("PORT", "not-a-port")]);
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg, |k| vars.get(k).cloned());
    assert_eq!(cfg.server.port, 3000);
  }

  #[test]
  fn only_server_section_sets_the_port() {
    let file: ConfigFile = toml::from_str("port = 4000\n").unwrap();
    assert_eq!(file.normalize().server.port, 3000);

    let file: ConfigFile = toml::from_str("port = 4000\n[server]\nport = 8080\n").unwrap();
    assert_eq!(file.normalize().server.port, 8080);
  }

  #[test]
  fn provider_parses_lowercase() {
    let file: ConfigFile = toml::from_str("[breach]\nprovider = \"hibp\"\n").unwrap();
    assert_eq!(file.normalize().breach.provider, BreachProvider::Hibp);
  }
}
