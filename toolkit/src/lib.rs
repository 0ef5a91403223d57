pub mod compress;
pub mod convert;
pub mod hashing;
pub mod password;
pub mod sanitizer;

use aegis_core::upstream::virustotal::{self, VirusTotalClient};
use anyhow::Context;
use convert::TargetFormat;
use password::PasswordOptions;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  Sanitize(String),
  Password(PasswordOptions),
  CheckPassword(String),
  Preset(String),
  ConvertPlan {
    file_name: String,
    format: TargetFormat,
    width: u32,
    height: u32,
  },
  Hash {
    path: PathBuf,
    excludes: Vec<String>,
    lookup: bool,
  },
}

const USAGE: &str = "expected one of `--sanitize <text>`, `--password <len>`, \
`--check-password <pw>`, `--preset <name>`, `--convert-plan <file> <format> <w> <h>`, \
`--hash <path>`";

impl Command {
  pub fn from_args(args: &[String]) -> anyhow::Result<Self> {
    if let Some(text) = value_after(args, "--sanitize")? {
      return Ok(Self::Sanitize(text.clone()));
    }

    if let Some(len) = value_after(args, "--password")? {
      let length = len
        .parse::<usize>()
        .with_context(|| format!("invalid password length {len:?}"))?;
      let has = |flag: &str| args.iter().any(|a| a == flag);
      return Ok(Self::Password(PasswordOptions {
        length,
        upper: !has("--no-upper"),
        lower: !has("--no-lower"),
        digits: !has("--no-digits"),
        symbols: !has("--no-symbols"),
      }));
    }

    if let Some(pw) = value_after(args, "--check-password")? {
      return Ok(Self::CheckPassword(pw.clone()));
    }

    if let Some(name) = value_after(args, "--preset")? {
      return Ok(Self::Preset(name.clone()));
    }

    if let Some(i) = args.iter().position(|a| a == "--convert-plan") {
      let rest = args.get(i + 1..i + 5).ok_or_else(|| {
        anyhow::anyhow!("`--convert-plan` needs <file> <format> <width> <height>")
      })?;
      return Ok(Self::ConvertPlan {
        file_name: rest[0].clone(),
        format: rest[1].parse()?,
        width: rest[2]
          .parse()
          .with_context(|| format!("invalid width {:?}", rest[2]))?,
        height: rest[3]
          .parse()
          .with_context(|| format!("invalid height {:?}", rest[3]))?,
      });
    }

    if let Some(path) = value_after(args, "--hash")? {
      return Ok(Self::Hash {
        path: PathBuf::from(path),
        excludes: parse_excludes(args),
        lookup: args.iter().any(|a| a == "--lookup"),
      });
    }

    Err(anyhow::anyhow!(USAGE))
  }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> anyhow::Result<Option<&'a String>> {
  match args.iter().position(|a| a == flag) {
    Some(i) => args
      .get(i + 1)
      .map(Some)
      .ok_or_else(|| anyhow::anyhow!("`{flag}` needs a value")),
    None => Ok(None),
  }
}

fn parse_excludes(args: &[String]) -> Vec<String> {
  let mut excludes = Vec::new();
  let mut i = 0;
  while i < args.len() {
    if args[i] == "--exclude" {
      if let Some(v) = args.get(i + 1) {
        excludes.push(v.clone());
        i += 2;
        continue;
      }
    }
    i += 1;
  }
  excludes
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
  init_logging();

  match cmd {
    Command::Sanitize(text) => {
      let out = sanitizer::sanitize(&text);
      println!("{}", out.text);
      eprintln!("invisible characters removed: {}", out.removed);
    }
    Command::Password(opts) => {
      let pw = password::generate(&opts)?;
      let strength = password::generated_strength(&pw, &opts);
      println!("{pw}");
      eprintln!("SÉCURITÉ: {} ({})", strength.label(), strength.color());
    }
    Command::CheckPassword(pw) => match password::check_strength(&pw) {
      Some(verdict) => println!("{} ({})", verdict.label(), verdict.color()),
      None => println!("no verdict for an empty password"),
    },
    Command::Preset(name) => {
      let preset = compress::Preset::from_name(&name);
      let body = serde_json::json!({
        "mode": preset.label(),
        "image": preset.options(),
        "pdf": compress::PDF_METADATA_POLICY,
      });
      println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Command::ConvertPlan {
      file_name,
      format,
      width,
      height,
    } => {
      let plan = convert::plan(&file_name, format, width, height)?;
      println!("{}", serde_json::to_string_pretty(&plan)?);
    }
    Command::Hash {
      path,
      excludes,
      lookup,
    } => run_hash(&path, &excludes, lookup)?,
  }
  Ok(())
}

fn run_hash(path: &std::path::Path, excludes: &[String], lookup: bool) -> anyhow::Result<()> {
  let report = hashing::sweep(path, excludes)?;
  tracing::info!(
    scanned = report.scanned,
    unique = report.files.len(),
    duplicates = report.duplicates,
    unreadable = report.unreadable,
    "hash sweep complete"
  );

  if !lookup {
    for f in &report.files {
      println!("{}  {}", f.sha256, f.path.display());
    }
    return Ok(());
  }

  let client = virustotal_client()?;
  let runtime = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("build tokio runtime")?;

  runtime.block_on(async {
    for f in &report.files {
      match client.file_report(&f.sha256).await {
        Ok(body) => match virustotal::summary_from_report(&body) {
          Some(s) => println!(
            "{}  {}  malicious={} suspicious={} harmless={}",
            f.sha256,
            f.path.display(),
            s.malicious,
            s.suspicious,
            s.harmless
          ),
          None => println!("{}  {}  no analysis", f.sha256, f.path.display()),
        },
        Err(e) if e.is_not_found() => {
          println!("{}  {}  unknown to VirusTotal", f.sha256, f.path.display())
        }
        Err(e) => {
          tracing::warn!(file = %f.path.display(), error = %e, "virustotal lookup failed");
          println!("{}  {}  lookup failed", f.sha256, f.path.display());
        }
      }
    }
  });
  Ok(())
}

fn virustotal_client() -> anyhow::Result<VirusTotalClient> {
  let base = aegis_core::paths::base_dir()?;
  let mut cfg = aegis_core::config::load_readonly(&aegis_core::paths::config_path(&base))?;
  aegis_core::config::apply_process_env(&mut cfg);
  if cfg.uses_demo_virustotal_key() {
    tracing::warn!("VirusTotal key is the demo placeholder; lookups will likely be rejected");
  }
  VirusTotalClient::new(&cfg.virustotal).context("build virustotal client")
}

fn init_logging() {
  let level = std::env::var("AEGIS_LOG").unwrap_or_else(|_| "info".to_string());
  let filter = tracing_subscriber::EnvFilter::try_new(&level)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
  let _ = tracing_subscriber::fmt()
    .with_ansi(false)
    .with_target(false)
    .with_writer(std::io::stderr)
    .with_env_filter(filter)
    .try_init();
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(list: &[&str]) -> Vec<String> {
    std::iter::once("aegis-toolkit")
      .chain(list.iter().copied())
      .map(str::to_string)
      .collect()
  }

  #[test]
  fn parses_password_flags() {
    let cmd = Command::from_args(&args(&["--password", "20", "--no-symbols", "--no-upper"])).unwrap();
    assert_eq!(
      cmd,
      Command::Password(PasswordOptions {
        length: 20,
        upper: false,
        lower: true,
        digits: true,
        symbols: false,
      })
    );
  }

  #[test]
  fn parses_convert_plan() {
    let cmd = Command::from_args(&args(&["--convert-plan", "a.png", "ico", "64", "32"])).unwrap();
    assert_eq!(
      cmd,
      Command::ConvertPlan {
        file_name: "a.png".to_string(),
        format: TargetFormat::Ico,
        width: 64,
        height: 32,
      }
    );
    assert!(Command::from_args(&args(&["--convert-plan", "a.png", "ico"])).is_err());
    assert!(Command::from_args(&args(&["--convert-plan", "a.png", "tiff", "1", "1"])).is_err());
  }

  #[test]
  fn parses_hash_with_excludes() {
    let cmd = Command::from_args(&args(&[
      "--hash", "/data", "--exclude", "/data/cache", "--exclude", "/data/tmp", "--lookup",
    ]))
    .unwrap();
    assert_eq!(
      cmd,
      Command::Hash {
        path: PathBuf::from("/data"),
        excludes: vec!["/data/cache".to_string(), "/data/tmp".to_string()],
        lookup: true,
      }
    );
  }

  #[test]
  fn missing_values_are_errors() {
    assert!(Command::from_args(&args(&["--sanitize"])).is_err());
    assert!(Command::from_args(&args(&["--password", "many"])).is_err());
    assert!(Command::from_args(&args(&[])).is_err());
  }
}
