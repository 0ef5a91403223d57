pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod report;
pub mod reputation;
pub mod risk;
pub mod server;
pub mod upstream;

use anyhow::Context;
use config::{BreachProvider, Config};
use std::path::PathBuf;
use std::sync::Arc;
use upstream::breach::{BreachCatalog, BreachClient};

pub async fn run_server(args: &[String]) -> anyhow::Result<()> {
  let base = paths::base_dir()?;
  let config_path = paths::config_override(args).unwrap_or_else(|| paths::config_path(&base));
  let mut cfg = config::load_or_create_default(&config_path)?;
  config::apply_process_env(&mut cfg);

  logging::init_server_logging(&paths::logs_dir(&base), &cfg.logging)?;

  tracing::info!(config = %config_path.display(), "starting AEGIS server");
  warn_about_demo_keys(&cfg);

  let client_dir = PathBuf::from(&cfg.server.client_dir);
  if !paths::index_path(&client_dir).is_file() {
    tracing::warn!(dir = %client_dir.display(), "client bundle has no index.html");
  }

  let catalog = load_breach_catalog(&cfg).await;
  let state = Arc::new(server::AppState::from_config(&cfg, catalog)?);
  let app = server::router(state, &client_dir);

  let listener = tokio::net::TcpListener::bind((cfg.server.host.as_str(), cfg.server.port))
    .await
    .with_context(|| format!("bind {}:{}", cfg.server.host, cfg.server.port))?;
  tracing::info!(addr = %listener.local_addr()?, "listening");

  server::serve(listener, app).await?;
  tracing::info!("server stopped");
  Ok(())
}

fn warn_about_demo_keys(cfg: &Config) {
  if cfg.uses_demo_virustotal_key() {
    tracing::warn!("VirusTotal key is the demo placeholder; file lookups will return placeholder data");
  }
  if cfg.breach.provider == BreachProvider::Hibp && cfg.uses_demo_hibp_key() {
    tracing::warn!("HaveIBeenPwned key is the demo placeholder; breach lookups will come back empty");
  }
}

/// Loaded once; an unreachable provider leaves the catalog empty.
pub async fn load_breach_catalog(cfg: &Config) -> BreachCatalog {
  let client = match BreachClient::new(&cfg.breach) {
    Ok(c) => c,
    Err(e) => {
      tracing::warn!(error = %e, "cannot build breach client; catalog left empty");
      return BreachCatalog::default();
    }
  };
  match client.fetch_catalog().await {
    Ok(catalog) => {
      tracing::info!(entries = catalog.len(), "breach catalog loaded");
      catalog
    }
    Err(e) => {
      tracing::warn!(error = %e, "breach catalog unavailable; names will not be enriched");
      BreachCatalog::default()
    }
  }
}
