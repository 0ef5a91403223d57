use crate::config::WhoisConfig;
use crate::error::{UpstreamError, UpstreamResult};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const SERVICE: &str = "whois";

const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;
const MAX_DOMAIN_LEN: usize = 253;

/// WHOIS over TCP (RFC 3912): asks the root server, then follows one referral.
#[derive(Debug, Clone)]
pub struct WhoisClient {
  root_server: String,
  port: u16,
  timeout: Duration,
}

impl WhoisClient {
  pub fn new(cfg: &WhoisConfig) -> Self {
    Self {
      root_server: cfg.root_server.clone(),
      port: cfg.port,
      timeout: Duration::from_secs(cfg.timeout_seconds),
    }
  }

  pub async fn lookup(&self, domain: &str) -> UpstreamResult<String> {
    let domain = validate_domain(domain)?;
    let root = self.query(&self.root_server, self.port, &domain).await?;

    let Some(referral) = referral_server(&root) else {
      return Ok(root);
    };
    let (server, port) = split_host_port(&referral, self.port);
    if server.eq_ignore_ascii_case(&self.root_server) && port == self.port {
      return Ok(root);
    }

    tracing::debug!(server = %server, port, "following whois referral");
    match self.query(server, port, &domain).await {
      Ok(detail) if !detail.trim().is_empty() => Ok(detail),
      Ok(_) => Ok(root),
      Err(e) => {
        tracing::warn!(server = %server, error = %e, "whois referral failed; returning root answer");
        Ok(root)
      }
    }
  }

  async fn query(&self, server: &str, port: u16, domain: &str) -> UpstreamResult<String> {
    let exchange = async {
      let mut stream = TcpStream::connect((server, port)).await?;
      stream.write_all(format!("{domain}\r\n").as_bytes()).await?;
      let mut out = Vec::new();
      (&mut stream)
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut out)
        .await?;
      Ok::<_, std::io::Error>(out)
    };

    match timeout(self.timeout, exchange).await {
      Ok(Ok(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
      Ok(Err(e)) => Err(UpstreamError::Transport {
        service: SERVICE,
        message: format!("{server}: {e}"),
      }),
      Err(_) => Err(UpstreamError::Timeout { service: SERVICE }),
    }
  }
}

/// Lower-cased domain without a trailing dot, restricted to LDH labels.
pub fn validate_domain(raw: &str) -> UpstreamResult<String> {
  let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
  if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
    return Err(UpstreamError::InvalidInput(format!("invalid domain: {raw}")));
  }
  let labels_ok = domain.split('.').all(|label| {
    !label.is_empty()
      && label.len() <= 63
      && !label.starts_with('-')
      && !label.ends_with('-')
      && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
  });
  if !labels_ok {
    return Err(UpstreamError::InvalidInput(format!("invalid domain: {raw}")));
  }
  Ok(domain)
}

/// Splits `host:port`; bare hosts and IPv6 literals keep `default_port`.
pub fn split_host_port(server: &str, default_port: u16) -> (&str, u16) {
  match server.rsplit_once(':') {
    Some((host, port)) if !host.contains(':') => match port.parse::<u16>() {
      Ok(p) if p > 0 => (host, p),
      _ => (server, default_port),
    },
    _ => (server, default_port),
  }
}

/// Server named by a `refer:` / `whois:` / `ReferralServer:` line.
pub fn referral_server(text: &str) -> Option<String> {
  for line in text.lines() {
    let Some((key, value)) = line.split_once(':') else {
      continue;
    };
    let key = key.trim().to_ascii_lowercase();
    if key != "refer" && key != "whois" && key != "referralserver" {
      continue;
    }
    let value = value.trim();
    let value = value.strip_prefix("whois://").unwrap_or(value);
    let value = value.trim_end_matches('/');
    if !value.is_empty() {
      return Some(value.to_string());
    }
  }
  None
}
