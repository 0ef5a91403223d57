use crate::config::UrlProbeConfig;
use crate::error::{UpstreamError, UpstreamResult};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::SERVER;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use super::default_user_agent;

pub const SERVICE: &str = "probe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
  pub final_url: String,
  pub status_code: u16,
  pub server: Option<String>,
}

/// HEAD request that follows a bounded number of redirects. Unless
/// `allow_private_targets` is set, every hop must land on a public address.
#[derive(Clone)]
pub struct UrlProbe {
  client: Client,
  enabled: bool,
  public_only: bool,
}

impl UrlProbe {
  pub fn new(cfg: &UrlProbeConfig) -> UpstreamResult<Self> {
    let public_only = !cfg.allow_private_targets;
    let mut builder = Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_seconds))
      .redirect(redirect_policy(cfg.max_redirects, public_only))
      .user_agent(default_user_agent());
    if public_only {
      builder = builder.dns_resolver(Arc::new(PublicOnlyResolver));
    }
    Ok(Self {
      client: builder
        .build()
        .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))?,
      enabled: cfg.enabled,
      public_only,
    })
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub async fn head(&self, url: &str) -> UpstreamResult<ProbeOutcome> {
    let parsed = Url::parse(url)
      .map_err(|e| UpstreamError::InvalidInput(format!("bad url {url}: {e}")))?;
    if self.public_only && targets_private_literal(&parsed) {
      return Err(UpstreamError::InvalidInput(format!(
        "refusing to probe non-public address {}",
        parsed.host_str().unwrap_or_default()
      )));
    }

    let response = self
      .client
      .head(parsed)
      .send()
      .await
      .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))?;

    let server = response
      .headers()
      .get(SERVER)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string);

    Ok(ProbeOutcome {
      final_url: response.url().to_string(),
      status_code: response.status().as_u16(),
      server,
    })
  }
}

fn redirect_policy(max_redirects: usize, public_only: bool) -> Policy {
  if !public_only {
    return Policy::limited(max_redirects);
  }
  Policy::custom(move |attempt| {
    if attempt.previous().len() >= max_redirects {
      attempt.error("too many redirects")
    } else if targets_private_literal(attempt.url()) {
      attempt.stop()
    } else {
      attempt.follow()
    }
  })
}

/// Hosts written as IP literals never reach the resolver, so they are checked here.
fn targets_private_literal(url: &Url) -> bool {
  let Some(host) = url.host_str() else {
    return true;
  };
  let host = host.trim_start_matches('[').trim_end_matches(']');
  match host.parse::<IpAddr>() {
    Ok(ip) => !is_public_ip(ip),
    Err(_) => false,
  }
}

/// False for loopback, private, link-local, shared and other non-routable ranges.
pub fn is_public_ip(ip: IpAddr) -> bool {
  match ip {
    IpAddr::V4(v4) => is_public_v4(v4),
    IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
      Some(v4) => is_public_v4(v4),
      None => is_public_v6(v6),
    },
  }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
  let [a, b, ..] = ip.octets();
  !(ip.is_loopback()
    || ip.is_private()
    || ip.is_link_local()
    || ip.is_unspecified()
    || ip.is_broadcast()
    || ip.is_multicast()
    || a == 0
    // 100.64.0.0/10 carrier-grade NAT
    || (a == 100 && (b & 0xc0) == 64))
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
  let first = ip.segments()[0];
  !(ip.is_loopback()
    || ip.is_unspecified()
    || ip.is_multicast()
    // fc00::/7 unique local
    || (first & 0xfe00) == 0xfc00
    // fe80::/10 link local
    || (first & 0xffc0) == 0xfe80)
}

/// System resolver that drops every non-public answer.
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
  fn resolve(&self, name: Name) -> Resolving {
    Box::pin(resolve_public(name.as_str().to_string()))
  }
}

async fn resolve_public(host: String) -> Result<Addrs, Box<dyn Error + Send + Sync>> {
  let resolved = tokio::net::lookup_host((host.as_str(), 0)).await?;
  let public: Vec<_> = resolved.filter(|addr| is_public_ip(addr.ip())).collect();
  if public.is_empty() {
    tracing::debug!(host = %host, "probe target resolves only to non-public addresses");
    return Err(format!("{host} resolves only to non-public addresses").into());
  }
  Ok(Box::new(public.into_iter()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn guarded() -> UrlProbe {
    UrlProbe::new(&UrlProbeConfig::default()).unwrap()
  }

  #[test]
  fn public_address_classification() {
    for blocked in [
      "127.0.0.1",
      "10.1.2.3",
      "172.16.0.1",
      "192.168.1.1",
      "169.254.169.254",
      "100.64.0.1",
      "0.0.0.0",
      "::1",
      "fd00::1",
      "fe80::1",
      "::ffff:10.0.0.1",
    ] {
      assert!(!is_public_ip(blocked.parse().unwrap()), "{blocked}");
    }
    for allowed in ["8.8.8.8", "93.184.216.34", "2606:4700::1111", "::ffff:1.1.1.1"] {
      assert!(is_public_ip(allowed.parse().unwrap()), "{allowed}");
    }
  }

  #[test]
  fn literal_hosts_are_checked() {
    assert!(targets_private_literal(&Url::parse("http://169.254.169.254/latest").unwrap()));
    assert!(targets_private_literal(&Url::parse("http://[::1]:8080/").unwrap()));
    assert!(!targets_private_literal(&Url::parse("https://8.8.8.8/").unwrap()));
    assert!(!targets_private_literal(&Url::parse("https://example.com/").unwrap()));
  }

  #[tokio::test]
  async fn private_literal_is_refused_before_sending() {
    let err = guarded().head("http://127.0.0.1:9/").await.unwrap_err();
    assert!(matches!(err, UpstreamError::InvalidInput(_)));

    let err = guarded().head("http://[::1]:9/").await.unwrap_err();
    assert!(matches!(err, UpstreamError::InvalidInput(_)));
  }

  #[tokio::test]
  async fn names_resolving_to_loopback_are_refused() {
    assert!(guarded().head("http://localhost:9/").await.is_err());
  }
}
