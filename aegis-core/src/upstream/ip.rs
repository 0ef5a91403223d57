use crate::config::IpConfig;
use crate::error::{UpstreamError, UpstreamResult};
use reqwest::redirect::Policy;
use reqwest::Client;
use serde::Deserialize;

use super::{build_client, default_user_agent, get_json, join_endpoint, with_segment};

pub const SERVICE: &str = "ip";

const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Header values that may carry the caller address, in precedence order.
#[derive(Debug, Clone, Default)]
pub struct ForwardedHeaders<'a> {
  pub client_ip: Option<&'a str>,
  pub real_ip: Option<&'a str>,
  pub forwarded_for: Option<&'a str>,
}

/// Best guess at the caller address as seen through proxies.
pub fn perceived_client_ip(headers: &ForwardedHeaders<'_>, peer: Option<&str>) -> Option<String> {
  let raw = [
    headers.client_ip,
    headers.real_ip,
    headers.forwarded_for,
    peer,
  ]
  .into_iter()
  .flatten()
  .map(str::trim)
  .find(|v| !v.is_empty())?;

  let first = raw.split(',').next().unwrap_or(raw).trim();
  let ip = first.strip_prefix(IPV4_MAPPED_PREFIX).unwrap_or(first);
  Some(ip.to_string())
}

pub fn is_loopback(ip: &str) -> bool {
  ip == "::1" || ip == "127.0.0.1"
}

#[derive(Debug, Deserialize)]
struct PublicIpAnswer {
  ip: String,
}

#[derive(Clone)]
pub struct IpClient {
  client: Client,
  public_ip_url: String,
  geo_url: String,
  geo_lookup: bool,
  dev_fallback_ip: String,
}

impl IpClient {
  pub fn new(cfg: &IpConfig) -> UpstreamResult<Self> {
    Ok(Self {
      client: build_client(
        SERVICE,
        cfg.timeout_seconds,
        Policy::limited(3),
        &default_user_agent(),
      )?,
      public_ip_url: cfg.public_ip_url.clone(),
      geo_url: cfg.geo_url.clone(),
      geo_lookup: cfg.geo_lookup,
      dev_fallback_ip: cfg.dev_fallback_ip.clone(),
    })
  }

  pub fn geo_lookup_enabled(&self) -> bool {
    self.geo_lookup
  }

  /// The machine's public address, as reported by an ipify-style service.
  pub async fn public_ip(&self) -> UpstreamResult<String> {
    let body = get_json(SERVICE, self.client.get(&self.public_ip_url)).await?;
    let answer: PublicIpAnswer = serde_json::from_value(body).map_err(|e| UpstreamError::Decode {
      service: SERVICE,
      message: e.to_string(),
    })?;
    if answer.ip.trim().is_empty() {
      return Err(UpstreamError::Decode {
        service: SERVICE,
        message: "empty ip field".to_string(),
      });
    }
    Ok(answer.ip)
  }

  /// Replaces loopback addresses with the public address, or the configured
  /// development address when the lookup fails.
  pub async fn resolve_public(&self, perceived: &str) -> String {
    if !is_loopback(perceived) {
      return perceived.to_string();
    }
    tracing::info!("loopback caller detected; looking up public address");
    match self.public_ip().await {
      Ok(ip) => ip,
      Err(e) => {
        tracing::warn!(error = %e, fallback = %self.dev_fallback_ip, "public address lookup failed");
        self.dev_fallback_ip.clone()
      }
    }
  }

  /// Geo-IP JSON for `ip`, passed through as returned.
  pub async fn geolocate(&self, ip: &str) -> UpstreamResult<serde_json::Value> {
    if ip.parse::<std::net::IpAddr>().is_err() {
      return Err(UpstreamError::InvalidInput(format!("not an IP address: {ip}")));
    }
    let url = with_segment(join_endpoint(&self.geo_url, "")?, ip)?;
    get_json(SERVICE, self.client.get(url)).await
  }
}
