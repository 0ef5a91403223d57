use crate::error::{UpstreamError, UpstreamResult};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, Url};
use std::time::Duration;

pub mod breach;
pub mod breach_schema;
pub mod ip;
pub mod probe;
pub mod virustotal;
pub mod whois;

const MAX_JSON_BYTES: usize = 4 * 1024 * 1024;

pub(crate) fn build_client(
  service: &'static str,
  timeout_seconds: u64,
  redirect: Policy,
  user_agent: &str,
) -> UpstreamResult<Client> {
  Client::builder()
    .timeout(Duration::from_secs(timeout_seconds))
    .redirect(redirect)
    .user_agent(user_agent)
    .build()
    .map_err(|e| UpstreamError::from_reqwest(service, e))
}

pub(crate) fn default_user_agent() -> String {
  format!("AEGIS/{}", env!("CARGO_PKG_VERSION"))
}

/// Joins `path` onto a configured base URL, tolerating a missing trailing slash.
pub(crate) fn join_endpoint(base: &str, path: &str) -> UpstreamResult<Url> {
  let mut base = base.trim().to_string();
  if !base.ends_with('/') {
    base.push('/');
  }
  let base = Url::parse(&base)
    .map_err(|e| UpstreamError::InvalidInput(format!("bad base URL {base}: {e}")))?;
  base
    .join(path.trim_start_matches('/'))
    .map_err(|e| UpstreamError::InvalidInput(format!("bad endpoint path {path}: {e}")))
}

/// Replaces the trailing empty segment of `url` with a percent-encoded `segment`.
pub(crate) fn with_segment(mut url: Url, segment: &str) -> UpstreamResult<Url> {
  url
    .path_segments_mut()
    .map_err(|_| UpstreamError::InvalidInput("endpoint cannot take path segments".to_string()))?
    .pop_if_empty()
    .push(segment);
  Ok(url)
}

/// Sends a GET and decodes a JSON body, mapping 404 to `NotFound` and any
/// other non-success status to `Status`.
pub(crate) async fn get_json(
  service: &'static str,
  request: reqwest::RequestBuilder,
) -> UpstreamResult<serde_json::Value> {
  let response = request
    .send()
    .await
    .map_err(|e| UpstreamError::from_reqwest(service, e))?;
  read_json(service, response).await
}

pub(crate) async fn read_json(
  service: &'static str,
  response: Response,
) -> UpstreamResult<serde_json::Value> {
  let status = response.status().as_u16();
  if status == 404 {
    return Err(UpstreamError::NotFound { service });
  }
  if !response.status().is_success() {
    return Err(UpstreamError::Status { service, status });
  }

  let body = read_response_with_limit(service, response, MAX_JSON_BYTES).await?;
  serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode {
    service,
    message: e.to_string(),
  })
}

pub(crate) async fn read_response_with_limit(
  service: &'static str,
  mut response: Response,
  max_bytes: usize,
) -> UpstreamResult<Vec<u8>> {
  let mut out = Vec::new();
  while let Some(chunk) = response
    .chunk()
    .await
    .map_err(|e| UpstreamError::from_reqwest(service, e))?
  {
    out.extend_from_slice(&chunk);
    if out.len() > max_bytes {
      return Err(UpstreamError::Decode {
        service,
        message: format!("response exceeds max size {max_bytes} bytes"),
      });
    }
  }
  Ok(out)
}

/// Host and path only; keeps query strings and keys out of logs.
pub fn safe_url_label(url: &Url) -> String {
  let host = url.host_str().unwrap_or("<no-host>");
  let mut path = url.path().to_string();
  if path.is_empty() {
    path = "/".to_string();
  }
  format!("{host}{path}")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn join_endpoint_handles_missing_slash() {
    let a = join_endpoint("https://api.example.com/v3", "files/abc").unwrap();
    let b = join_endpoint("https://api.example.com/v3/", "/files/abc").unwrap();
    assert_eq!(a.as_str(), "https://api.example.com/v3/files/abc");
    assert_eq!(a, b);
  }

  #[test]
  fn join_endpoint_rejects_garbage_base() {
    assert!(join_endpoint("not a url", "x").is_err());
  }

  #[test]
  fn segment_is_percent_encoded() {
    let base = join_endpoint("https://api.example.com", "v1/check-email/").unwrap();
    let url = with_segment(base, "a b/c@example.com").unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.example.com/v1/check-email/a%20b%2Fc@example.com"
    );
  }

  #[test]
  fn ipv6_segment_stays_in_path() {
    let base = join_endpoint("http://ip-api.com/json", "").unwrap();
    let url = with_segment(base, "fe80::1").unwrap();
    assert_eq!(url.as_str(), "http://ip-api.com/json/fe80::1");
  }

  #[test]
  fn safe_label_drops_query() {
    let url = Url::parse("https://api.example.com/check?key=secret").unwrap();
    assert_eq!(safe_url_label(&url), "api.example.com/check");
  }
}
