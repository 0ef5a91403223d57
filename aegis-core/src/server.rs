use crate::config::Config;
use crate::error::UpstreamError;
use crate::report::{BreachRecord, UrlReport};
use crate::reputation::{normalize_url, UrlInspector};
use crate::upstream::breach::{BreachCatalog, BreachClient};
use crate::upstream::ip::{perceived_client_ip, ForwardedHeaders, IpClient};
use crate::upstream::probe::UrlProbe;
use crate::upstream::virustotal::{self, VirusTotalClient};
use crate::upstream::whois::WhoisClient;
use anyhow::Context;
use axum::{
  extract::{ConnectInfo, Path, Query, Request, State},
  http::{header, HeaderMap, HeaderValue, StatusCode},
  response::{IntoResponse, Response},
  routing::get,
  Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Names the upstream whose answer was replaced by a placeholder.
pub const DEGRADED_HEADER: &str = "x-aegis-degraded";

pub struct AppState {
  pub inspector: UrlInspector,
  pub virustotal: VirusTotalClient,
  pub breach: BreachClient,
  pub catalog: BreachCatalog,
  pub ip: IpClient,
  pub whois: WhoisClient,
}

impl AppState {
  pub fn from_config(cfg: &Config, catalog: BreachCatalog) -> anyhow::Result<Self> {
    let virustotal = VirusTotalClient::new(&cfg.virustotal).context("build virustotal client")?;
    let probe = UrlProbe::new(&cfg.url_probe).context("build url probe")?;
    Ok(Self {
      inspector: UrlInspector::new(probe, virustotal.clone()),
      virustotal,
      breach: BreachClient::new(&cfg.breach).context("build breach client")?,
      catalog,
      ip: IpClient::new(&cfg.ip).context("build ip client")?,
      whois: WhoisClient::new(&cfg.whois),
    })
  }
}

pub fn router(state: Arc<AppState>, client_dir: &std::path::Path) -> Router {
  let index = crate::paths::index_path(client_dir);
  let spa = ServeDir::new(client_dir).fallback(ServeFile::new(index));

  Router::new()
    .route("/api/ip", get(ip_handler))
    .route("/api/whois/:domain", get(whois_handler))
    .route("/api/virustotal/:hash", get(virustotal_handler))
    .route("/api/url-info", get(url_info_handler))
    .route("/api/breach/:email", get(breach_handler))
    .route("/api/*rest", get(api_not_found))
    .with_state(state)
    .fallback_service(spa)
    .layer(SetResponseHeaderLayer::if_not_present(
      header::X_CONTENT_TYPE_OPTIONS,
      HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::if_not_present(
      header::X_FRAME_OPTIONS,
      HeaderValue::from_static("SAMEORIGIN"),
    ))
    .layer(CorsLayer::permissive())
    .layer(
      TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
          "http",
          request_id = %uuid::Uuid::new_v4(),
          method = %request.method(),
          uri = %request.uri(),
        )
      }),
    )
}

/// Serves until Ctrl-C, then drains in-flight requests.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .with_graceful_shutdown(shutdown_signal())
  .await
  .context("http server error")
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => tracing::info!("shutdown requested"),
    Err(e) => {
      tracing::error!(error = %e, "cannot listen for ctrl-c; running until killed");
      std::future::pending::<()>().await;
    }
  }
}

fn degraded<T: IntoResponse>(service: &'static str, body: T) -> Response {
  ([(DEGRADED_HEADER, service)], body).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers.get(name).and_then(|v| v.to_str().ok())
}

async fn ip_handler(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  connect: Option<ConnectInfo<SocketAddr>>,
) -> Response {
  let forwarded = ForwardedHeaders {
    client_ip: header_str(&headers, "x-client-ip"),
    real_ip: header_str(&headers, "x-real-ip"),
    forwarded_for: header_str(&headers, "x-forwarded-for"),
  };
  let peer = connect.map(|ConnectInfo(addr)| addr.ip().to_string());
  // No address at all: treat like a local caller.
  let perceived =
    perceived_client_ip(&forwarded, peer.as_deref()).unwrap_or_else(|| "::1".to_string());
  let ip = state.ip.resolve_public(&perceived).await;

  if !state.ip.geo_lookup_enabled() {
    return Json(json!({ "success": true, "ip": ip, "geo": null })).into_response();
  }

  match state.ip.geolocate(&ip).await {
    Ok(geo) => Json(json!({ "success": true, "ip": ip, "geo": geo })).into_response(),
    Err(e) => {
      tracing::warn!(error = %e, "geo lookup failed");
      degraded(
        "geo",
        Json(json!({ "success": true, "ip": ip, "geo": null })),
      )
    }
  }
}

async fn whois_handler(
  State(state): State<Arc<AppState>>,
  Path(domain): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
  match state.whois.lookup(&domain).await {
    Ok(text) => Ok(Json(json!({ "data": text }))),
    Err(UpstreamError::InvalidInput(msg)) => Err(ApiError::BadRequest(msg)),
    Err(e) => {
      tracing::error!(error = %e, "whois lookup failed");
      Err(ApiError::Internal("Erreur lors de la recherche WHOIS".to_string()))
    }
  }
}

async fn virustotal_handler(
  State(state): State<Arc<AppState>>,
  Path(hash): Path<String>,
) -> Result<Response, ApiError> {
  if !virustotal::is_sha256_hex(&hash) {
    return Err(ApiError::BadRequest("Hash SHA-256 invalide".to_string()));
  }
  match state.virustotal.file_report(&hash).await {
    Ok(report) => Ok(Json(report).into_response()),
    Err(e) => {
      tracing::warn!(error = %e, "virustotal file lookup failed; returning placeholder");
      Ok(degraded(
        virustotal::SERVICE,
        Json(virustotal::fallback_file_report()),
      ))
    }
  }
}

#[derive(Debug, Deserialize)]
struct UrlInfoQuery {
  url: Option<String>,
}

async fn url_info_handler(
  State(state): State<Arc<AppState>>,
  Query(query): Query<UrlInfoQuery>,
) -> Result<Json<UrlReport>, ApiError> {
  let raw = query.url.unwrap_or_default();
  let normalized = normalize_url(&raw).ok_or_else(|| ApiError::BadRequest("URL requise".to_string()))?;
  let report = state.inspector.inspect(raw.trim(), &normalized).await;
  tracing::info!(risk = %report.risk_level, warnings = report.warnings.len(), "url inspected");
  Ok(Json(report))
}

async fn breach_handler(
  State(state): State<Arc<AppState>>,
  Path(email): Path<String>,
) -> Response {
  match state.breach.lookup(&state.catalog, &email).await {
    Ok(records) => Json(records).into_response(),
    Err(UpstreamError::InvalidInput(_)) => Json(Vec::<BreachRecord>::new()).into_response(),
    Err(e) => {
      tracing::warn!(error = %e, "breach lookup failed; answering with an empty list");
      degraded(
        crate::upstream::breach::SERVICE,
        Json(Vec::<BreachRecord>::new()),
      )
    }
  }
}

async fn api_not_found() -> ApiError {
  ApiError::NotFound("Route API inconnue".to_string())
}

#[derive(Debug)]
pub enum ApiError {
  BadRequest(String),
  NotFound(String),
  Internal(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
      ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
      ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn api_error_statuses() {
    assert_eq!(
      ApiError::BadRequest("x".into()).into_response().status(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      ApiError::NotFound("x".into()).into_response().status(),
      StatusCode::NOT_FOUND
    );
    assert_eq!(
      ApiError::Internal("x".into()).into_response().status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn degraded_sets_marker_header() {
    let response = degraded("breach", Json(Vec::<BreachRecord>::new()));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
      response.headers().get(DEGRADED_HEADER).and_then(|v| v.to_str().ok()),
      Some("breach")
    );
  }
}
