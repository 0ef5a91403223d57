use crate::config::{BreachConfig, BreachProvider};
use crate::error::{UpstreamError, UpstreamResult};
use crate::report::{date_only, BreachRecord, UNKNOWN_BREACH_DATE, UNKNOWN_BREACH_DESCRIPTION};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::collections::HashMap;

use super::breach_schema::{BreachEntry, CatalogEntry, CatalogPayload, CheckEmailPayload};
use super::{build_client, get_json, join_endpoint, safe_url_label, with_segment};

pub const SERVICE: &str = "breach";
const HIBP_KEY_HEADER: &str = "hibp-api-key";

/// Breach name → details, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct BreachCatalog {
  entries: HashMap<String, CatalogEntry>,
}

impl BreachCatalog {
  pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
    Self {
      entries: entries
        .into_iter()
        .map(|e| (e.breach_id.clone(), e))
        .collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn lookup(&self, name: &str) -> Option<&CatalogEntry> {
    self.entries.get(name)
  }

  pub fn enrich(&self, entry: BreachEntry) -> BreachRecord {
    match entry {
      BreachEntry::Detailed(record) => record,
      BreachEntry::Named(name) => match self.lookup(&name) {
        Some(info) => BreachRecord {
          domain: info.domain.clone().filter(|d| !d.trim().is_empty()),
          breach_date: info
            .breached_date
            .as_deref()
            .map(date_only)
            .unwrap_or_else(|| UNKNOWN_BREACH_DATE.to_string()),
          description: info
            .exposure_description
            .clone()
            .unwrap_or_else(|| UNKNOWN_BREACH_DESCRIPTION.to_string()),
          name,
        },
        None => BreachRecord::unknown(&name),
      },
    }
  }
}

#[derive(Clone)]
pub struct BreachClient {
  client: Client,
  provider: BreachProvider,
  base_url: String,
  hibp_base_url: String,
  api_key: String,
}

impl BreachClient {
  pub fn new(cfg: &BreachConfig) -> UpstreamResult<Self> {
    Ok(Self {
      client: build_client(SERVICE, cfg.timeout_seconds, Policy::limited(3), &cfg.user_agent)?,
      provider: cfg.provider,
      base_url: cfg.base_url.clone(),
      hibp_base_url: cfg.hibp_base_url.clone(),
      api_key: cfg.api_key.clone(),
    })
  }

  pub fn provider(&self) -> BreachProvider {
    self.provider
  }

  pub async fn fetch_catalog(&self) -> UpstreamResult<BreachCatalog> {
    let url = match self.provider {
      BreachProvider::XposedOrNot => join_endpoint(&self.base_url, "v1/breaches")?,
      BreachProvider::Hibp => join_endpoint(&self.hibp_base_url, "api/v3/breaches")?,
    };
    tracing::info!(endpoint = %safe_url_label(&url), "loading breach catalog");
    let body = get_json(SERVICE, self.client.get(url)).await?;
    let payload: CatalogPayload = serde_json::from_value(body).map_err(|e| UpstreamError::Decode {
      service: SERVICE,
      message: e.to_string(),
    })?;
    Ok(BreachCatalog::from_entries(payload.into_entries()))
  }

  /// Breaches recorded for `email`. An unknown address yields an empty list.
  pub async fn check_email(&self, email: &str) -> UpstreamResult<Vec<BreachEntry>> {
    let email = email.trim();
    if email.is_empty() {
      return Err(UpstreamError::InvalidInput("email must not be empty".to_string()));
    }

    let request = match self.provider {
      BreachProvider::XposedOrNot => {
        let url = with_segment(join_endpoint(&self.base_url, "v1/check-email/")?, email)?;
        self.client.get(url)
      }
      BreachProvider::Hibp => {
        let mut url = with_segment(
          join_endpoint(&self.hibp_base_url, "api/v3/breachedaccount/")?,
          email,
        )?;
        url.set_query(Some("truncateResponse=false"));
        self.client.get(url).header(HIBP_KEY_HEADER, &self.api_key)
      }
    };

    let body = match get_json(SERVICE, request).await {
      Ok(body) => body,
      Err(e) if e.is_not_found() => return Ok(Vec::new()),
      Err(e) => return Err(e),
    };
    let payload: CheckEmailPayload =
      serde_json::from_value(body).map_err(|e| UpstreamError::Decode {
        service: SERVICE,
        message: e.to_string(),
      })?;
    Ok(payload.into_entries())
  }

  pub async fn lookup(
    &self,
    catalog: &BreachCatalog,
    email: &str,
  ) -> UpstreamResult<Vec<BreachRecord>> {
    let entries = self.check_email(email).await?;
    Ok(entries.into_iter().map(|e| catalog.enrich(e)).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(id: &str, date: Option<&str>, desc: Option<&str>) -> CatalogEntry {
    CatalogEntry {
      breach_id: id.to_string(),
      breached_date: date.map(str::to_string),
      exposure_description: desc.map(str::to_string),
      domain: Some(format!("{}.com", id.to_lowercase())),
    }
  }

  #[test]
  fn enrich_uses_catalog_details() {
    let catalog = BreachCatalog::from_entries([entry(
      "Adobe",
      Some("2013-10-04T00:00:00+00:00"),
      Some("Passwords leaked"),
    )]);
    let record = catalog.enrich(BreachEntry::Named("Adobe".into()));
    assert_eq!(record.breach_date, "2013-10-04");
    assert_eq!(record.description, "Passwords leaked");
    assert_eq!(record.domain.as_deref(), Some("adobe.com"));
  }

  #[test]
  fn enrich_unknown_name_uses_placeholders() {
    let catalog = BreachCatalog::default();
    let record = catalog.enrich(BreachEntry::Named("Mystery".into()));
    assert_eq!(record, BreachRecord::unknown("Mystery"));
  }

  #[test]
  fn enrich_keeps_detailed_records() {
    let catalog = BreachCatalog::from_entries([entry("Adobe", None, None)]);
    let detailed = BreachRecord {
      name: "Adobe".into(),
      domain: None,
      breach_date: "2000-01-01".into(),
      description: "from provider".into(),
    };
    assert_eq!(catalog.enrich(BreachEntry::Detailed(detailed.clone())), detailed);
  }
}
