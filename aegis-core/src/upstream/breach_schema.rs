use crate::report::{date_only, BreachRecord, UNKNOWN_BREACH_DATE, UNKNOWN_BREACH_DESCRIPTION};
use serde::Deserialize;

/// Known shapes of a per-email breach answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CheckEmailPayload {
  /// `{ "Error": "Not found" }`
  NoMatch {
    #[serde(rename = "Error")]
    error: String,
  },
  /// `{ "breaches": [["Adobe", "Canva"]] }`
  NestedNames { breaches: Vec<Vec<String>> },
  /// `{ "breaches": ["Adobe", "Canva"] }`
  FlatNames { breaches: Vec<String> },
  /// `{ "Breaches": [{ "Name": ... }] }`
  Detailed {
    #[serde(rename = "Breaches")]
    breaches: Vec<DetailedBreach>,
  },
  /// `[{ "Name": ... }]`
  DetailedArray(Vec<DetailedBreach>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetailedBreach {
  #[serde(rename = "Name")]
  pub name: String,
  #[serde(rename = "Domain", default)]
  pub domain: Option<String>,
  #[serde(rename = "BreachDate", default)]
  pub breach_date: Option<String>,
  #[serde(rename = "Description", default)]
  pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreachEntry {
  /// Name only; details come from the catalog.
  Named(String),
  Detailed(BreachRecord),
}

impl CheckEmailPayload {
  pub fn into_entries(self) -> Vec<BreachEntry> {
    match self {
      Self::NoMatch { .. } => Vec::new(),
      Self::NestedNames { breaches } => breaches
        .into_iter()
        .flatten()
        .filter(|n| !n.trim().is_empty())
        .map(BreachEntry::Named)
        .collect(),
      Self::FlatNames { breaches } => breaches
        .into_iter()
        .filter(|n| !n.trim().is_empty())
        .map(BreachEntry::Named)
        .collect(),
      Self::Detailed { breaches } | Self::DetailedArray(breaches) => breaches
        .into_iter()
        .map(|b| BreachEntry::Detailed(b.into_record()))
        .collect(),
    }
  }
}

impl DetailedBreach {
  fn into_record(self) -> BreachRecord {
    BreachRecord {
      name: self.name,
      domain: self.domain.filter(|d| !d.trim().is_empty()),
      breach_date: self
        .breach_date
        .as_deref()
        .map(date_only)
        .unwrap_or_else(|| UNKNOWN_BREACH_DATE.to_string()),
      description: self
        .description
        .unwrap_or_else(|| UNKNOWN_BREACH_DESCRIPTION.to_string()),
    }
  }
}

/// Known shapes of the "all breaches" catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CatalogPayload {
  Wrapped {
    #[serde(rename = "exposedBreaches")]
    exposed_breaches: Vec<CatalogEntry>,
  },
  Bare(Vec<CatalogEntry>),
}

impl CatalogPayload {
  pub fn into_entries(self) -> Vec<CatalogEntry> {
    match self {
      Self::Wrapped { exposed_breaches } => exposed_breaches,
      Self::Bare(entries) => entries,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
  #[serde(rename = "breachID", alias = "Name")]
  pub breach_id: String,
  #[serde(rename = "breachedDate", alias = "BreachDate", default)]
  pub breached_date: Option<String>,
  #[serde(rename = "exposureDescription", alias = "Description", default)]
  pub exposure_description: Option<String>,
  #[serde(rename = "domain", alias = "Domain", default)]
  pub domain: Option<String>,
}
