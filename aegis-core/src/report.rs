use serde::{Deserialize, Serialize};

/// Detection counters pulled from a VirusTotal analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirusTotalSummary {
  pub malicious: u64,
  pub suspicious: u64,
  pub harmless: u64,
  pub undetected: u64,
  pub total_engines: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlReport {
  pub original_url: String,
  pub final_url: String,
  pub status_code: Option<u16>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub server: Option<String>,
  pub virus_total: Option<VirusTotalSummary>,
  pub risk_level: String,
  pub risk_color: String,
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachRecord {
  #[serde(rename = "Name")]
  pub name: String,
  #[serde(rename = "Domain", skip_serializing_if = "Option::is_none", default)]
  pub domain: Option<String>,
  #[serde(rename = "BreachDate")]
  pub breach_date: String,
  #[serde(rename = "Description")]
  pub description: String,
}

pub const UNKNOWN_BREACH_DESCRIPTION: &str = "Source détectée (Détails non disponibles)";
pub const UNKNOWN_BREACH_DATE: &str = "Inconnue";

impl BreachRecord {
  pub fn unknown(name: &str) -> Self {
    Self {
      name: name.to_string(),
      domain: None,
      breach_date: UNKNOWN_BREACH_DATE.to_string(),
      description: UNKNOWN_BREACH_DESCRIPTION.to_string(),
    }
  }
}

/// Keeps the calendar date of an ISO-8601 timestamp.
pub fn date_only(raw: &str) -> String {
  raw.split('T').next().unwrap_or(raw).trim().to_string()
}
