use crate::report::UrlReport;
use crate::risk::{self, RiskLevel};
use crate::upstream::probe::{ProbeOutcome, UrlProbe};
use crate::upstream::virustotal::{UrlAnalysis, VirusTotalClient};
use reqwest::Url;

pub const WARN_SUBMITTED: &str =
  "URL inconnue de VirusTotal : soumise pour analyse, relancez la vérification dans quelques minutes";
pub const WARN_VT_UNAVAILABLE: &str = "Analyse VirusTotal indisponible pour le moment";
pub const WARN_PLAIN_HTTP: &str = "Connexion non chiffrée (HTTP) : les données transitent en clair";

/// What the VirusTotal step produced for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VtOutcome {
  Analysis(UrlAnalysis),
  /// Unknown to VirusTotal; queued for scanning.
  Submitted,
  Unavailable,
}

/// Prefixes `https://` when the input carries no scheme. Empty input yields `None`.
pub fn normalize_url(input: &str) -> Option<String> {
  let trimmed = input.trim();
  if trimmed.is_empty() {
    return None;
  }
  if has_scheme(trimmed) {
    return Some(trimmed.to_string());
  }
  Some(format!("https://{trimmed}"))
}

fn has_scheme(s: &str) -> bool {
  let Some((scheme, _)) = s.split_once("://") else {
    return false;
  };
  let mut chars = scheme.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

pub struct UrlInspector {
  probe: UrlProbe,
  virustotal: VirusTotalClient,
}

impl UrlInspector {
  pub fn new(probe: UrlProbe, virustotal: VirusTotalClient) -> Self {
    Self { probe, virustotal }
  }

  /// Builds a report for `normalized`; upstream failures degrade the report
  /// instead of failing it.
  pub async fn inspect(&self, original: &str, normalized: &str) -> UrlReport {
    let probe = if self.probe.enabled() {
      match self.probe.head(normalized).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
          tracing::debug!(error = %e, "url probe failed; using defaults");
          None
        }
      }
    } else {
      None
    };

    let vt = match self.virustotal.url_report(normalized).await {
      Ok(analysis) => VtOutcome::Analysis(analysis),
      Err(e) if e.is_not_found() => match self.virustotal.submit_url(normalized).await {
        Ok(()) => {
          tracing::info!("url unknown to virustotal; submitted for scanning");
          VtOutcome::Submitted
        }
        Err(e) => {
          tracing::warn!(error = %e, "virustotal url submission failed");
          VtOutcome::Unavailable
        }
      },
      Err(e) => {
        tracing::warn!(error = %e, "virustotal url report failed");
        VtOutcome::Unavailable
      }
    };

    assemble_report(original, normalized, probe, vt)
  }
}

pub fn assemble_report(
  original: &str,
  normalized: &str,
  probe: Option<ProbeOutcome>,
  vt: VtOutcome,
) -> UrlReport {
  let analysis = match &vt {
    VtOutcome::Analysis(a) => Some(a),
    _ => None,
  };

  let final_url = probe
    .as_ref()
    .map(|p| p.final_url.clone())
    .or_else(|| analysis.and_then(|a| a.final_url.clone()))
    .unwrap_or_else(|| normalized.to_string());
  let status_code = probe
    .as_ref()
    .map(|p| p.status_code)
    .or_else(|| analysis.and_then(|a| a.status_code));
  let summary = analysis.map(|a| a.summary);

  let mut warnings = Vec::new();
  match vt {
    VtOutcome::Submitted => warnings.push(WARN_SUBMITTED.to_string()),
    VtOutcome::Unavailable => warnings.push(WARN_VT_UNAVAILABLE.to_string()),
    VtOutcome::Analysis(_) => {}
  }

  let parsed_final = Url::parse(&final_url).ok();
  let plain_http = parsed_final
    .as_ref()
    .map(|u| u.scheme() == "http")
    .unwrap_or_else(|| final_url.starts_with("http://"));
  if plain_http {
    warnings.push(WARN_PLAIN_HTTP.to_string());
  }

  if let (Some(from), Some(to)) = (
    Url::parse(normalized).ok().and_then(|u| u.host_str().map(str::to_string)),
    parsed_final.as_ref().and_then(|u| u.host_str().map(str::to_string)),
  ) {
    if !same_site(&from, &to) {
      warnings.push(format!("Redirection vers un autre domaine : {to}"));
    }
  }

  if let Some(p) = &probe {
    if p.status_code >= 400 {
      warnings.push(format!("Le serveur a répondu HTTP {}", p.status_code));
    }
  }

  let level: RiskLevel = risk::apply_transport(risk::classify(summary.as_ref()), plain_http);

  UrlReport {
    original_url: original.to_string(),
    final_url,
    status_code,
    server: probe.and_then(|p| p.server),
    virus_total: summary,
    risk_level: level.label().to_string(),
    risk_color: level.color().to_string(),
    warnings,
  }
}

/// `www.` prefixes do not count as a different destination.
fn same_site(a: &str, b: &str) -> bool {
  let strip = |h: &str| h.trim_start_matches("www.").to_ascii_lowercase();
  strip(a) == strip(b)
}
