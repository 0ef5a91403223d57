use crate::report::VirusTotalSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
  Safe,
  Attention,
  High,
  Dangerous,
  Unknown,
}

impl RiskLevel {
  pub fn label(self) -> &'static str {
    match self {
      Self::Safe => "SÛR",
      Self::Attention => "ATTENTION",
      Self::High => "RISQUE ÉLEVÉ",
      Self::Dangerous => "DANGEREUX",
      Self::Unknown => "INCONNU",
    }
  }

  pub fn color(self) -> &'static str {
    match self {
      Self::Safe => "lime",
      Self::Attention => "yellow",
      Self::High => "orange",
      Self::Dangerous => "red",
      Self::Unknown => "gray",
    }
  }

  /// Ordering of known verdicts; `Unknown` has none.
  fn rank(self) -> Option<u8> {
    match self {
      Self::Safe => Some(0),
      Self::Attention => Some(1),
      Self::High => Some(2),
      Self::Dangerous => Some(3),
      Self::Unknown => None,
    }
  }
}

const DANGEROUS_MALICIOUS: u64 = 3;
const HIGH_SUSPICIOUS: u64 = 2;

pub fn classify(stats: Option<&VirusTotalSummary>) -> RiskLevel {
  let Some(s) = stats else {
    return RiskLevel::Unknown;
  };

  if s.malicious >= DANGEROUS_MALICIOUS {
    RiskLevel::Dangerous
  } else if s.malicious >= 1 || s.suspicious >= HIGH_SUSPICIOUS {
    RiskLevel::High
  } else if s.suspicious >= 1 {
    RiskLevel::Attention
  } else {
    RiskLevel::Safe
  }
}

/// Plain-HTTP destinations are never reported better than `Attention`.
pub fn apply_transport(level: RiskLevel, plain_http: bool) -> RiskLevel {
  if !plain_http {
    return level;
  }
  match level.rank() {
    Some(r) if r < 1 => RiskLevel::Attention,
    _ => level,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stats(malicious: u64, suspicious: u64) -> VirusTotalSummary {
    VirusTotalSummary {
      malicious,
      suspicious,
      harmless: 60,
      undetected: 10,
      total_engines: 70 + malicious + suspicious,
    }
  }

  #[test]
  fn thresholds_follow_detection_counts() {
    let cases = [
      ((3, 0), RiskLevel::Dangerous),
      ((7, 4), RiskLevel::Dangerous),
      ((2, 0), RiskLevel::High),
      ((1, 0), RiskLevel::High),
      ((0, 2), RiskLevel::High),
      ((0, 1), RiskLevel::Attention),
      ((0, 0), RiskLevel::Safe),
    ];
    for ((m, s), expected) in cases {
      assert_eq!(classify(Some(&stats(m, s))), expected, "m={m} s={s}");
    }
  }

  #[test]
  fn missing_data_is_unknown_gray() {
    let level = classify(None);
    assert_eq!(level, RiskLevel::Unknown);
    assert_eq!(level.label(), "INCONNU");
    assert_eq!(level.color(), "gray");
  }

  #[test]
  fn labels_and_colors() {
    assert_eq!(RiskLevel::Dangerous.label(), "DANGEREUX");
    assert_eq!(RiskLevel::Dangerous.color(), "red");
    assert_eq!(RiskLevel::High.label(), "RISQUE ÉLEVÉ");
    assert_eq!(RiskLevel::High.color(), "orange");
    assert_eq!(RiskLevel::Attention.color(), "yellow");
    assert_eq!(RiskLevel::Safe.label(), "SÛR");
    assert_eq!(RiskLevel::Safe.color(), "lime");
  }

  #[test]
  fn plain_http_caps_safe_at_attention() {
    assert_eq!(apply_transport(RiskLevel::Safe, true), RiskLevel::Attention);
    assert_eq!(apply_transport(RiskLevel::Safe, false), RiskLevel::Safe);
    assert_eq!(apply_transport(RiskLevel::High, true), RiskLevel::High);
    assert_eq!(apply_transport(RiskLevel::Dangerous, true), RiskLevel::Dangerous);
    assert_eq!(apply_transport(RiskLevel::Unknown, true), RiskLevel::Unknown);
  }

  #[test]
  fn classification_is_deterministic() {
    let s = stats(0, 1);
    assert_eq!(classify(Some(&s)), classify(Some(&s)));
  }
}
