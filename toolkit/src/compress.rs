use serde::Serialize;

const MIB: u64 = 1024 * 1024;

/// Named trade-off between output size and fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
  Quality,
  Balanced,
  Max,
}

/// Parameters handed to the image compressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOptions {
  #[serde(rename = "maxSizeMB")]
  pub max_size_mb: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_width_or_height: Option<u32>,
  pub initial_quality: f64,
  pub always_keep_resolution: bool,
  pub use_web_worker: bool,
}

impl Preset {
  /// Unknown names fall back to `Balanced`.
  pub fn from_name(name: &str) -> Self {
    match name.trim().to_ascii_lowercase().as_str() {
      "quality" => Self::Quality,
      "max" => Self::Max,
      _ => Self::Balanced,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Quality => "QUALITÉ",
      Self::Balanced => "ÉQUILIBRÉ",
      Self::Max => "MAXIMUM",
    }
  }

  pub fn options(self) -> CompressionOptions {
    match self {
      Self::Quality => CompressionOptions {
        max_size_mb: 50.0,
        max_width_or_height: None,
        initial_quality: 1.0,
        always_keep_resolution: true,
        use_web_worker: true,
      },
      Self::Balanced => CompressionOptions {
        max_size_mb: 0.5,
        max_width_or_height: Some(1600),
        initial_quality: 0.6,
        always_keep_resolution: false,
        use_web_worker: true,
      },
      Self::Max => CompressionOptions {
        max_size_mb: 0.15,
        max_width_or_height: Some(800),
        initial_quality: 0.4,
        always_keep_resolution: false,
        use_web_worker: true,
      },
    }
  }
}

pub fn is_pdf(mime: &str, file_name: &str) -> bool {
  mime.eq_ignore_ascii_case("application/pdf") || file_name.to_ascii_lowercase().ends_with(".pdf")
}

/// Document metadata written back when a PDF is re-saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadataPolicy {
  pub title: &'static str,
  pub author: &'static str,
  pub subject: &'static str,
  pub keywords: &'static [&'static str],
  pub creator: &'static str,
  pub producer: &'static str,
}

pub const PDF_METADATA_POLICY: PdfMetadataPolicy = PdfMetadataPolicy {
  title: "",
  author: "",
  subject: "",
  keywords: &[],
  creator: "",
  producer: "AEGIS Compressor",
};

/// `x.xx MB` from 1 MiB upwards, `x.x KB` below.
pub fn format_size(bytes: u64) -> String {
  if bytes >= MIB {
    format!("{:.2} MB", bytes as f64 / MIB as f64)
  } else {
    format!("{:.1} KB", bytes as f64 / 1024.0)
  }
}

/// Percentage saved; negative when the output grew.
pub fn reduction_percent(original: u64, compressed: u64) -> f64 {
  if original == 0 {
    return 0.0;
  }
  (1.0 - compressed as f64 / original as f64) * 100.0
}

pub fn reduction_color(percent: f64) -> &'static str {
  if percent < 10.0 {
    "#888"
  } else if percent < 30.0 {
    "#00ff80"
  } else {
    "lime"
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSummary {
  pub original: String,
  pub compressed: String,
  pub reduction: String,
  pub reduction_color: &'static str,
  pub saved: String,
}

pub fn summarize(original: u64, compressed: u64) -> CompressionSummary {
  let percent = reduction_percent(original, compressed);
  let saved = if original > compressed {
    format!("{} économisés", format_size(original - compressed))
  } else {
    "Optimisation maximale".to_string()
  };
  CompressionSummary {
    original: format_size(original),
    compressed: format_size(compressed),
    reduction: format!("-{percent:.1}%"),
    reduction_color: reduction_color(percent),
    saved,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn preset_table() {
    let q = Preset::Quality.options();
    assert_eq!(q.max_size_mb, 50.0);
    assert_eq!(q.max_width_or_height, None);
    assert!(q.always_keep_resolution);

    let b = Preset::Balanced.options();
    assert_eq!((b.max_size_mb, b.max_width_or_height, b.initial_quality), (0.5, Some(1600), 0.6));

    let m = Preset::Max.options();
    assert_eq!((m.max_size_mb, m.max_width_or_height, m.initial_quality), (0.15, Some(800), 0.4));
    assert!(m.use_web_worker);
  }

  #[test]
  fn unknown_preset_is_balanced() {
    assert_eq!(Preset::from_name("ultra"), Preset::Balanced);
    assert_eq!(Preset::from_name(" MAX "), Preset::Max);
    assert_eq!(Preset::from_name("quality").label(), "QUALITÉ");
  }

  #[test]
  fn preset_serializes_with_compressor_keys() {
    let v = serde_json::to_value(Preset::Balanced.options()).unwrap();
    assert_eq!(v["maxSizeMB"], 0.5);
    assert_eq!(v["maxWidthOrHeight"], 1600);
    assert_eq!(v["useWebWorker"], true);

    let v = serde_json::to_value(Preset::Quality.options()).unwrap();
    assert!(v.get("maxWidthOrHeight").is_none());
  }

  #[test]
  fn pdf_detection() {
    assert!(is_pdf("application/pdf", "scan"));
    assert!(is_pdf("", "Report.PDF"));
    assert!(!is_pdf("image/png", "photo.png"));
  }

  #[test]
  fn pdf_policy_clears_identity_fields() {
    assert_eq!(PDF_METADATA_POLICY.producer, "AEGIS Compressor");
    assert!(PDF_METADATA_POLICY.keywords.is_empty());
    assert!(PDF_METADATA_POLICY.author.is_empty());
  }

  #[test]
  fn size_formatting() {
    assert_eq!(format_size(512), "0.5 KB");
    assert_eq!(format_size(1_048_575), "1024.0 KB");
    assert_eq!(format_size(1_048_576), "1.00 MB");
    assert_eq!(format_size(5 * 1_048_576 / 2), "2.50 MB");
  }

  #[test]
  fn reduction_bands() {
    assert_eq!(reduction_percent(0, 10), 0.0);
    assert_eq!(reduction_percent(1000, 250), 75.0);
    assert_eq!(reduction_color(5.0), "#888");
    assert_eq!(reduction_color(-20.0), "#888");
    assert_eq!(reduction_color(10.0), "#00ff80");
    assert_eq!(reduction_color(30.0), "lime");
  }

  #[test]
  fn summary_mentions_savings() {
    let s = summarize(2048, 1024);
    assert_eq!(s.reduction, "-50.0%");
    assert_eq!(s.saved, "1.0 KB économisés");
    assert_eq!(s.reduction_color, "lime");

    assert_eq!(summarize(1024, 2048).saved, "Optimisation maximale");
  }
}
