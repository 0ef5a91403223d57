use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// ICO canvases are square and never larger than this.
pub const ICO_MAX_SIZE: u32 = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConvertError {
  #[error("unsupported output format: {0}")]
  UnsupportedFormat(String),

  #[error("image dimensions must be non-zero, got {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
  Png,
  Jpg,
  Jpeg,
  Webp,
  Gif,
  Bmp,
  Svg,
  Ico,
}

impl TargetFormat {
  pub const ALL: [TargetFormat; 8] = [
    Self::Png,
    Self::Jpg,
    Self::Jpeg,
    Self::Webp,
    Self::Gif,
    Self::Bmp,
    Self::Svg,
    Self::Ico,
  ];

  pub fn extension(self) -> &'static str {
    match self {
      Self::Png => "png",
      Self::Jpg => "jpg",
      Self::Jpeg => "jpeg",
      Self::Webp => "webp",
      Self::Gif => "gif",
      Self::Bmp => "bmp",
      Self::Svg => "svg",
      Self::Ico => "ico",
    }
  }

  /// Encoder MIME type. ICO frames are written as PNG.
  pub fn mime(self) -> &'static str {
    match self {
      Self::Png | Self::Ico => "image/png",
      Self::Jpg | Self::Jpeg => "image/jpeg",
      Self::Webp => "image/webp",
      Self::Gif => "image/gif",
      Self::Bmp => "image/bmp",
      Self::Svg => "image/svg+xml",
    }
  }
}

impl fmt::Display for TargetFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.extension().to_ascii_uppercase())
  }
}

impl FromStr for TargetFormat {
  type Err = ConvertError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().trim_start_matches('.').to_ascii_lowercase();
    Self::ALL
      .into_iter()
      .find(|f| f.extension() == wanted)
      .ok_or_else(|| ConvertError::UnsupportedFormat(s.to_string()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionPlan {
  pub format: TargetFormat,
  pub canvas_width: u32,
  pub canvas_height: u32,
  pub mime: &'static str,
  pub output_name: String,
}

pub fn plan(
  file_name: &str,
  format: TargetFormat,
  width: u32,
  height: u32,
) -> Result<ConversionPlan, ConvertError> {
  if width == 0 || height == 0 {
    return Err(ConvertError::EmptyImage { width, height });
  }
  let (canvas_width, canvas_height) = match format {
    TargetFormat::Ico => {
      let side = width.min(height).min(ICO_MAX_SIZE);
      (side, side)
    }
    _ => (width, height),
  };
  Ok(ConversionPlan {
    format,
    canvas_width,
    canvas_height,
    mime: format.mime(),
    output_name: output_file_name(file_name, format),
  })
}

/// Replaces the last extension of `file_name`, or appends one when it has none.
pub fn output_file_name(file_name: &str, format: TargetFormat) -> String {
  let stem = match file_name.rfind('.') {
    Some(i) => {
      let tail = &file_name[i + 1..];
      if tail.is_empty() || tail.contains('/') {
        file_name
      } else {
        &file_name[..i]
      }
    }
    None => file_name,
  };
  format!("{stem}.{}", format.extension())
}

/// SVG document that embeds a rasterised PNG.
pub fn svg_wrapper(width: u32, height: u32, png_data_url: &str) -> String {
  format!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
     <svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{width}\" height=\"{height}\">\
     <image width=\"{width}\" height=\"{height}\" xlink:href=\"{png_data_url}\"/></svg>"
  )
}
