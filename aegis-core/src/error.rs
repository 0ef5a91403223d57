use thiserror::Error;

/// Failure talking to a third-party service.
#[derive(Error, Debug)]
pub enum UpstreamError {
  #[error("{service} request failed: {message}")]
  Transport {
    service: &'static str,
    message: String,
  },

  #[error("{service} timed out")]
  Timeout { service: &'static str },

  #[error("{service} answered HTTP {status}")]
  Status { service: &'static str, status: u16 },

  #[error("{service} has no record for this lookup")]
  NotFound { service: &'static str },

  #[error("{service} returned an unexpected payload: {message}")]
  Decode {
    service: &'static str,
    message: String,
  },

  #[error("invalid input: {0}")]
  InvalidInput(String),
}

impl UpstreamError {
  pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
    if err.is_timeout() {
      return Self::Timeout { service };
    }
    if err.is_decode() {
      return Self::Decode {
        service,
        message: short_message(&err.to_string()),
      };
    }
    Self::Transport {
      service,
      message: short_message(&err.to_string()),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

pub(crate) fn short_message(text: &str) -> String {
  let count = text.chars().count();
  if count <= 180 {
    return text.to_string();
  }
  let prefix: String = text.chars().take(180).collect();
  format!("{prefix}...")
}
