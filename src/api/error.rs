use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by [`super::PostsApi`].
#[derive(Debug, Error)]
pub enum ApiError {
  /// The server answered a read with a non-2xx status.
  #[error("Failed to fetch {resource}. Status: {}", status.as_u16())]
  Status {
    resource: &'static str,
    status: StatusCode,
  },
  /// The server answered a write with a non-2xx status.
  #[error("Failed to create {resource}. Status: {}", status.as_u16())]
  Rejected {
    resource: &'static str,
    status: StatusCode,
  },
  /// Connection refused, DNS failure, reset, etc.
  #[error("Request to {resource} failed: {source}")]
  Transport {
    resource: &'static str,
    #[source]
    source: reqwest::Error,
  },
  #[error("Unexpected response body from {resource}: {source}")]
  Decode {
    resource: &'static str,
    #[source]
    source: reqwest::Error,
  },
  #[error("Invalid request URL: {0}")]
  Url(#[from] url::ParseError),
}

impl ApiError {
  /// HTTP status of the failed response, if the server answered at all.
  pub fn status(&self) -> Option<StatusCode> {
    match self {
      ApiError::Status { status, .. } | ApiError::Rejected { status, .. } => Some(*status),
      _ => None,
    }
  }
}
