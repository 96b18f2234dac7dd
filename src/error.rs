use axum::response::{IntoResponse, Response};
use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("http request failed: {0}")]
  Network(#[from] reqwest::Error),
  #[error("{endpoint} responded with {status}")]
  UpstreamStatus {
    endpoint: String,
    status: StatusCode,
  },
  #[error("upstream api error {code}: {message}")]
  Api { code: i64, message: String },
  #[error("no data returned from {0}")]
  MissingData(String),
  #[error("unexpected response from {endpoint}: {source}")]
  Decode {
    endpoint: String,
    #[source]
    source: serde_json::Error,
  },
  #[error("signing keys unavailable: {0}")]
  KeyMaterialUnavailable(String),
  #[error("unsupported url {0}: {1}")]
  UnsupportedURL(String, &'static str),
  #[error("no audio stream found for {0}")]
  AudioStream(String),
  #[error("{0} not found")]
  NotFound(String),
  #[error("invalid input: {0}")]
  InvalidInput(String),
  #[error("io error: {0}")]
  IO(#[from] std::io::Error),
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  pub fn status_code(&self) -> StatusCode {
    match self {
      Error::UnsupportedURL(..) | Error::InvalidInput(_) => {
        StatusCode::BAD_REQUEST
      }
      Error::NotFound(_) | Error::AudioStream(_) => StatusCode::NOT_FOUND,
      Error::Network(_)
      | Error::UpstreamStatus { .. }
      | Error::Api { .. }
      | Error::MissingData(_)
      | Error::Decode { .. }
      | Error::KeyMaterialUnavailable(_) => StatusCode::BAD_GATEWAY,
      Error::IO(_) | Error::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    (self.status_code(), self.to_string()).into_response()
  }
}
