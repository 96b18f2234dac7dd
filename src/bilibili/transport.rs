use async_trait::async_trait;
use reqwest::header;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::debug;

use crate::{auth::AuthConfig, Error, Result};

use super::{REFERER, USER_AGENT};

/// Issues GET requests against the upstream api and hands back the raw
/// JSON body. Envelope handling is left to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(
    &self,
    endpoint: &str,
    query: &[(String, String)],
    auth: Option<&AuthConfig>,
  ) -> Result<Value>;
}

pub struct HttpTransport {
  client: reqwest::Client,
  base: String,
}

impl HttpTransport {
  pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
    Self {
      client,
      base: base.into(),
    }
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(
    &self,
    endpoint: &str,
    query: &[(String, String)],
    auth: Option<&AuthConfig>,
  ) -> Result<Value> {
    let mut req = self
      .client
      .get(format!("{}{}", self.base, endpoint))
      .query(query)
      .header(header::USER_AGENT, USER_AGENT)
      .header(header::REFERER, REFERER);

    if let Some(auth) = auth.filter(|a| a.is_authenticated()) {
      req = req.header(header::COOKIE, format!("SESSDATA={}", auth.sessdata));
    }

    debug!("GET {endpoint}");
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      return Err(Error::UpstreamStatus {
        endpoint: endpoint.to_string(),
        status,
      });
    }

    Ok(resp.json().await?)
  }
}

#[derive(Deserialize)]
struct Envelope<T> {
  code: i64,
  #[serde(default)]
  message: String,
  data: Option<T>,
}

/// Checks the `{code, message, data}` wrapper every api response carries.
/// `code == 0` with a present `data` is the only success.
pub fn unwrap_envelope<T: DeserializeOwned>(
  endpoint: &str,
  body: Value,
) -> Result<T> {
  let envelope: Envelope<T> =
    serde_json::from_value(body).map_err(|source| Error::Decode {
      endpoint: endpoint.to_string(),
      source,
    })?;

  if envelope.code != 0 {
    let message = if envelope.message.is_empty() {
      "Unknown API error".to_string()
    } else {
      envelope.message
    };
    return Err(Error::Api {
      code: envelope.code,
      message,
    });
  }

  envelope
    .data
    .ok_or_else(|| Error::MissingData(endpoint.to_string()))
}

#[cfg(test)]
pub mod testing {
  use std::{collections::HashMap, sync::Mutex};

  use reqwest::StatusCode;

  use super::*;

  #[derive(Clone, Debug)]
  pub struct Call {
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub sessdata: Option<String>,
  }

  impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
      self
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
    }
  }

  enum Reply {
    Json(Value),
    Status(StatusCode),
  }

  /// Canned replies per endpoint. Every call is recorded, and each reply
  /// yields to the scheduler first so concurrent callers interleave.
  #[derive(Default)]
  pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<Call>>,
  }

  impl ScriptedTransport {
    pub fn reply(self, endpoint: &str, body: Value) -> Self {
      self.set_reply(endpoint, body);
      self
    }

    pub fn fail(self, endpoint: &str, status: StatusCode) -> Self {
      let mut replies = self.replies.lock().unwrap();
      replies.insert(endpoint.to_string(), Reply::Status(status));
      drop(replies);
      self
    }

    pub fn set_reply(&self, endpoint: &str, body: Value) {
      let mut replies = self.replies.lock().unwrap();
      replies.insert(endpoint.to_string(), Reply::Json(body));
    }

    pub fn calls(&self) -> Vec<Call> {
      self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Call> {
      self
        .calls()
        .into_iter()
        .filter(|c| c.endpoint == endpoint)
        .collect()
    }
  }

  #[async_trait]
  impl Transport for ScriptedTransport {
    async fn get(
      &self,
      endpoint: &str,
      query: &[(String, String)],
      auth: Option<&AuthConfig>,
    ) -> Result<Value> {
      self.calls.lock().unwrap().push(Call {
        endpoint: endpoint.to_string(),
        query: query.to_vec(),
        sessdata: auth
          .filter(|a| a.is_authenticated())
          .map(|a| a.sessdata.clone()),
      });

      tokio::task::yield_now().await;

      let replies = self.replies.lock().unwrap();
      match replies.get(endpoint) {
        Some(Reply::Json(body)) => Ok(body.clone()),
        Some(Reply::Status(status)) => Err(Error::UpstreamStatus {
          endpoint: endpoint.to_string(),
          status: *status,
        }),
        None => Err(Error::UpstreamStatus {
          endpoint: endpoint.to_string(),
          status: StatusCode::NOT_FOUND,
        }),
      }
    }
  }
}
