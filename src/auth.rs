use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
  store::{self, Scope, Store},
  AppState, Result,
};

const AUTH_CONFIG_KEY: &str = "authConfig";

/// Login state forwarded to the upstream api as a cookie.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
  #[serde(rename = "SESSDATA", default)]
  pub sessdata: String,
}

impl AuthConfig {
  pub fn new(sessdata: impl Into<String>) -> Self {
    Self {
      sessdata: sessdata.into(),
    }
  }

  pub fn is_authenticated(&self) -> bool {
    !self.sessdata.is_empty()
  }
}

pub async fn load_auth_config(store: &dyn Store) -> Result<AuthConfig> {
  let config = store::load(store, Scope::Sync, AUTH_CONFIG_KEY).await?;
  Ok(config.unwrap_or_default())
}

pub async fn save_auth_config(
  store: &dyn Store,
  config: &AuthConfig,
) -> Result<()> {
  let config = AuthConfig::new(config.sessdata.trim());
  store::save(store, Scope::Sync, AUTH_CONFIG_KEY, &config).await
}

pub async fn get_auth(
  State(state): State<AppState>,
) -> Result<Json<AuthConfig>> {
  Ok(Json(load_auth_config(state.store.as_ref()).await?))
}

pub async fn put_auth(
  State(state): State<AppState>,
  Json(config): Json<AuthConfig>,
) -> Result<Json<AuthConfig>> {
  save_auth_config(state.store.as_ref(), &config).await?;
  Ok(Json(load_auth_config(state.store.as_ref()).await?))
}
