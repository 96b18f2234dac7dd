use std::sync::Arc;

use axum::{
  extract::{Path, State},
  Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
  extractor::ExtractedAudio,
  store::{self, Scope, Store},
  util::Clock,
  AppState, Error, Result,
};

const HISTORY_KEY: &str = "playHistory";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
  pub title: String,
  pub bvid: String,
  pub cid: String,
  // last url seen, only good for display since it expires
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub audio_url: Option<String>,
  pub timestamp: String,
}

/// Recently played videos, newest first, one entry per bvid.
pub struct History {
  store: Arc<dyn Store>,
  clock: Arc<dyn Clock>,
  limit: usize,
  // one read-modify-write at a time
  lock: Mutex<()>,
}

impl History {
  pub fn new(
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    limit: usize,
  ) -> Self {
    Self {
      store,
      clock,
      limit,
      lock: Mutex::new(()),
    }
  }

  pub async fn list(&self) -> Result<Vec<HistoryItem>> {
    let items = store::load(self.store.as_ref(), Scope::Local, HISTORY_KEY)
      .await?
      .unwrap_or_default();
    Ok(items)
  }

  async fn save(&self, items: &[HistoryItem]) -> Result<()> {
    store::save(self.store.as_ref(), Scope::Local, HISTORY_KEY, items).await
  }

  pub async fn record(&self, audio: &ExtractedAudio) -> Result<HistoryItem> {
    let item = HistoryItem {
      title: audio.title.clone(),
      bvid: audio.bvid.clone(),
      cid: audio.cid.clone(),
      audio_url: Some(audio.audio_url.clone()),
      timestamp: self.clock.now().to_rfc3339(),
    };

    let _guard = self.lock.lock().await;
    let mut items = self.list().await?;
    items.retain(|i| i.bvid != item.bvid);
    items.insert(0, item.clone());
    items.truncate(self.limit);
    self.save(&items).await?;

    Ok(item)
  }

  pub async fn remove(&self, bvid: &str) -> Result<()> {
    let _guard = self.lock.lock().await;
    let mut items = self.list().await?;
    let len = items.len();
    items.retain(|i| i.bvid != bvid);
    if items.len() == len {
      return Err(Error::NotFound(format!("history entry {bvid}")));
    }
    self.save(&items).await
  }

  pub async fn clear(&self) -> Result<()> {
    let _guard = self.lock.lock().await;
    self.save(&[]).await
  }
}

pub async fn list_history(
  State(state): State<AppState>,
) -> Result<Json<Vec<HistoryItem>>> {
  Ok(Json(state.history.list().await?))
}

pub async fn clear_history(State(state): State<AppState>) -> Result<()> {
  state.history.clear().await
}

pub async fn remove_history(
  State(state): State<AppState>,
  Path(bvid): Path<String>,
) -> Result<()> {
  state.history.remove(&bvid).await
}
