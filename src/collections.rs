use std::sync::Arc;

use axum::{
  extract::{Path, State},
  Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
  store::{self, Scope, Store},
  util::{random_id, Clock},
  AppState, Error, Result,
};

const PLAYLISTS_KEY: &str = "userPlaylists";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
  pub id: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bvid: Option<String>,
  pub audio_url: String,
  pub added_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
  pub id: String,
  pub name: String,
  pub items: Vec<PlaylistItem>,
  pub created_at: String,
  pub updated_at: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
  pub title: String,
  #[serde(default)]
  pub bvid: Option<String>,
  pub audio_url: String,
}

#[derive(Debug, Deserialize)]
pub struct NameBody {
  pub name: String,
}

/// User-curated playlists kept in local storage.
pub struct Collections {
  store: Arc<dyn Store>,
  clock: Arc<dyn Clock>,
  lock: Mutex<()>,
}

enum Edit<T> {
  Changed(T),
  Unchanged(T),
}

fn valid_name(name: &str) -> Result<String> {
  let name = name.trim();
  if name.is_empty() {
    return Err(Error::InvalidInput("playlist name is empty".into()));
  }
  Ok(name.to_string())
}

fn not_found(id: &str) -> Error {
  Error::NotFound(format!("playlist {id}"))
}

impl Collections {
  pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
    Self {
      store,
      clock,
      lock: Mutex::new(()),
    }
  }

  fn now(&self) -> String {
    self.clock.now().to_rfc3339()
  }

  pub async fn list(&self) -> Result<Vec<Playlist>> {
    let playlists =
      store::load(self.store.as_ref(), Scope::Local, PLAYLISTS_KEY)
        .await?
        .unwrap_or_default();
    Ok(playlists)
  }

  async fn save(&self, playlists: &[Playlist]) -> Result<()> {
    store::save(self.store.as_ref(), Scope::Local, PLAYLISTS_KEY, playlists)
      .await
  }

  pub async fn get(&self, id: &str) -> Result<Playlist> {
    self
      .list()
      .await?
      .into_iter()
      .find(|p| p.id == id)
      .ok_or_else(|| not_found(id))
  }

  // applies `f` to playlist `id`, persisting only if it reports a change
  async fn update<T>(
    &self,
    id: &str,
    f: impl FnOnce(&mut Playlist) -> Result<Edit<T>>,
  ) -> Result<T> {
    let _guard = self.lock.lock().await;
    let mut playlists = self.list().await?;
    let playlist = playlists
      .iter_mut()
      .find(|p| p.id == id)
      .ok_or_else(|| not_found(id))?;

    match f(playlist)? {
      Edit::Unchanged(out) => Ok(out),
      Edit::Changed(out) => {
        playlist.updated_at = self.now();
        self.save(&playlists).await?;
        Ok(out)
      }
    }
  }

  pub async fn create(&self, name: &str) -> Result<Playlist> {
    let name = valid_name(name)?;
    let now = self.now();
    let playlist = Playlist {
      id: random_id(),
      name,
      items: vec![],
      created_at: now.clone(),
      updated_at: now,
    };

    let _guard = self.lock.lock().await;
    let mut playlists = self.list().await?;
    playlists.push(playlist.clone());
    self.save(&playlists).await?;
    Ok(playlist)
  }

  pub async fn rename(&self, id: &str, name: &str) -> Result<Playlist> {
    let name = valid_name(name)?;
    self
      .update(id, |p| {
        p.name = name;
        Ok(Edit::Changed(()))
      })
      .await?;
    self.get(id).await
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    let _guard = self.lock.lock().await;
    let mut playlists = self.list().await?;
    let len = playlists.len();
    playlists.retain(|p| p.id != id);
    if playlists.len() == len {
      return Err(not_found(id));
    }
    self.save(&playlists).await
  }

  /// Appends an item. A video already in the playlist is not added twice;
  /// the existing item is returned instead.
  pub async fn add_item(
    &self,
    id: &str,
    item: NewItem,
  ) -> Result<PlaylistItem> {
    if item.audio_url.trim().is_empty() {
      return Err(Error::InvalidInput("audio url is empty".into()));
    }
    let added_at = self.now();

    self
      .update(id, |p| {
        let existing = item.bvid.as_ref().and_then(|bvid| {
          p.items.iter().find(|i| i.bvid.as_ref() == Some(bvid))
        });
        if let Some(existing) = existing {
          return Ok(Edit::Unchanged(existing.clone()));
        }

        let new_item = PlaylistItem {
          id: random_id(),
          title: item.title,
          bvid: item.bvid.filter(|b| !b.is_empty()),
          audio_url: item.audio_url,
          added_at,
        };
        p.items.push(new_item.clone());
        Ok(Edit::Changed(new_item))
      })
      .await
  }

  pub async fn remove_item(&self, id: &str, item_id: &str) -> Result<()> {
    self
      .update(id, |p| {
        let len = p.items.len();
        p.items.retain(|i| i.id != item_id);
        if p.items.len() == len {
          return Err(Error::NotFound(format!("playlist item {item_id}")));
        }
        Ok(Edit::Changed(()))
      })
      .await
  }
}

pub async fn list_collections(
  State(state): State<AppState>,
) -> Result<Json<Vec<Playlist>>> {
  Ok(Json(state.collections.list().await?))
}

pub async fn create_collection(
  State(state): State<AppState>,
  Json(body): Json<NameBody>,
) -> Result<Json<Playlist>> {
  Ok(Json(state.collections.create(&body.name).await?))
}

pub async fn get_collection(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<Playlist>> {
  Ok(Json(state.collections.get(&id).await?))
}

pub async fn rename_collection(
  State(state): State<AppState>,
  Path(id): Path<String>,
  Json(body): Json<NameBody>,
) -> Result<Json<Playlist>> {
  Ok(Json(state.collections.rename(&id, &body.name).await?))
}

pub async fn delete_collection(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<()> {
  state.collections.delete(&id).await
}

pub async fn add_collection_item(
  State(state): State<AppState>,
  Path(id): Path<String>,
  Json(item): Json<NewItem>,
) -> Result<Json<PlaylistItem>> {
  Ok(Json(state.collections.add_item(&id, item).await?))
}

pub async fn remove_collection_item(
  State(state): State<AppState>,
  Path((id, item_id)): Path<(String, String)>,
) -> Result<()> {
  state.collections.remove_item(&id, &item_id).await
}
