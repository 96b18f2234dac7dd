use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

use crate::Result;

/// Storage areas. `Sync` holds small settings-like values (auth config,
/// signing key cache), `Local` holds the larger user data (history,
/// collections).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
  Sync,
  Local,
}

impl Scope {
  fn file_name(self) -> &'static str {
    match self {
      Scope::Sync => "sync.json",
      Scope::Local => "local.json",
    }
  }
}

#[async_trait]
pub trait Store: Send + Sync {
  async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>>;

  /// Writes all entries or none of them.
  async fn set_many(
    &self,
    scope: Scope,
    entries: Vec<(String, Value)>,
  ) -> Result<()>;

  async fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()> {
    self.set_many(scope, vec![(key.to_string(), value)]).await
  }
}

/// Reads `key` and decodes it. A value that no longer decodes is treated
/// as absent.
pub async fn load<T: DeserializeOwned>(
  store: &dyn Store,
  scope: Scope,
  key: &str,
) -> Result<Option<T>> {
  let Some(value) = store.get(scope, key).await? else {
    return Ok(None);
  };

  match serde_json::from_value(value) {
    Ok(value) => Ok(Some(value)),
    Err(e) => {
      warn!("ignoring malformed store entry {key}: {e}");
      Ok(None)
    }
  }
}

pub async fn save<T: Serialize + ?Sized>(
  store: &dyn Store,
  scope: Scope,
  key: &str,
  value: &T,
) -> Result<()> {
  store.set(scope, key, serde_json::to_value(value)?).await
}

/// One JSON object file per scope inside `dir`.
pub struct JsonFileStore {
  dir: PathBuf,
  // serializes read-modify-write cycles within this process
  lock: Mutex<()>,
}

impl JsonFileStore {
  pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
    tokio::fs::create_dir_all(&dir).await?;

    Ok(Self {
      dir: dir.as_ref().to_owned(),
      lock: Mutex::new(()),
    })
  }

  fn path(&self, scope: Scope) -> PathBuf {
    self.dir.join(scope.file_name())
  }

  async fn read(&self, scope: Scope) -> Result<Map<String, Value>> {
    match tokio::fs::read(self.path(scope)).await {
      Ok(bytes) if bytes.is_empty() => Ok(Map::new()),
      Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
      Err(e) => Err(e.into()),
    }
  }

  async fn write(&self, scope: Scope, map: &Map<String, Value>) -> Result<()> {
    let path = self.path(scope);
    let temp_path = path.with_extension("json.tmp");

    tokio::fs::write(&temp_path, serde_json::to_vec_pretty(map)?).await?;
    tokio::fs::rename(&temp_path, &path).await?;
    Ok(())
  }
}

#[async_trait]
impl Store for JsonFileStore {
  async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
    let _guard = self.lock.lock().await;
    let mut map = self.read(scope).await?;
    Ok(map.remove(key))
  }

  async fn set_many(
    &self,
    scope: Scope,
    entries: Vec<(String, Value)>,
  ) -> Result<()> {
    let _guard = self.lock.lock().await;
    let mut map = self.read(scope).await?;
    map.extend(entries);
    self.write(scope, &map).await
  }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
  entries: std::sync::Mutex<std::collections::HashMap<(Scope, String), Value>>,
}

#[cfg(test)]
#[async_trait]
impl Store for MemoryStore {
  async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
    let entries = self.entries.lock().unwrap();
    Ok(entries.get(&(scope, key.to_string())).cloned())
  }

  async fn set_many(
    &self,
    scope: Scope,
    entries: Vec<(String, Value)>,
  ) -> Result<()> {
    let mut map = self.entries.lock().unwrap();
    for (key, value) in entries {
      map.insert((scope, key), value);
    }
    Ok(())
  }
}
