use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
  store::{self, Scope, Store},
  util::Clock,
  Error, Result,
};

use super::transport::Transport;

pub const NAV_ENDPOINT: &str = "/x/web-interface/nav";
pub const SPI_ENDPOINT: &str = "/x/frontend/finger/spi";

const SIGN_DATA_KEY: &str = "signData";
const SPI_DATA_KEY: &str = "spiData";
const CACHE_TIME_KEY: &str = "cacheTime";

fn max_age() -> Duration {
  Duration::hours(24)
}

/// The two rotating fragments the mixin key is derived from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
  #[serde(rename = "imgKey")]
  pub img_key: String,
  #[serde(rename = "subKey")]
  pub sub_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
  pub b3: String,
  pub b4: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedKeys {
  pub keys: KeyMaterial,
  pub fingerprint: DeviceFingerprint,
}

/// Keeps the signing keys and device fingerprint in the sync store and
/// refetches both once they are a day old.
///
/// There is no lock around read-check-refresh: two cold callers may both
/// refetch and both write. Either write is a complete, valid entry.
pub struct KeyCache {
  transport: Arc<dyn Transport>,
  store: Arc<dyn Store>,
  clock: Arc<dyn Clock>,
}

impl KeyCache {
  pub fn new(
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      transport,
      store,
      clock,
    }
  }

  pub async fn ensure(&self) -> Result<CachedKeys> {
    if let Some(cached) = self.cached().await {
      debug!("using cached signing keys");
      return Ok(cached);
    }

    info!("signing key cache stale, refetching");
    let now = self.clock.now();

    let (keys, fingerprint) =
      tokio::try_join!(self.fetch_keys(), self.fetch_fingerprint()).map_err(
        |e| {
          warn!("failed to fetch signing keys: {e}");
          match e {
            Error::KeyMaterialUnavailable(_) => e,
            e => Error::KeyMaterialUnavailable(e.to_string()),
          }
        },
      )?;

    let entries = vec![
      (SIGN_DATA_KEY.to_string(), serde_json::to_value(&keys)?),
      (SPI_DATA_KEY.to_string(), serde_json::to_value(&fingerprint)?),
      (CACHE_TIME_KEY.to_string(), now.timestamp_millis().into()),
    ];
    // the keys are usable even if they couldn't be cached
    if let Err(e) = self.store.set_many(Scope::Sync, entries).await {
      warn!("failed to cache signing keys: {e}");
    }

    Ok(CachedKeys { keys, fingerprint })
  }

  async fn cached(&self) -> Option<CachedKeys> {
    let store = self.store.as_ref();

    let keys: Option<KeyMaterial> =
      store::load(store, Scope::Sync, SIGN_DATA_KEY).await.ok()?;
    let fingerprint: Option<DeviceFingerprint> =
      store::load(store, Scope::Sync, SPI_DATA_KEY).await.ok()?;
    let cache_time: Option<i64> =
      store::load(store, Scope::Sync, CACHE_TIME_KEY).await.ok()?;

    let age = self.clock.now().timestamp_millis() - cache_time?;
    if age >= max_age().num_milliseconds() {
      return None;
    }

    Some(CachedKeys {
      keys: keys?,
      fingerprint: fingerprint?,
    })
  }

  async fn fetch_keys(&self) -> Result<KeyMaterial> {
    #[derive(Deserialize)]
    struct Nav {
      data: NavData,
    }

    #[derive(Deserialize)]
    struct NavData {
      wbi_img: WbiImg,
    }

    #[derive(Deserialize)]
    struct WbiImg {
      img_url: String,
      sub_url: String,
    }

    // nav answers with code -101 to anonymous callers, but wbi_img is
    // still filled in, so the envelope code is not checked here
    let body = self.transport.get(NAV_ENDPOINT, &[], None).await?;
    let nav: Nav = serde_json::from_value(body)?;

    Ok(KeyMaterial {
      img_key: key_fragment(&nav.data.wbi_img.img_url)?,
      sub_key: key_fragment(&nav.data.wbi_img.sub_url)?,
    })
  }

  async fn fetch_fingerprint(&self) -> Result<DeviceFingerprint> {
    #[derive(Deserialize)]
    struct Spi {
      data: SpiData,
    }

    #[derive(Deserialize)]
    struct SpiData {
      b_3: String,
      b_4: String,
    }

    let body: Value = self.transport.get(SPI_ENDPOINT, &[], None).await?;
    let spi: Spi = serde_json::from_value(body)?;

    Ok(DeviceFingerprint {
      b3: spi.data.b_3,
      b4: spi.data.b_4,
    })
  }
}

/// `https://i0.hdslb.com/bfs/wbi/<fragment>.png` -> `<fragment>`
fn key_fragment(asset_url: &str) -> Result<String> {
  let file_name = asset_url.rsplit('/').next().unwrap_or(asset_url);
  let fragment = match file_name.rfind('.') {
    Some(dot) => &file_name[..dot],
    None => file_name,
  };

  if fragment.is_empty() {
    return Err(Error::KeyMaterialUnavailable(format!(
      "no key fragment in {asset_url}"
    )));
  }

  Ok(fragment.to_string())
}
