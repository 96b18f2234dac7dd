mod keys;
mod playurl;
mod transport;
mod video_id;
mod view;
mod wbi;

use std::{collections::BTreeMap, sync::Arc};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{auth::AuthConfig, store::Store, util::Clock, Result};

use keys::{CachedKeys, KeyCache, KeyMaterial};
use view::VideoMetadata;
use wbi::SignedRequest;

pub use transport::{HttpTransport, Transport};
pub use video_id::{extract_video_id, is_video_page, VideoId};

#[cfg(test)]
pub use transport::testing;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const REFERER: &str = "https://www.bilibili.com";

pub fn video_page_url(bvid: &str) -> String {
  format!("{REFERER}/video/{bvid}")
}

/// Signed client for the bilibili web api.
pub struct BiliClient {
  transport: Arc<dyn Transport>,
  keys: KeyCache,
  clock: Arc<dyn Clock>,
}

impl BiliClient {
  pub fn new(
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let keys = KeyCache::new(transport.clone(), store, clock.clone());
    Self {
      transport,
      keys,
      clock,
    }
  }

  /// Signs `params` with the current keys, refreshing them first if they
  /// have expired. A signature is only valid for the request it was made
  /// for.
  pub async fn sign(
    &self,
    params: BTreeMap<String, String>,
  ) -> Result<SignedRequest> {
    let CachedKeys { keys, fingerprint } = self.keys.ensure().await?;
    debug!("signing as device {}", fingerprint.b3);
    Ok(wbi::sign(params, &keys, self.clock.now()))
  }

  async fn signed_get<T: DeserializeOwned>(
    &self,
    endpoint: &str,
    params: BTreeMap<String, String>,
    auth: Option<&AuthConfig>,
  ) -> Result<T> {
    let signed = self.sign(params).await?;
    debug!("signed {endpoint} wts={} w_rid={}", signed.wts(), signed.w_rid());
    let body = self
      .transport
      .get(endpoint, &signed.into_pairs(), auth)
      .await?;
    transport::unwrap_envelope(endpoint, body)
  }
}
