use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::error;

use crate::{auth::AuthConfig, Result};

use super::{BiliClient, VideoId};

pub const VIEW_ENDPOINT: &str = "/x/web-interface/view";

/// Title and internal ids of a video. `cid` picks the playable part and is
/// needed to resolve the stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
  pub title: String,
  #[serde(deserialize_with = "id_string")]
  pub aid: String,
  pub bvid: String,
  #[serde(deserialize_with = "id_string")]
  pub cid: String,
}

// the api sends numeric ids as json numbers
fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Number(u64),
    String(String),
  }

  Ok(match Id::deserialize(d)? {
    Id::Number(n) => n.to_string(),
    Id::String(s) => s,
  })
}

impl BiliClient {
  /// Looks up a video's metadata. Failures are logged here and handed back
  /// to the caller, which decides whether to collapse them.
  pub async fn fetch_video_info(
    &self,
    id: &VideoId,
    auth: Option<&AuthConfig>,
  ) -> Result<VideoMetadata> {
    let (key, value) = id.as_param();
    let params = BTreeMap::from([(key.to_string(), value.to_string())]);

    self
      .signed_get(VIEW_ENDPOINT, params, auth)
      .await
      .inspect_err(|e| error!("error fetching video info for {id}: {e}"))
  }
}
