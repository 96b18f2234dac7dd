use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
  auth::AuthConfig,
  bilibili::{extract_video_id, BiliClient},
  Error, Result,
};

/// A resolved, playable audio stream. `audio_url` is short-lived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedAudio {
  pub title: String,
  pub aid: String,
  pub bvid: String,
  pub cid: String,
  pub audio_url: String,
}

#[async_trait]
pub trait Extractor: Send + Sync {
  /// Resolves a video page url to its audio stream, reporting why it
  /// failed.
  async fn extract(
    &self,
    page_url: &str,
    auth: Option<&AuthConfig>,
  ) -> Result<ExtractedAudio>;

  /// Same as [`Extractor::extract`] with every failure collapsed to `None`.
  async fn get_audio(
    &self,
    page_url: &str,
    auth: Option<&AuthConfig>,
  ) -> Option<ExtractedAudio> {
    match self.extract(page_url, auth).await {
      Ok(audio) => Some(audio),
      Err(e) => {
        error!("error getting audio for {page_url}: {e}");
        None
      }
    }
  }
}

#[async_trait]
impl Extractor for BiliClient {
  async fn extract(
    &self,
    page_url: &str,
    auth: Option<&AuthConfig>,
  ) -> Result<ExtractedAudio> {
    let id = extract_video_id(page_url).ok_or_else(|| {
      Error::UnsupportedURL(page_url.into(), "no bilibili video id found")
    })?;

    let meta = self.fetch_video_info(&id, auth).await?;
    let audio_url = self.extract_audio_url(&meta, auth).await?;
    info!("resolved audio for {} ({})", meta.bvid, meta.title);

    Ok(ExtractedAudio {
      title: meta.title,
      aid: meta.aid,
      bvid: meta.bvid,
      cid: meta.cid,
      audio_url,
    })
  }
}
