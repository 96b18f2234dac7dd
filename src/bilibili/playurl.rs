use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{error, warn};

use crate::{auth::AuthConfig, Error, Result};

use super::{BiliClient, VideoMetadata};

pub const PLAYURL_ENDPOINT: &str = "/x/player/wbi/playurl";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioStreamCandidate {
  pub id: u32,
  pub url: String,
  pub bandwidth: u64,
}

/// Where the audio came from in a playurl response. DASH renditions take
/// precedence over the legacy progressive `durl` list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioSource {
  Dash(AudioStreamCandidate),
  Durl(String),
}

impl AudioSource {
  pub fn into_url(self) -> String {
    match self {
      AudioSource::Dash(candidate) => candidate.url,
      AudioSource::Durl(url) => url,
    }
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayUrlData {
  #[serde(default)]
  dash: Option<Dash>,
  #[serde(default)]
  durl: Option<Vec<Durl>>,
}

#[derive(Debug, Default, Deserialize)]
struct Dash {
  #[serde(default)]
  audio: Option<Vec<DashAudio>>,
}

#[derive(Debug, Deserialize)]
struct DashAudio {
  #[serde(default)]
  id: u32,
  // the api sends the same url under both spellings; either may be missing
  #[serde(rename = "baseUrl", default)]
  base_url_camel: Option<String>,
  #[serde(rename = "base_url", default)]
  base_url_snake: Option<String>,
  #[serde(default)]
  bandwidth: u64,
}

#[derive(Debug, Deserialize)]
struct Durl {
  #[serde(default)]
  url: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
  s.filter(|s| !s.is_empty())
}

impl PlayUrlData {
  /// Picks the highest-bandwidth DASH audio rendition, or else the first
  /// legacy url. Ties in bandwidth keep the earlier rendition.
  pub fn audio_source(self) -> Option<AudioSource> {
    let audio = self.dash.and_then(|d| d.audio).unwrap_or_default();

    if !audio.is_empty() {
      let best = audio
        .into_iter()
        .reduce(|best, a| if a.bandwidth > best.bandwidth { a } else { best })?;
      let url =
        non_empty(best.base_url_camel).or(non_empty(best.base_url_snake))?;

      return Some(AudioSource::Dash(AudioStreamCandidate {
        id: best.id,
        url,
        bandwidth: best.bandwidth,
      }));
    }

    let first = self.durl?.into_iter().next()?;
    non_empty(first.url).map(AudioSource::Durl)
  }
}

impl BiliClient {
  pub async fn audio_source(
    &self,
    meta: &VideoMetadata,
    auth: Option<&AuthConfig>,
  ) -> Result<AudioSource> {
    let params = BTreeMap::from(
      [
        ("avid", meta.aid.as_str()),
        ("cid", meta.cid.as_str()),
        ("qn", "0"),
        ("fnval", "16"),
        ("fnver", "0"),
        ("fourk", "1"),
      ]
      .map(|(k, v)| (k.to_string(), v.to_string())),
    );

    let data: PlayUrlData =
      self.signed_get(PLAYURL_ENDPOINT, params, auth).await?;

    data.audio_source().ok_or_else(|| {
      warn!("no audio stream found in playurl response for {}", meta.bvid);
      Error::AudioStream(meta.bvid.clone())
    })
  }

  /// Resolves a playable audio url. The url expires after a while and
  /// should be resolved again rather than stored.
  pub async fn extract_audio_url(
    &self,
    meta: &VideoMetadata,
    auth: Option<&AuthConfig>,
  ) -> Result<String> {
    match self.audio_source(meta, auth).await {
      Ok(source) => Ok(source.into_url()),
      // already logged with the bvid
      Err(e @ Error::AudioStream(_)) => Err(e),
      Err(e) => {
        error!("error extracting audio url for {}: {e}", meta.bvid);
        Err(e)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use serde_json::{json, Value};

  use super::*;
  use crate::{
    bilibili::fixtures, store::MemoryStore, util::ManualClock,
  };

  fn parse(data: Value) -> Option<AudioSource> {
    serde_json::from_value::<PlayUrlData>(data)
      .unwrap()
      .audio_source()
  }

  fn meta() -> VideoMetadata {
    VideoMetadata {
      title: "t".to_string(),
      aid: "80433022".to_string(),
      bvid: "BV1GJ411x7h7".to_string(),
      cid: "137649199".to_string(),
    }
  }

  #[test]
  fn test_select_highest_bandwidth() {
    let source = parse(json!({
      "dash": {"audio": [
        {"id": 1, "baseUrl": "https://a/500", "bandwidth": 500},
        {"id": 2, "baseUrl": "https://a/1200", "bandwidth": 1200},
        {"id": 3, "baseUrl": "https://a/800", "bandwidth": 800}
      ]}
    }));

    assert_eq!(
      source,
      Some(AudioSource::Dash(AudioStreamCandidate {
        id: 2,
        url: "https://a/1200".to_string(),
        bandwidth: 1200,
      }))
    );
  }

  #[test]
  fn test_select_alternate_url_spelling() {
    let source = parse(json!({
      "dash": {"audio": [
        {"id": 1, "baseUrl": "", "base_url": "https://a/snake", "bandwidth": 5}
      ]}
    }));
    assert_eq!(source.unwrap().into_url(), "https://a/snake");
  }

  #[test]
  fn test_select_equal_bandwidth_keeps_first() {
    let source = parse(json!({
      "dash": {"audio": [
        {"id": 1, "baseUrl": "https://a/first", "bandwidth": 5},
        {"id": 2, "baseUrl": "https://a/second", "bandwidth": 5}
      ]}
    }));
    assert_eq!(source.unwrap().into_url(), "https://a/first");
  }

  #[test]
  fn test_fallback_to_durl() {
    let source = parse(json!({
      "dash": {"audio": []},
      "durl": [{"url": "https://a/flv1"}, {"url": "https://a/flv2"}]
    }));
    assert_eq!(source, Some(AudioSource::Durl("https://a/flv1".to_string())));

    let source = parse(json!({
      "dash": {"audio": null},
      "durl": [{"url": "https://a/flv1"}]
    }));
    assert_eq!(source.unwrap().into_url(), "https://a/flv1");
  }

  #[test]
  fn test_no_audio() {
    assert_eq!(parse(json!({})), None);
    assert_eq!(parse(json!({"dash": {"audio": []}, "durl": []})), None);
    assert_eq!(parse(json!({"dash": null, "durl": [{"url": ""}]})), None);
    // a dash rendition without a url does not fall through to durl
    assert_eq!(
      parse(json!({
        "dash": {"audio": [{"id": 1, "bandwidth": 5}]},
        "durl": [{"url": "https://a/flv1"}]
      })),
      None
    );
  }

  #[tokio::test]
  async fn test_extract_audio_url() {
    let transport = Arc::new(fixtures::transport());
    let client = BiliClient::new(
      transport.clone(),
      Arc::new(MemoryStore::default()),
      Arc::new(ManualClock::at_unix(1_700_000_000)),
    );
    let auth = AuthConfig::new("session");

    let url = client.extract_audio_url(&meta(), Some(&auth)).await.unwrap();
    assert_eq!(url, "https://upos/high.m4s");

    let call = &transport.calls_to(PLAYURL_ENDPOINT)[0];
    assert_eq!(call.param("avid"), Some("80433022"));
    assert_eq!(call.param("cid"), Some("137649199"));
    assert_eq!(call.param("qn"), Some("0"));
    assert_eq!(call.param("fnval"), Some("16"));
    assert_eq!(call.param("fnver"), Some("0"));
    assert_eq!(call.param("fourk"), Some("1"));
    assert!(call.param("w_rid").is_some());
    assert_eq!(call.sessdata.as_deref(), Some("session"));
  }

  #[tokio::test]
  async fn test_extract_audio_url_without_streams() {
    let transport = fixtures::transport();
    transport.set_reply(
      PLAYURL_ENDPOINT,
      json!({"code": 0, "data": {"dash": {"audio": []}}}),
    );
    let client = BiliClient::new(
      Arc::new(transport),
      Arc::new(MemoryStore::default()),
      Arc::new(ManualClock::at_unix(1_700_000_000)),
    );

    assert!(matches!(
      client.extract_audio_url(&meta(), None).await,
      Err(Error::AudioStream(bvid)) if bvid == "BV1GJ411x7h7"
    ));
  }
}
