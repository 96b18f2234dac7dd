use axum::{
  body::StreamBody,
  extract::{Path, Query, State},
  response::IntoResponse,
  Json,
};
use http::{header, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  auth::load_auth_config,
  bilibili::{self, VideoId, REFERER, USER_AGENT},
  extractor::ExtractedAudio,
  AppState, Error, Result,
};

// response headers passed through from the cdn
const FORWARDED_HEADERS: [header::HeaderName; 4] = [
  header::CONTENT_TYPE,
  header::CONTENT_LENGTH,
  header::CONTENT_RANGE,
  header::ACCEPT_RANGES,
];

#[derive(Deserialize)]
pub struct UrlQuery {
  url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPageResp {
  video_page: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  id: Option<VideoId>,
}

async fn record_history(state: &AppState, audio: &ExtractedAudio) {
  if let Err(e) = state.history.record(audio).await {
    warn!("failed to record history for {}: {}", audio.bvid, e);
  }
}

async fn resolve_and_record(
  state: &AppState,
  page_url: &str,
) -> Result<ExtractedAudio> {
  let auth = load_auth_config(state.store.as_ref()).await?;
  let audio = state.extractor.extract(page_url, Some(&auth)).await?;
  record_history(state, &audio).await;
  Ok(audio)
}

// a request without a range, or one starting at byte 0, begins playback;
// later ranges are the player seeking or buffering
fn starts_playback(headers: &HeaderMap) -> bool {
  let Some(range) = headers.get(header::RANGE) else {
    return true;
  };

  range
    .to_str()
    .ok()
    .and_then(|r| r.trim().strip_prefix("bytes="))
    .is_some_and(|r| r.trim_start().starts_with("0-"))
}

pub async fn resolve(
  State(state): State<AppState>,
  Query(query): Query<UrlQuery>,
) -> Result<Json<ExtractedAudio>> {
  Ok(Json(resolve_and_record(&state, &query.url).await?))
}

pub async fn video_page(Query(query): Query<UrlQuery>) -> Json<VideoPageResp> {
  Json(VideoPageResp {
    video_page: bilibili::is_video_page(&query.url),
    id: bilibili::extract_video_id(&query.url),
  })
}

/// Streams the audio of `bvid` through this server. The cdn rejects
/// requests without a bilibili referer, so players can't fetch the
/// resolved url directly.
pub async fn get_audio(
  State(state): State<AppState>,
  Path(bvid): Path<String>,
  req_headers: HeaderMap,
) -> Result<impl IntoResponse> {
  let is_bvid = bvid.len() > 2
    && bvid.starts_with("BV")
    && bvid.chars().all(|c| c.is_ascii_alphanumeric());
  if !is_bvid {
    return Err(Error::InvalidInput(format!("not a bvid: {bvid}")));
  }

  // resolved every time, the url expires
  let auth = load_auth_config(state.store.as_ref()).await?;
  let page_url = bilibili::video_page_url(&bvid);
  let Some(audio) = state.extractor.get_audio(&page_url, Some(&auth)).await
  else {
    return Err(Error::AudioStream(bvid));
  };
  if starts_playback(&req_headers) {
    record_history(&state, &audio).await;
  }

  let mut req = state
    .http
    .get(&audio.audio_url)
    .header(header::USER_AGENT, USER_AGENT)
    .header(header::REFERER, REFERER);
  if let Some(range) = req_headers.get(header::RANGE) {
    req = req.header(header::RANGE, range.clone());
  }

  debug!("proxying audio for {bvid}");
  let upstream = req.send().await?;
  let status = upstream.status();
  if !status.is_success() {
    return Err(Error::UpstreamStatus {
      endpoint: "audio stream".to_string(),
      status,
    });
  }

  let headers = forwarded_headers(upstream.headers());
  Ok((status, headers, StreamBody::new(upstream.bytes_stream())))
}

fn forwarded_headers(upstream: &HeaderMap) -> HeaderMap {
  let mut headers = HeaderMap::new();
  for name in FORWARDED_HEADERS {
    if let Some(value) = upstream.get(&name) {
      headers.insert(name, value.clone());
    }
  }

  if !headers.contains_key(header::CONTENT_TYPE) {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mp4"));
  }
  headers
}
