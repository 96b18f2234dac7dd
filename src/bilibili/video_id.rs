use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static BVID_PATH_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"/video/(BV[a-zA-Z0-9]+)").unwrap());
static AID_PATH_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"/video/av(\d+)").unwrap());
// bilibili.com/<token>, with nothing but a query or fragment after it
static SHORT_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"bilibili\.com/([a-zA-Z0-9]+)/?(?:[?#]|$)").unwrap()
});
static VIDEO_PAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"bilibili\.com/video/(av\d+|BV[a-zA-Z0-9]+)").unwrap()
});

/// A video is addressed either by its legacy numeric av id or by its BV id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoId {
  Bvid(String),
  Aid(String),
}

impl VideoId {
  /// The query parameter the view endpoint takes for this id.
  pub fn as_param(&self) -> (&'static str, &str) {
    match self {
      VideoId::Bvid(bvid) => ("bvid", bvid),
      VideoId::Aid(aid) => ("aid", aid),
    }
  }
}

impl std::fmt::Display for VideoId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      VideoId::Bvid(bvid) => write!(f, "{bvid}"),
      VideoId::Aid(aid) => write!(f, "av{aid}"),
    }
  }
}

pub fn extract_video_id(url: &str) -> Option<VideoId> {
  if let Some(caps) = BVID_PATH_REGEX.captures(url) {
    return Some(VideoId::Bvid(caps[1].to_string()));
  }

  if let Some(caps) = AID_PATH_REGEX.captures(url) {
    return Some(VideoId::Aid(caps[1].to_string()));
  }

  let token = SHORT_LINK_REGEX.captures(url)?.get(1)?.as_str();
  if token.starts_with("BV") {
    return Some(VideoId::Bvid(token.to_string()));
  }

  // only all-digit av tokens count, so site paths like /avatar are not
  // taken for video ids
  match token.strip_prefix("av") {
    Some(aid) if !aid.is_empty() && aid.chars().all(|c| c.is_ascii_digit()) => {
      Some(VideoId::Aid(aid.to_string()))
    }
    _ => None,
  }
}

pub fn is_video_page(url: &str) -> bool {
  VIDEO_PAGE_REGEX.is_match(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bvid(s: &str) -> Option<VideoId> {
    Some(VideoId::Bvid(s.to_string()))
  }

  fn aid(s: &str) -> Option<VideoId> {
    Some(VideoId::Aid(s.to_string()))
  }

  #[test]
  fn test_extract_bvid() {
    for url in [
      "https://www.bilibili.com/video/BV1GJ411x7h7",
      "https://www.bilibili.com/video/BV1GJ411x7h7/",
      "https://www.bilibili.com/video/BV1GJ411x7h7/?p=2&spm_id_from=333",
      "https://m.bilibili.com/video/BV1GJ411x7h7",
      "bilibili.com/video/BV1GJ411x7h7#reply",
    ] {
      assert_eq!(extract_video_id(url), bvid("BV1GJ411x7h7"), "{url}");
    }
  }

  #[test]
  fn test_extract_aid() {
    for url in [
      "https://www.bilibili.com/video/av170001",
      "https://www.bilibili.com/video/av170001/?p=1",
    ] {
      assert_eq!(extract_video_id(url), aid("170001"), "{url}");
    }
  }

  #[test]
  fn test_extract_short_link() {
    assert_eq!(
      extract_video_id("https://bilibili.com/BV1GJ411x7h7"),
      bvid("BV1GJ411x7h7")
    );
    assert_eq!(
      extract_video_id("https://www.bilibili.com/av170001?share=1"),
      aid("170001")
    );
    // further path segments are not short links
    assert_eq!(extract_video_id("https://www.bilibili.com/BV1xx/more"), None);
    // unknown token prefixes
    assert_eq!(extract_video_id("https://www.bilibili.com/anime"), None);
    assert_eq!(extract_video_id("https://www.bilibili.com/avatar"), None);
  }

  #[test]
  fn test_extract_unrelated() {
    assert_eq!(extract_video_id("https://example.com/foo"), None);
    assert_eq!(extract_video_id(""), None);
    assert_eq!(
      extract_video_id("https://www.bilibili.com/video/xyz123"),
      None
    );
  }

  #[test]
  fn test_is_video_page() {
    assert!(is_video_page("https://www.bilibili.com/video/BV1GJ411x7h7"));
    assert!(is_video_page("https://www.bilibili.com/video/av170001?p=1"));
    assert!(!is_video_page("https://www.bilibili.com/BV1GJ411x7h7"));
    assert!(!is_video_page("https://www.bilibili.com/video/"));
    assert!(!is_video_page("https://www.bilibili.com/video/avabc"));
    assert!(!is_video_page("https://example.com/foo"));
  }

  #[test]
  fn test_display_and_param() {
    let id = VideoId::Aid("170001".to_string());
    assert_eq!(id.to_string(), "av170001");
    assert_eq!(id.as_param(), ("aid", "170001"));

    let id = VideoId::Bvid("BV1GJ411x7h7".to_string());
    assert_eq!(id.as_param(), ("bvid", "BV1GJ411x7h7"));
  }
}
