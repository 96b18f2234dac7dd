use std::{path::PathBuf, sync::LazyLock};

mod clock;

#[cfg(test)]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_API_BASE: &str = "https://api.bilibili.com";
const DEFAULT_HISTORY_LIMIT: usize = 100;

static LISTEN_ADDR: LazyLock<String> = LazyLock::new(|| {
  std::env::var("BILI_AUDIO_LISTEN")
    .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
});

static DATA_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
  std::env::var("BILI_AUDIO_DATA_DIR")
    .unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string())
    .into()
});

// lets the api origin be pointed at a mirror
static API_BASE: LazyLock<String> = LazyLock::new(|| {
  std::env::var("BILI_AUDIO_API_BASE")
    .map(|s| s.trim_end_matches('/').to_string())
    .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
});

static HISTORY_LIMIT: LazyLock<usize> = LazyLock::new(|| {
  std::env::var("BILI_AUDIO_HISTORY_LIMIT")
    .ok()
    .and_then(|s| s.parse::<usize>().ok())
    .filter(|n| *n > 0)
    .unwrap_or(DEFAULT_HISTORY_LIMIT)
});

pub fn listen_addr() -> &'static str {
  LISTEN_ADDR.as_str()
}

pub fn data_dir() -> &'static PathBuf {
  &DATA_DIR
}

pub fn api_base() -> &'static str {
  API_BASE.as_str()
}

pub fn history_limit() -> usize {
  *HISTORY_LIMIT
}

pub fn random_id() -> String {
  format!("{:016x}", rand::random::<u64>())
}
