//! WBI request signing.
//!
//! Every call to a `/wbi/` endpoint (and the video view endpoint) carries a
//! `wts` timestamp and a `w_rid` hash derived from the request parameters
//! and a key mixed out of two server-issued fragments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use md5::{Digest, Md5};

use super::KeyMaterial;

const MIXIN_KEY_ENC_TAB: [usize; 64] = [
  46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49,
  33, 9, 42, 19, 29, 28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40,
  61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25, 54, 21, 56, 59, 6, 63, 57, 62, 11,
  36, 20, 34, 44, 52,
];

const MIXIN_KEY_LEN: usize = 32;

// stripped from values before hashing
const FILTERED_CHARS: &[char] = &['!', '\'', '(', ')', '*'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedRequest {
  params: BTreeMap<String, String>,
}

impl SignedRequest {
  pub fn wts(&self) -> &str {
    &self.params["wts"]
  }

  pub fn w_rid(&self) -> &str {
    &self.params["w_rid"]
  }

  pub fn into_pairs(self) -> Vec<(String, String)> {
    self.params.into_iter().collect()
  }
}

pub fn mixin_key(keys: &KeyMaterial) -> String {
  let raw: Vec<char> =
    keys.img_key.chars().chain(keys.sub_key.chars()).collect();

  MIXIN_KEY_ENC_TAB
    .iter()
    .filter_map(|&i| raw.get(i))
    .take(MIXIN_KEY_LEN)
    .collect()
}

/// Signs `params` as of `now`. Any `wts`/`w_rid` already present is
/// overwritten.
pub fn sign(
  mut params: BTreeMap<String, String>,
  keys: &KeyMaterial,
  now: DateTime<Utc>,
) -> SignedRequest {
  params.remove("w_rid");
  params.insert("wts".to_string(), now.timestamp().to_string());

  // BTreeMap iterates in key order
  let query = params
    .iter()
    .map(|(k, v)| {
      let v = v.replace(FILTERED_CHARS, "");
      format!("{}={}", encode_component(k), encode_component(&v))
    })
    .join("&");

  let mut hasher = Md5::new();
  hasher.update(query.as_bytes());
  hasher.update(mixin_key(keys).as_bytes());
  let w_rid = format!("{:x}", hasher.finalize());

  params.insert("w_rid".to_string(), w_rid);
  SignedRequest { params }
}

// percent-encodes like javascript's encodeURIComponent, which leaves
// `!'()*` alone on top of the unreserved set
fn encode_component(s: &str) -> String {
  urlencoding::encode(s)
    .replace("%21", "!")
    .replace("%27", "'")
    .replace("%28", "(")
    .replace("%29", ")")
    .replace("%2A", "*")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keys() -> KeyMaterial {
    KeyMaterial {
      img_key: "7cd084941338484aae1ad9425b84077c".to_string(),
      sub_key: "4932caff0ff746eab6f01bf08b70ac45".to_string(),
    }
  }

  fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
  }

  #[test]
  fn test_mixin_key() {
    assert_eq!(mixin_key(&keys()), "ea1db124af3c7062474693fa704f4ff8");
  }

  #[test]
  fn test_mixin_key_short_fragments() {
    // indices past the end are skipped rather than panicking
    let keys = KeyMaterial {
      img_key: "abc".to_string(),
      sub_key: "def".to_string(),
    };
    assert_eq!(mixin_key(&keys), "cdfabe");
  }

  #[test]
  fn test_sign_golden() {
    let signed = sign(
      params(&[("foo", "114"), ("bar", "514"), ("zab", "1919810")]),
      &keys(),
      at(1702204169),
    );

    assert_eq!(signed.wts(), "1702204169");
    assert_eq!(signed.w_rid(), "8f6f2b5b3d485fe1886cec6a0be8c5d4");
    assert_eq!(signed.params["foo"], "114");
    assert_eq!(signed.params.len(), 5);
  }

  #[test]
  fn test_sign_deterministic_within_second() {
    let a = sign(params(&[("a", "1"), ("b", "2")]), &keys(), at(1700000000));
    let b = sign(params(&[("a", "1"), ("b", "2")]), &keys(), at(1700000000));

    assert_eq!(a, b);
    assert_eq!(a.w_rid(), "ea94b54d19b1fed4fc11466aa87c5304");
  }

  #[test]
  fn test_sign_changes_next_second() {
    let a = sign(params(&[("a", "1"), ("b", "2")]), &keys(), at(1700000000));
    let b = sign(params(&[("a", "1"), ("b", "2")]), &keys(), at(1700000001));

    assert_ne!(a.wts(), b.wts());
    assert_ne!(a.w_rid(), b.w_rid());
    assert_eq!(b.w_rid(), "d80cfa81ae59903ce77199ec785e3d80");
  }

  #[test]
  fn test_sign_filters_and_encodes_values() {
    let signed = sign(
      params(&[("title", "it's (a) test!*"), ("q", "中文 x")]),
      &keys(),
      at(1700000000),
    );

    assert_eq!(signed.w_rid(), "31c8e81be3c17c915bd6f69408ce4bdb");
    // the hash covers the filtered value, the request keeps the original
    assert_eq!(signed.params["title"], "it's (a) test!*");
  }

  #[test]
  fn test_sign_replaces_stale_signature() {
    let stale = sign(params(&[("a", "1"), ("b", "2")]), &keys(), at(1));
    let resigned = sign(stale.params.clone(), &keys(), at(1700000000));

    assert_eq!(resigned.wts(), "1700000000");
    assert_eq!(resigned.w_rid(), "ea94b54d19b1fed4fc11466aa87c5304");
  }

  #[test]
  fn test_encode_component() {
    assert_eq!(encode_component("a b/c"), "a%20b%2Fc");
    assert_eq!(encode_component("x!'()*~"), "x!'()*~");
  }
}
