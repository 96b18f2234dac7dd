use chrono::{DateTime, Utc};

/// Source of the current time. Signing timestamps and cache expiry both
/// read from it, so tests can freeze or advance time.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

#[cfg(test)]
pub struct ManualClock(std::sync::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl ManualClock {
  pub fn at_unix(secs: i64) -> Self {
    let time = DateTime::from_timestamp(secs, 0).expect("valid timestamp");
    Self(std::sync::Mutex::new(time))
  }

  pub fn advance(&self, by: chrono::Duration) {
    let mut time = self.0.lock().unwrap();
    *time += by;
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.0.lock().unwrap()
  }
}
