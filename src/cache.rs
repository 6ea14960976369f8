//! Expiring key/value cache used for the per-language daily challenge.
//!
//! Entries are `(value, expires_at)`. Time is always passed in, so the cache
//! has no notion of "now" of its own and can be driven by a fixed clock in tests.

use std::{
  collections::HashMap,
  future::Future,
  hash::Hash,
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Utc};

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry<V> {
  pub value: V,
  pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
  pub fn is_live(&self, now: DateTime<Utc>) -> bool {
    now < self.expires_at
  }
}

type Slot<V> = Arc<tokio::sync::Mutex<Option<CacheEntry<V>>>>;

/// Each key has its own slot, so regenerating one key never waits on another.
pub struct ExpiringCache<K, V> {
  slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for ExpiringCache<K, V> {
  fn default() -> Self {
    Self { slots: Mutex::new(HashMap::new()) }
  }
}

impl<K, V> ExpiringCache<K, V>
where
  K: Eq + Hash,
  V: Clone,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the live value for `key`, or run `generator` and store its result.
  ///
  /// The key's slot stays locked while generating, so concurrent callers for
  /// an expired key see one regeneration. Generator errors leave the old entry
  /// in place.
  pub async fn get_or_regenerate<F, Fut, E>(&self, key: K, now: DateTime<Utc>, generator: F) -> Result<V, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(V, DateTime<Utc>), E>>,
  {
    let slot = {
      let mut slots = match self.slots.lock() {
        Ok(s) => s,
        Err(poisoned) => poisoned.into_inner(),
      };
      slots.entry(key).or_default().clone()
    };
    let mut entry = slot.lock().await;
    if let Some(live) = entry.as_ref().filter(|e| e.is_live(now)) {
      return Ok(live.value.clone());
    }
    let (value, expires_at) = generator().await?;
    *entry = Some(CacheEntry { value: value.clone(), expires_at });
    Ok(value)
  }

  pub async fn peek(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
    let slot = match self.slots.lock() {
      Ok(s) => s.get(key).cloned(),
      Err(poisoned) => poisoned.into_inner().get(key).cloned(),
    }?;
    let entry = slot.lock().await;
    entry.as_ref().filter(|e| e.is_live(now)).map(|e| e.value.clone())
  }
}

/// The first instant of the next calendar day at the given UTC offset.
pub fn next_local_midnight(now: DateTime<Utc>, utc_offset_minutes: i32) -> DateTime<Utc> {
  let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
  now
    .with_timezone(&offset)
    .date_naive()
    .succ_opt()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .and_then(|naive| offset.from_local_datetime(&naive).single())
    .map(|dt| dt.with_timezone(&Utc))
    .or_else(|| now.checked_add_signed(Duration::days(1)))
    .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
