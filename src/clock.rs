//! A small clock abstraction for deterministic time in services and tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Default)]
pub enum Clock {
  #[default]
  System,
  Fixed(DateTime<Utc>),
  /// Shared, adjustable time; every clone sees `advance` calls.
  Manual(Arc<Mutex<DateTime<Utc>>>),
}

impl Clock {
  pub fn fixed(at: DateTime<Utc>) -> Self {
    Self::Fixed(at)
  }

  pub fn manual(at: DateTime<Utc>) -> Self {
    Self::Manual(Arc::new(Mutex::new(at)))
  }

  pub fn now(&self) -> DateTime<Utc> {
    match self {
      Clock::System => Utc::now(),
      Clock::Fixed(t) => *t,
      Clock::Manual(t) => match t.lock() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
      },
    }
  }

  /// Move a manual clock forward. No effect on the other variants.
  pub fn advance(&self, delta: Duration) {
    if let Clock::Manual(t) = self {
      let mut guard = match t.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
      };
      *guard += delta;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn manual_clones_share_time() {
    let start = Utc::now();
    let a = Clock::manual(start);
    let b = a.clone();
    a.advance(Duration::minutes(5));
    assert_eq!(b.now(), start + Duration::minutes(5));

    let fixed = Clock::fixed(start);
    fixed.advance(Duration::minutes(5));
    assert_eq!(fixed.now(), start);
  }
}
