use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

use crate::clock::Clock;

/// Advances one millisecond on every reading, so consecutive snapshots get distinct ids.
#[derive(Clone)]
pub(crate) struct StepClock {
    millis: Arc<AtomicI64>,
}

impl StepClock {
    pub(crate) fn starting_at(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.fetch_add(1, Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}
