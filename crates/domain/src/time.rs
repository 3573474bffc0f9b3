//! Wall-clock time for adapter bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// When an adapter started bridging its device.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Time elapsed since `start`. A start in the future (clock stepped back)
/// counts as zero.
#[must_use]
pub fn since(start: Timestamp) -> Duration {
    (now() - start).to_std().unwrap_or_default()
}
