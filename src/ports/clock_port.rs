//! Wall-clock port used by the slice scheduler.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Blocks the calling thread until `due` has passed.
    fn sleep_until(&self, due: DateTime<Utc>);
}
