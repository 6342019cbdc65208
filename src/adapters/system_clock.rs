//! Wall clock backed by the operating system.

use std::thread;

use chrono::{DateTime, Utc};

use crate::ports::clock_port::Clock;

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep_until(&self, due: DateTime<Utc>) {
        // negative deltas fail to convert: already due
        if let Ok(wait) = (due - Utc::now()).to_std() {
            thread::sleep(wait);
        }
    }
}
