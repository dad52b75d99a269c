// codeatlas-core/src/ports/clock.rs
//
// Injected per spec.md §9's dependency-injection guidance so the
// quiescence-window logic (§4.9) and outbox timestamps are deterministic
// under test.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
