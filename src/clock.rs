use chrono::{DateTime, Utc};

/// Time source for everything that asks "what time is it".
///
/// The scheduling math itself is pure and takes `now` as an argument; this
/// trait is how the runtime pieces obtain that `now`, so tests can drive them
/// with a manual clock.
pub trait Clock: Send + Sync + 'static {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
