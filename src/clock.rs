use chrono::{DateTime, Utc};

/// Source of snapshot timestamps. Readings may repeat; the history service
/// moves a repeated millisecond forward before deriving a snapshot id.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        std::time::SystemTime::now().into()
    }
}
