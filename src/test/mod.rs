mod scenarios;
mod step_clock;

use once_cell::sync::Lazy;
use tracing_subscriber::fmt;

pub(crate) static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = fmt().with_test_writer().try_init();
});

pub(crate) fn init_tracing() {
    Lazy::force(&TRACING);
}

pub(crate) fn map(value: serde_json::Value) -> crate::Map {
    serde_json::from_value(value).unwrap()
}
