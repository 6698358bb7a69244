//! Subscriber setup and the wire-traffic macros.
//!
//! Every line exchanged with the relay is emitted at TRACE under the
//! `mailsend::wire` target with a `direction` field: `C` for what the client
//! wrote and `S` for what the server answered. `LOG_LEVEL=trace` therefore
//! shows the whole dialogue, with AUTH payloads already redacted by the
//! caller.

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    filter::FilterFn, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Environment variable naming the log level.
pub const LEVEL_VAR: &str = "LOG_LEVEL";

#[doc(hidden)]
#[macro_export]
macro_rules! wire {
    ($direction:literal, $($arg:tt)+) => {
        $crate::tracing::trace!(target: "mailsend::wire", direction = $direction, $($arg)+)
    };
}

/// Logs a line the client writes to the relay.
#[macro_export]
macro_rules! outgoing {
    ($($arg:tt)+) => {
        $crate::wire!("C", $($arg)+)
    };
}

/// Logs a reply received from the relay.
#[macro_export]
macro_rules! incoming {
    ($($arg:tt)+) => {
        $crate::wire!("S", $($arg)+)
    };
}

const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_else(default_level)
}

/// Installs a compact stderr subscriber for this crate's events.
///
/// The level is read from [`LEVEL_VAR`]. Unset or unrecognised values fall
/// back to TRACE in debug builds and INFO in release builds.
pub fn init() {
    let requested = std::env::var(LEVEL_VAR).ok();
    let level = level_from(requested.as_deref());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("mailsend")
                })),
        )
        .init();

    if let Some(value) = requested.filter(|value| value.trim().parse::<LevelFilter>().is_err()) {
        tracing::warn!(%value, %level, "Ignoring unrecognised {LEVEL_VAR}");
    }
}
