//! Subscriber setup and the span-scoped event macros.
//!
//! Every event is emitted inside a span naming its direction, so relay
//! traffic can be told apart from engine activity:
//!
//! - `outgoing!` for lines written to the relay,
//! - `incoming!` for replies read back,
//! - `internal!` for everything else.
//!
//! Each takes an optional `level = LEVEL,` prefix and defaults to TRACE.

use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, fmt::time::ChronoUtc, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Environment variable holding the maximum level.
pub const LEVEL_VAR: &str = "LOG_LEVEL";

#[doc(hidden)]
#[macro_export]
macro_rules! scoped_event {
    ($level:expr, $scope:literal, $($arg:tt)+) => {{
        let scope = $crate::tracing::span!($level, $scope);
        let _entered = scope.enter();
        $crate::tracing::event!($level, $($arg)+)
    }};
}

#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::scoped_event!($crate::tracing::Level::$level, "outgoing", $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::outgoing!(level = TRACE, $($arg)+)
    };
}

#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::scoped_event!($crate::tracing::Level::$level, "incoming", $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::incoming!(level = TRACE, $($arg)+)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::scoped_event!($crate::tracing::Level::$level, "internal", $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::internal!(level = TRACE, $($arg)+)
    };
}

const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Parse a `LOG_LEVEL` value. Unset or unrecognised values give the build's
/// default.
fn level_from(value: Option<&str>) -> LevelFilter {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return default_level();
    };

    LevelFilter::from_str(value).unwrap_or_else(|_| {
        eprintln!(
            "Unrecognised {LEVEL_VAR} '{value}', using {}",
            default_level()
        );
        default_level()
    })
}

/// Install the global subscriber: compact lines with RFC 3339 UTC
/// timestamps, limited to `mailrun*` targets.
///
/// Calling it again keeps the subscriber that is already installed.
pub fn init() {
    let level = level_from(std::env::var(LEVEL_VAR).ok().as_deref());

    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(ChronoUtc::rfc_3339())
        .with_filter(level)
        .with_filter(FilterFn::new(|metadata| {
            metadata.target().starts_with("mailrun")
        }));

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        tracing::debug!("Subscriber already installed");
    }
}
