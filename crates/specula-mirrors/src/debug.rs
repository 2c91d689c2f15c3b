//! Diagnostics for swallowed failures
//!
//! Best-effort queries (constant paths, nesting, file attribution) turn
//! failures into "no result". Setting `SPECULA_LOG=debug` prints what was
//! swallowed to stderr.

use once_cell::sync::Lazy;

/// Environment variable controlling diagnostics
pub const LOG_ENV: &str = "SPECULA_LOG";

static ENABLED: Lazy<bool> = Lazy::new(|| {
    std::env::var(LOG_ENV)
        .map(|level| level.eq_ignore_ascii_case("debug"))
        .unwrap_or(false)
});

/// Whether debug diagnostics are on
pub fn enabled() -> bool {
    *ENABLED
}

macro_rules! debug_log {
    ($($arg:tt)*) => {
        if $crate::debug::enabled() {
            eprintln!("[specula] {}", format_args!($($arg)*));
        }
    };
}

pub(crate) use debug_log;
