//! Verbosity-gated stderr diagnostics.
//!
//! A single global notification level controls how chatty the core is; the
//! embedding front end sets it once at startup. Level 0 is silent, 1 carries
//! errors only, 2 (the default) adds notable events such as partition
//! discoveries and favored-set summaries, 3+ adds debug detail.

use std::sync::atomic::{AtomicI32, Ordering};

/// Global notification level. Read through [`display_level`].
pub static DISPLAY_LEVEL: AtomicI32 = AtomicI32::new(2);

/// Returns the current notification level.
#[inline]
pub fn display_level() -> i32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

/// Sets the notification level.
#[inline]
pub fn set_display_level(level: i32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Unconditional stderr output.
#[macro_export]
macro_rules! display {
    ($($arg:tt)*) => { eprint!($($arg)*) };
}

/// Stderr output gated on the global notification level.
#[macro_export]
macro_rules! displaylevel {
    ($level:expr, $($arg:tt)*) => {
        if $crate::display::display_level() >= $level {
            eprint!($($arg)*);
        }
    };
}

/// Aborts on an unrecoverable invariant violation after printing a
/// diagnostic. These are programming or state-corruption errors, not
/// conditions a caller could handle; the panic carries the formatted
/// message so test harnesses can hook it.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        eprintln!("Fatal error raised at {}:{}", file!(), line!());
        panic!($($arg)*)
    }};
}
