// timefn - monotonic timer helpers.
//
// Rust's std::time::Instant is monotonic and MT-safe on all supported
// platforms; the wrappers below exist so call sites deal in the millisecond
// quantities the persisted filenames and status counters use.

use std::time::Instant;

/// Opaque timestamp container. The absolute value is not meaningful;
/// use it only to compute a duration between two measurements.
#[derive(Clone, Copy)]
pub struct TimeT {
    t: Instant,
}

impl TimeT {
    pub fn new() -> Self {
        TimeT { t: Instant::now() }
    }
}

impl Default for TimeT {
    fn default() -> Self {
        TimeT::new()
    }
}

/// Returns the current monotonic timestamp.
pub fn get_time() -> TimeT {
    TimeT { t: Instant::now() }
}

/// Milliseconds elapsed since `clock_start`.
pub fn clock_span_ms(clock_start: TimeT) -> u64 {
    clock_start.t.elapsed().as_millis() as u64
}

/// Milliseconds between two timestamps.
pub fn span_ms(clock_start: TimeT, clock_end: TimeT) -> u64 {
    clock_end.t.duration_since(clock_start.t).as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_monotone() {
        let start = get_time();
        let end = get_time();
        assert!(span_ms(start, end) <= clock_span_ms(start) + 1);
    }
}
