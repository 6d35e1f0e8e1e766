//! Shared constants for interpolation defaults.

/// Default configured FIFO latency (µs).
///
/// Matches a typical HAL of 4 × 20 ms buffers, doubled for conservative
/// headroom. Used whenever the host configures a non-positive latency.
pub const DEFAULT_AUDIO_LATENCY_USECS: i64 = 160_000;

/// Floor on the startup offset applied by the first `post_buffer` (µs).
///
/// Empirical: keeps very-low-latency configurations from starting the clock
/// too close to the write pointer. Do not remove even when `latency / 2`
/// falls below it.
pub const MIN_STARTUP_OFFSET_USECS: i64 = 40_000;

/// Lower clamp on the time-scale factor while rolling.
pub const MIN_TIME_FACTOR: f64 = 0.5;

/// Upper clamp on the time-scale factor; saturation here signals an overrun.
pub const MAX_TIME_FACTOR: f64 = 2.0;
