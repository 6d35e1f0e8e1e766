//! Interpolated stream clock over a FIFO-backed audio sink.
//!
//! The audio callback calls [`Interpolator::post_buffer`] at the start of
//! each callback with the media time just written to the FIFO; any number of
//! consumers poll [`Interpolator::get_stream_usecs`]. Between callbacks the
//! clock advances linearly, steered by a first-order delay-locked loop so
//! that long-term drift between the system clock and the sink's consumption
//! rate is absorbed. Overruns and underruns are self-corrected and surfaced
//! through [`crate::diagnostics`].

mod engine;
pub mod settings;
pub mod state;

use std::sync::{Arc, Mutex};

use crate::clock::{MonotonicClock, SystemClock};
use crate::diagnostics::anomaly::{AnomalyCounters, AnomalySink};

use engine::Engine;
use settings::InterpolatorSettings;
use state::TransportState;

/// Snapshot of interpolator state for UI and debug consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSnapshot {
    pub state: TransportState,
    pub time_factor: f64,
    pub read_pointer: i64,
    pub usecs_queued: i64,
    pub latency_usecs: i64,
    pub last_reported_usecs: i64,
    /// System time at which the last report was computed.
    pub last_reported_at_usecs: i64,
    pub counters: AnomalyCounters,
}

/// Shareable handle to one interpolated stream clock.
///
/// Clones share state. A single mutex guards the whole timing record; every
/// entry point does bounded arithmetic plus one clock sample under the lock,
/// so the realtime audio callback can safely drive [`Interpolator::post_buffer`]
/// while other threads poll.
#[derive(Clone)]
pub struct Interpolator {
    engine: Arc<Mutex<Engine>>,
}

impl Interpolator {
    /// Create an interpolator over the system monotonic clock.
    ///
    /// The clock starts stopped at media time zero with the default latency.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create an interpolator over an injected clock source.
    ///
    /// # Arguments
    ///
    /// * `clock` - Monotonic microsecond source sampled on every entry point.
    pub fn with_clock(clock: Arc<dyn MonotonicClock + Send + Sync>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(Engine::new(clock))),
        }
    }

    /// Configure the FIFO latency (µs). Non-positive selects the default.
    pub fn set_latency(&self, usecs: i64) {
        self.engine.lock().unwrap().set_latency(usecs);
    }

    /// Apply a settings payload.
    pub fn apply_settings(&self, settings: &InterpolatorSettings) {
        self.set_latency(settings.latency_usecs);
    }

    /// Install or replace the anomaly callback sink.
    pub fn set_anomaly_sink(&self, sink: Option<AnomalySink>) {
        self.engine.lock().unwrap().set_sink(sink);
    }

    /// Forcibly reposition the stream to `media_time` (µs).
    ///
    /// State is unchanged; a seek while rolling re-anchors the epoch one
    /// latency behind the new position.
    pub fn seek(&self, media_time: i64) {
        self.engine.lock().unwrap().seek(media_time);
    }

    /// Freeze the clock.
    ///
    /// # Arguments
    ///
    /// * `flushing_fifo` - When true the FIFO contents are abandoned and the
    ///   stream stops at the write pointer; when false the position is held
    ///   for [`Interpolator::resume`].
    pub fn pause(&self, flushing_fifo: bool) {
        self.engine.lock().unwrap().pause(flushing_fifo);
    }

    /// Stop the stream, flushing the FIFO.
    pub fn stop(&self) {
        self.engine.lock().unwrap().stop();
    }

    /// Re-arm a paused clock. Rolling restarts on the next `post_buffer`.
    pub fn resume(&self) {
        self.engine.lock().unwrap().resume();
    }

    /// Stop and rewind to media time zero.
    pub fn reset(&self) {
        self.engine.lock().unwrap().reset();
    }

    /// Account one buffer submission. Call at the start of the audio
    /// callback.
    ///
    /// # Arguments
    ///
    /// * `frame_usecs` - Media time just written to the FIFO.
    pub fn post_buffer(&self, frame_usecs: i64) {
        self.engine.lock().unwrap().post_buffer(frame_usecs);
    }

    /// Current media time (µs).
    pub fn get_stream_usecs(&self) -> i64 {
        self.engine.lock().unwrap().get_stream_usecs()
    }

    /// Media time queued by the most recent `post_buffer` (µs).
    pub fn usecs_queued(&self) -> i64 {
        self.engine.lock().unwrap().usecs_queued()
    }

    /// Media time of the most recently written byte (µs).
    pub fn read_pointer(&self) -> i64 {
        self.engine.lock().unwrap().read_pointer()
    }

    /// Override the write pointer. Diagnostic use only.
    pub fn forcibly_update_read_pointer(&self, usecs: i64) {
        self.engine.lock().unwrap().forcibly_update_read_pointer(usecs);
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        self.engine.lock().unwrap().state()
    }

    /// Return true if the clock is advancing.
    pub fn is_rolling(&self) -> bool {
        self.state() == TransportState::Rolling
    }

    /// Return true if the clock is paused with FIFO state preserved.
    pub fn is_paused(&self) -> bool {
        self.state() == TransportState::Paused
    }

    /// Return true if the clock is stopped.
    pub fn is_stopped(&self) -> bool {
        self.state() == TransportState::Stopped
    }

    /// Current time-scale factor. Diagnostic visibility.
    pub fn time_factor(&self) -> f64 {
        self.engine.lock().unwrap().time_factor()
    }

    /// Anomaly totals since construction.
    pub fn anomaly_counters(&self) -> AnomalyCounters {
        self.engine.lock().unwrap().counters()
    }

    /// Debug snapshot of the timing record.
    pub fn snapshot(&self) -> TimingSnapshot {
        let engine = self.engine.lock().unwrap();
        TimingSnapshot {
            state: engine.state(),
            time_factor: engine.time_factor(),
            read_pointer: engine.read_pointer(),
            usecs_queued: engine.usecs_queued(),
            latency_usecs: engine.latency(),
            last_reported_usecs: engine.last_reported(),
            last_reported_at_usecs: engine.last_reported_at(),
            counters: engine.counters(),
        }
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}
