//! Interpolation engine: the timing record and its feedback control law.
//!
//! The engine converts bursty buffer-posting callbacks into a linear time
//! model `t(now) = pos0 + tf * (now - t0)`. Each non-aggregated
//! `post_buffer` closes one cycle of a first-order delay-locked loop: the
//! loop chooses `tf` so that by the time the bytes just announced have been
//! rendered (one latency from now), the reported stream time equals their
//! position. Persistent cadence bias is absorbed into `tf`; transient jitter
//! averages out over the latency window.
//!
//! Methods here assume the caller already holds the interpolator mutex; the
//! shared handle in [`crate::interpolator`] is the public surface.

use std::sync::Arc;

use log::{trace, warn};

use crate::clock::MonotonicClock;
use crate::constants::{
    DEFAULT_AUDIO_LATENCY_USECS, MAX_TIME_FACTOR, MIN_STARTUP_OFFSET_USECS, MIN_TIME_FACTOR,
};
use crate::diagnostics::anomaly::{Anomaly, AnomalyCounters, AnomalySink};

use super::state::TransportState;

pub(super) struct Engine {
    clock: Arc<dyn MonotonicClock + Send + Sync>,
    state: TransportState,
    /// Time-scale factor: stream µs advanced per system µs.
    tf: f64,
    /// System-clock epoch of the current control cycle.
    t0: i64,
    /// Media position corresponding to `t0`.
    pos0: i64,
    /// Media time written to the FIFO through the previous `post_buffer`.
    read: i64,
    /// Media time submitted by the latest `post_buffer`, not yet folded into
    /// `read`.
    queued: i64,
    /// Configured FIFO depth (µs). Always positive.
    latency: i64,
    /// Last value returned by `get_stream_usecs`.
    last: i64,
    /// System time at which `last` was computed. Diagnostic only.
    now_last: i64,
    sink: Option<AnomalySink>,
    counters: AnomalyCounters,
}

impl Engine {
    pub fn new(clock: Arc<dyn MonotonicClock + Send + Sync>) -> Self {
        let t0 = clock.now_usecs();
        Self {
            clock,
            state: TransportState::Stopped,
            tf: 0.0,
            t0,
            pos0: 0,
            read: 0,
            queued: 0,
            latency: DEFAULT_AUDIO_LATENCY_USECS,
            last: 0,
            now_last: t0,
            sink: None,
            counters: AnomalyCounters::default(),
        }
    }

    /// Configure the FIFO depth. Non-positive values select the default.
    pub fn set_latency(&mut self, usecs: i64) {
        if usecs > 0 {
            self.latency = usecs;
        } else {
            warn!(
                "latency {} is not positive, using default {}",
                usecs, DEFAULT_AUDIO_LATENCY_USECS
            );
            self.latency = DEFAULT_AUDIO_LATENCY_USECS;
        }
    }

    pub fn set_sink(&mut self, sink: Option<AnomalySink>) {
        self.sink = sink;
    }

    /// Forcibly reposition the stream. State is unchanged.
    pub fn seek(&mut self, media_time: i64) {
        let now = self.clock.now_usecs();
        match self.state {
            TransportState::Stopped | TransportState::Paused => {
                self.pos0 = media_time;
                self.read = media_time;
                self.queued = 0;
                self.t0 = now;
                self.tf = 0.0;
                self.last = media_time;
            }
            TransportState::Rolling => {
                // Supported, but the original entry states are
                // stopped/paused; leave a trace for the unusual path.
                trace!("seek to {} while rolling", media_time);
                self.read = media_time;
                self.pos0 = self.read - self.latency;
                self.queued = 0;
                self.t0 = now;
                self.tf = 1.0;
                self.last = self.pos0;
            }
        }
    }

    /// Freeze the clock. With `flushing_fifo` the FIFO contents are
    /// abandoned and the stream stops at the write pointer; without it the
    /// position is preserved for [`Engine::resume`].
    pub fn pause(&mut self, flushing_fifo: bool) {
        if flushing_fifo {
            self.set_state(TransportState::Stopped);
            self.seek(self.read + self.queued);
            return;
        }
        if self.state == TransportState::Rolling {
            self.set_state(TransportState::Paused);
            self.read += self.queued;
            self.pos0 = self.last;
            self.t0 = self.clock.now_usecs();
            self.queued = 0;
        }
    }

    pub fn stop(&mut self) {
        self.pause(true);
    }

    /// Re-arm the clock after a pause. The transition back to rolling
    /// happens on the next `post_buffer`; until then queries keep returning
    /// the paused position.
    pub fn resume(&mut self) {
        if self.state != TransportState::Paused {
            self.report(Anomaly::IllegalTransition {
                operation: "resume",
                state: self.state,
            });
            return;
        }
        self.t0 = self.clock.now_usecs();
        self.tf = 1.0;
    }

    pub fn reset(&mut self) {
        self.stop();
        self.seek(0);
    }

    /// Override the write pointer so that `read + queued == usecs`.
    pub fn forcibly_update_read_pointer(&mut self, usecs: i64) {
        self.read = usecs - self.queued;
    }

    /// Account one buffer submission. Call at the start of the audio
    /// callback with the media time just written to the FIFO.
    pub fn post_buffer(&mut self, frame_usecs: i64) {
        let now = self.clock.now_usecs();

        if self.state == TransportState::Stopped {
            // Startup: anchor the clock one startup offset behind the data
            // just written, so it has room to converge without underrunning.
            let initial_offset = (self.latency / 2).max(MIN_STARTUP_OFFSET_USECS);
            self.t0 = now;
            self.set_state(TransportState::Rolling);
            self.read += frame_usecs;
            self.pos0 = self.read - initial_offset;
            self.queued = 0;
            self.tf = 1.0;
            return;
        }

        let mut force_unity = false;
        if self.state == TransportState::Paused {
            self.set_state(TransportState::Rolling);
            force_unity = true;
        }

        let t1 = now;
        let dt = t1 - self.t0;

        // Back-to-back callbacks: fold the sample into the current cycle
        // instead of letting a tiny dt spike the loop.
        if dt < frame_usecs / 4 {
            self.queued += frame_usecs;
            return;
        }

        self.read += self.queued;
        let pos1 = self.pos0 + (self.tf * dt as f64) as i64;
        let pos1_desired = self.read - self.latency;
        let error = pos1 - pos1_desired;

        if force_unity {
            self.tf = 1.0;
        } else {
            self.tf = 1.0 - error as f64 / self.latency as f64;
        }

        self.pos0 = pos1;
        self.t0 = t1;
        self.queued = frame_usecs;

        #[cfg(feature = "debug")]
        trace!("cycle: dt {} error {} tf {:.4}", dt, error, self.tf);

        if self.tf >= MAX_TIME_FACTOR {
            self.tf = MAX_TIME_FACTOR;
            self.err_overrun(now);
        } else if self.tf < MIN_TIME_FACTOR {
            self.tf = MIN_TIME_FACTOR;
        }

        if self.pos0 >= self.read {
            self.err_underrun();
        }
    }

    /// Current media time (µs).
    pub fn get_stream_usecs(&mut self) -> i64 {
        let now = self.clock.now_usecs();

        if self.state == TransportState::Paused {
            return self.pos0;
        }

        let mut dt = self.tf * (now - self.t0) as f64;
        if dt < 0.0 {
            // Transient negative from a clock-sampling race.
            dt = 0.0;
        }
        let mut t = self.pos0 + dt as i64;

        if t < self.last {
            self.report(Anomaly::Rewind {
                computed: t,
                last_reported: self.last,
            });
        }

        if t >= self.read + self.queued && self.state == TransportState::Rolling {
            t = self.read + self.queued;
            self.err_underrun();
        }

        self.last = t;
        self.now_last = now;
        t
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn time_factor(&self) -> f64 {
        self.tf
    }

    pub fn latency(&self) -> i64 {
        self.latency
    }

    pub fn usecs_queued(&self) -> i64 {
        self.queued
    }

    /// Media time of the most recently written byte.
    pub fn read_pointer(&self) -> i64 {
        self.read + self.queued
    }

    pub fn last_reported(&self) -> i64 {
        self.last
    }

    pub fn last_reported_at(&self) -> i64 {
        self.now_last
    }

    pub fn counters(&self) -> AnomalyCounters {
        self.counters
    }

    /// The FIFO is filling faster than the loop expects: snap the epoch
    /// forward to one latency behind the write pointer and keep rolling.
    fn err_overrun(&mut self, now: i64) {
        if self.state == TransportState::Rolling {
            self.pos0 = self.read - self.latency;
            self.t0 = now;
            self.report(Anomaly::Overrun {
                snapped_to: self.pos0,
            });
        }
    }

    /// The FIFO starved: freeze at the write pointer and stop. The next
    /// `post_buffer` restarts through the startup branch.
    fn err_underrun(&mut self) {
        self.tf = 0.0;
        self.read += self.queued;
        self.pos0 = self.read;
        self.queued = 0;
        self.set_state(TransportState::Stopped);
        self.report(Anomaly::Underrun {
            frozen_at: self.read,
        });
    }

    fn set_state(&mut self, to: TransportState) {
        if self.state != to {
            trace!("transport {} -> {}", self.state.name(), to.name());
        }
        self.state = to;
    }

    fn report(&mut self, anomaly: Anomaly) {
        self.counters.record(&anomaly);
        match anomaly {
            Anomaly::Rewind {
                computed,
                last_reported,
            } => warn!(
                "stream time moved backwards: computed {} after reporting {}",
                computed, last_reported
            ),
            Anomaly::Underrun { frozen_at } => {
                warn!("underrun: clock frozen at {}", frozen_at)
            }
            Anomaly::Overrun { snapped_to } => {
                warn!("overrun: epoch snapped forward to {}", snapped_to)
            }
            Anomaly::IllegalTransition { operation, state } => {
                warn!("{} ignored in {} state", operation, state.name())
            }
        }
        if let Some(sink) = &self.sink {
            (sink.lock().unwrap())(anomaly);
        }
    }
}
