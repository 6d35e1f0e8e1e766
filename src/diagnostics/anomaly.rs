//! Anomaly categories raised by the interpolator.
//!
//! Anomalies are handled locally by the control loop; these values exist so
//! hosts can observe them. Every anomaly is also logged through the `log`
//! facade, so installing a sink is optional.

use std::sync::{Arc, Mutex};

use crate::interpolator::state::TransportState;

/// One observed anomaly, reported to the host sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anomaly {
    /// The computed stream time fell behind the previously reported value.
    ///
    /// Reported but not corrected; follows an overrun snap or a violated
    /// cadence precondition.
    Rewind { computed: i64, last_reported: i64 },
    /// Stream time caught the write pointer; the clock froze at
    /// `frozen_at` and the transport stopped.
    Underrun { frozen_at: i64 },
    /// The time factor saturated high and the epoch was snapped forward to
    /// `snapped_to`.
    Overrun { snapped_to: i64 },
    /// A control primitive was called in a state that does not accept it.
    IllegalTransition {
        operation: &'static str,
        state: TransportState,
    },
}

/// Callback sink invoked with each [`Anomaly`] as it is detected.
pub type AnomalySink = Arc<Mutex<dyn Fn(Anomaly) + Send>>;

/// Running totals per anomaly category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnomalyCounters {
    pub rewinds: u64,
    pub underruns: u64,
    pub overruns: u64,
    pub illegal_transitions: u64,
}

impl AnomalyCounters {
    /// Count an anomaly into the matching category.
    pub fn record(&mut self, anomaly: &Anomaly) {
        match anomaly {
            Anomaly::Rewind { .. } => self.rewinds += 1,
            Anomaly::Underrun { .. } => self.underruns += 1,
            Anomaly::Overrun { .. } => self.overruns += 1,
            Anomaly::IllegalTransition { .. } => self.illegal_transitions += 1,
        }
    }

    /// Total anomalies across all categories.
    pub fn total(&self) -> u64 {
        self.rewinds + self.underruns + self.overruns + self.illegal_transitions
    }
}
