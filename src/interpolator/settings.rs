//! Serialized configuration payload for the interpolator.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_AUDIO_LATENCY_USECS;

/// Host configuration for the interpolator.
///
/// The latency is the total end-to-end time from a byte being written into
/// the FIFO to it being rendered; it must cover the real FIFO depth for the
/// loop to track smoothly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolatorSettings {
    pub latency_usecs: i64,
}

impl InterpolatorSettings {
    /// Create a settings payload with an explicit latency.
    pub fn new(latency_usecs: i64) -> Self {
        Self { latency_usecs }
    }

    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for InterpolatorSettings {
    fn default() -> Self {
        Self {
            latency_usecs: DEFAULT_AUDIO_LATENCY_USECS,
        }
    }
}
