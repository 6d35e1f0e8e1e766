//! Transport state for the stream clock.

/// High-level transport state of the interpolated clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Clock frozen, FIFO conceptually flushed. Initial state.
    Stopped,
    /// Clock advancing under control of the feedback loop.
    Rolling,
    /// Clock frozen, FIFO state preserved for resume.
    Paused,
}

impl TransportState {
    /// Short lowercase name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Rolling => "rolling",
            Self::Paused => "paused",
        }
    }
}
