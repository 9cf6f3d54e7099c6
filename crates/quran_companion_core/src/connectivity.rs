//! crates/quran_companion_core/src/connectivity.rs
//!
//! Turns the result of a timed network probe into a `ConnectionQuality`.

use crate::domain::ConnectionQuality;
use std::time::Duration;

/// What happened to a single probe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The request completed with a success status after `elapsed`.
    Completed { elapsed: Duration },
    /// The request was aborted at the probe deadline.
    TimedOut,
    /// The request failed (no route, DNS failure, non-success status).
    Failed,
}

/// Classifies a probe: anything slower than `slow_after` is `Slow`.
pub fn classify(outcome: ProbeOutcome, slow_after: Duration) -> ConnectionQuality {
    match outcome {
        ProbeOutcome::Completed { elapsed } if elapsed > slow_after => ConnectionQuality::Slow,
        ProbeOutcome::Completed { .. } => ConnectionQuality::Good,
        ProbeOutcome::TimedOut => ConnectionQuality::Slow,
        ProbeOutcome::Failed => ConnectionQuality::Offline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_latency_and_failure() {
        let threshold = Duration::from_millis(2000);
        let fast = ProbeOutcome::Completed { elapsed: Duration::from_millis(120) };
        let sluggish = ProbeOutcome::Completed { elapsed: Duration::from_millis(2500) };
        assert_eq!(classify(fast, threshold), ConnectionQuality::Good);
        assert_eq!(classify(sluggish, threshold), ConnectionQuality::Slow);
        assert_eq!(classify(ProbeOutcome::TimedOut, threshold), ConnectionQuality::Slow);
        assert_eq!(classify(ProbeOutcome::Failed, threshold), ConnectionQuality::Offline);
    }
}
