use serde::Serialize;

/// Point-in-time delivery counters for one sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub name: &'static str,
    pub written: u64,
    pub failed: u64,
    pub rotations: u64,
    /// Rotations that failed; the records themselves were written.
    pub rotate_failures: u64,
}

/// Point-in-time counters for a logger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoggerStats {
    /// Records formatted and handed to the sinks.
    pub accepted: u64,
    /// Records below the minimum level.
    pub filtered: u64,
    /// Records logged after shutdown.
    pub rejected: u64,
    /// Records emitted in degraded JSON form.
    pub degraded: u64,
    pub sinks: Vec<SinkStats>,
}

impl LoggerStats {
    /// Total failed writes across all sinks.
    #[must_use]
    pub fn total_failed(&self) -> u64 {
        self.sinks
            .iter()
            .fold(0, |acc, sink| acc.saturating_add(sink.failed))
    }

    #[must_use]
    pub fn sink(&self, name: &str) -> Option<&SinkStats> {
        self.sinks.iter().find(|sink| sink.name == name)
    }
}
