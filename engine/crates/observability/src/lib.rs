use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();
}

/// Per-tick counters for the world simulation.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub tick_number: u64,
    pub duration_us: u128,
    /// Scheduled tasks that fired during the tick.
    pub timers_fired: usize,
    /// Outbound packets resolved to sessions during the tick.
    pub packets_flushed: usize,
    pub entity_count: usize,
}

impl TickMetrics {
    pub fn over_budget(&self, budget_us: u128) -> bool {
        self.duration_us > budget_us
    }

    /// Warn when the tick took longer than `budget_us`, debug otherwise.
    pub fn log(&self, budget_us: u128) {
        if self.over_budget(budget_us) {
            tracing::warn!(
                tick = self.tick_number,
                duration_us = self.duration_us,
                timers = self.timers_fired,
                packets = self.packets_flushed,
                entities = self.entity_count,
                "tick exceeded budget ({}us > {}us)",
                self.duration_us,
                budget_us
            );
        } else {
            tracing::debug!(
                tick = self.tick_number,
                duration_us = self.duration_us,
                timers = self.timers_fired,
                packets = self.packets_flushed,
                entities = self.entity_count,
                "tick completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_check() {
        let metrics = TickMetrics {
            tick_number: 4,
            duration_us: 120_000,
            ..TickMetrics::default()
        };
        assert!(metrics.over_budget(100_000));
        assert!(!metrics.over_budget(150_000));
    }
}
