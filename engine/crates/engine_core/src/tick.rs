use std::time::{Duration, Instant};

use observability::TickMetrics;

/// Tick loop configuration.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Milliseconds between ticks; also the virtual time advanced per tick.
    pub update_time_ms: u64,
    /// Maximum ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            update_time_ms: 100,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.update_time_ms.max(1))
    }

    pub fn budget_us(&self) -> u128 {
        self.tick_duration().as_micros()
    }
}

/// Anything driven one fixed step at a time.
pub trait Simulation {
    /// Advance by `elapsed_ms` of virtual time and do one tick of work.
    fn step(&mut self, elapsed_ms: u64) -> TickMetrics;
}

/// Fixed-step driver: each tick advances the simulation by exactly
/// `update_time_ms` and sleeps for whatever wall time is left.
#[derive(Debug, Clone)]
pub struct TickLoop {
    pub config: TickConfig,
    pub current_tick: u64,
}

impl TickLoop {
    pub fn new(config: TickConfig) -> Self {
        Self {
            config,
            current_tick: 0,
        }
    }

    pub fn step<S: Simulation + ?Sized>(&mut self, sim: &mut S) -> TickMetrics {
        let start = Instant::now();
        let mut metrics = sim.step(self.config.update_time_ms);
        self.current_tick += 1;
        metrics.tick_number = self.current_tick;
        metrics.duration_us = start.elapsed().as_micros();
        metrics
    }

    /// Run until `should_stop` returns true or `max_ticks` is reached.
    /// Returns the number of ticks executed.
    pub fn run<S, F>(&mut self, sim: &mut S, should_stop: F) -> u64
    where
        S: Simulation + ?Sized,
        F: Fn() -> bool,
    {
        let tick_duration = self.config.tick_duration();
        let budget = self.config.budget_us();
        let first = self.current_tick;

        loop {
            if self.config.max_ticks > 0 && self.current_tick >= self.config.max_ticks {
                break;
            }
            if should_stop() {
                tracing::info!(tick = self.current_tick, "tick loop: stop requested");
                break;
            }

            let tick_start = Instant::now();
            let metrics = self.step(sim);
            metrics.log(budget);

            // Sleep until next tick
            let elapsed = tick_start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            }
        }

        self.current_tick - first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Clock {
        now: u64,
        steps: usize,
    }

    impl Simulation for Clock {
        fn step(&mut self, elapsed_ms: u64) -> TickMetrics {
            self.now += elapsed_ms;
            self.steps += 1;
            TickMetrics {
                entity_count: self.steps,
                ..TickMetrics::default()
            }
        }
    }

    #[test]
    fn tick_config_defaults() {
        let config = TickConfig::default();
        assert_eq!(config.update_time_ms, 100);
        assert_eq!(config.tick_duration().as_millis(), 100);
        assert_eq!(config.budget_us(), 100_000);
    }

    #[test]
    fn single_step_advances_virtual_time() {
        let mut tick_loop = TickLoop::new(TickConfig {
            update_time_ms: 50,
            max_ticks: 1,
        });
        let mut clock = Clock::default();
        let metrics = tick_loop.step(&mut clock);
        assert_eq!(metrics.tick_number, 1);
        assert_eq!(metrics.entity_count, 1);
        assert_eq!(clock.now, 50);
    }

    #[test]
    fn run_stops_at_max_ticks() {
        let mut tick_loop = TickLoop::new(TickConfig {
            update_time_ms: 1,
            max_ticks: 10,
        });
        let mut clock = Clock::default();
        assert_eq!(tick_loop.run(&mut clock, || false), 10);
        assert_eq!(clock.now, 10);
    }

    #[test]
    fn run_honours_stop_flag() {
        let mut tick_loop = TickLoop::new(TickConfig {
            update_time_ms: 1,
            max_ticks: 0,
        });
        let mut clock = Clock::default();
        assert_eq!(tick_loop.run(&mut clock, || true), 0);
        assert_eq!(clock.steps, 0);
    }
}
