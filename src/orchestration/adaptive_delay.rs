//! # Adaptive Delay
//!
//! Inter-tick delay calculator. After every tick the scheduler feeds in how
//! many tasks it claimed and how long the tick took; the delay widens when
//! idle or lightly loaded, narrows when the batch saturates, and always
//! covers a tick that overran it. Always within `[min_delay, max_delay]`.

use std::time::Duration;

use crate::config::SchedulerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptiveDelay {
    current_ms: u64,
    min_ms: u64,
    max_ms: u64,
    batch_size: usize,
    idle_step_ms: u64,
    load_step_ms: u64,
    light_load_step_ms: u64,
    error_penalty_ms: u64,
    overrun_margin_ms: u64,
}

impl AdaptiveDelay {
    pub fn new(config: &SchedulerConfig) -> Self {
        let min_ms = config.min_delay_ms;
        let max_ms = config.max_delay_ms.max(min_ms);
        Self {
            current_ms: config.initial_delay_ms.clamp(min_ms, max_ms),
            min_ms,
            max_ms,
            batch_size: config.batch_size,
            idle_step_ms: config.idle_step_ms,
            load_step_ms: config.load_step_ms,
            light_load_step_ms: config.light_load_step_ms,
            error_penalty_ms: config.error_penalty_ms,
            overrun_margin_ms: config.overrun_margin_ms,
        }
    }

    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Fold in one completed tick and return the next delay.
    pub fn observe(&mut self, processed: usize, tick_duration: Duration) -> Duration {
        let mut next = if processed == 0 {
            self.widen(self.idle_step_ms)
        } else if processed >= self.batch_size {
            self.narrow(self.load_step_ms)
        } else if processed < self.batch_size / 2 {
            self.widen(self.light_load_step_ms)
        } else {
            self.current_ms
        };

        let duration_ms = u64::try_from(tick_duration.as_millis()).unwrap_or(u64::MAX);
        if duration_ms > next {
            next = duration_ms
                .saturating_add(self.overrun_margin_ms)
                .min(self.max_ms);
        }

        self.current_ms = next.clamp(self.min_ms, self.max_ms);
        self.current()
    }

    /// Widen the delay after a failed tick and return it.
    pub fn penalize(&mut self) -> Duration {
        self.current_ms = self.widen(self.error_penalty_ms);
        self.current()
    }

    fn widen(&self, step_ms: u64) -> u64 {
        self.current_ms.saturating_add(step_ms).min(self.max_ms)
    }

    fn narrow(&self, step_ms: u64) -> u64 {
        self.current_ms.saturating_sub(step_ms).max(self.min_ms)
    }
}
