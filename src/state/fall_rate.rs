//! Fall-rate level shared by every arena.

use tracing::debug;

use crate::{config::FallRateConfig, state::ports::SessionPorts};

/// Current fall-speed level of every arena, clamped to configured bounds.
#[derive(Debug, Clone)]
pub struct FallRateController {
    level: u32,
    bounds: FallRateConfig,
}

impl FallRateController {
    /// Start at the configured base level.
    pub fn new(bounds: FallRateConfig) -> Self {
        Self {
            level: bounds.base,
            bounds,
        }
    }

    /// Current level.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Raise the level by one step; stays put at the maximum.
    pub fn increase(&mut self, ports: &SessionPorts) -> u32 {
        self.set(self.level.saturating_add(1), ports)
    }

    /// Lower the level by one step; stays put at the minimum.
    pub fn decrease(&mut self, ports: &SessionPorts) -> u32 {
        self.set(self.level.saturating_sub(1), ports)
    }

    /// Return to the base level and announce it, even when unchanged.
    pub fn reset(&mut self, ports: &SessionPorts) {
        self.level = self.bounds.base;
        ports.fall_rate(self.level);
    }

    fn set(&mut self, requested: u32, ports: &SessionPorts) -> u32 {
        let next = requested.clamp(self.bounds.min, self.bounds.max);
        if next != self.level {
            debug!(from = self.level, to = next, "fall rate changed");
            self.level = next;
            ports.fall_rate(next);
        }
        self.level
    }
}
