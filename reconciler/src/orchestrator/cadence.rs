use std::time::Duration;
use sweeper_core::config::types::CadenceCfg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceChange {
    /// Zombie count above the high-water mark, interval halved.
    Tightened,
    /// Enough quiet cycles in a row, interval doubled.
    Relaxed,
    Unchanged,
}

/// Polling interval that reacts to how dirty the venue is.
#[derive(Debug, Clone)]
pub struct AdaptiveCadence {
    base: Duration,
    floor: Duration,
    ceiling: Duration,
    high_water_mark: usize,
    quiet_cycles_to_relax: u32,
    current: Duration,
    quiet_streak: u32,
}

impl AdaptiveCadence {
    pub fn new(
        base: Duration,
        floor: Duration,
        ceiling: Duration,
        high_water_mark: usize,
        quiet_cycles_to_relax: u32,
    ) -> Self {
        let floor = floor.min(ceiling);
        let base = base.clamp(floor, ceiling);
        Self {
            base,
            floor,
            ceiling,
            high_water_mark,
            quiet_cycles_to_relax: quiet_cycles_to_relax.max(1),
            current: base,
            quiet_streak: 0,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Feed one cycle's zombie count.
    pub fn observe(&mut self, found: usize) -> CadenceChange {
        if found > self.high_water_mark {
            self.quiet_streak = 0;
            let next = (self.current / 2).max(self.floor);
            self.current = next;
            return CadenceChange::Tightened;
        }

        if found > 0 {
            self.quiet_streak = 0;
            return CadenceChange::Unchanged;
        }

        self.quiet_streak += 1;
        if self.quiet_streak < self.quiet_cycles_to_relax {
            return CadenceChange::Unchanged;
        }
        self.quiet_streak = 0;
        let next = (self.current * 2).min(self.ceiling);
        if next == self.current {
            CadenceChange::Unchanged
        } else {
            self.current = next;
            CadenceChange::Relaxed
        }
    }
}

impl From<&CadenceCfg> for AdaptiveCadence {
    fn from(cfg: &CadenceCfg) -> Self {
        Self::new(
            Duration::from_secs(cfg.base_interval_secs),
            Duration::from_secs(cfg.floor_secs),
            Duration::from_secs(cfg.ceiling_secs),
            cfg.high_water_mark,
            cfg.quiet_cycles_to_relax,
        )
    }
}
