use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_BRIGHTNESS_EVERY: Duration = Duration::from_secs(10);
pub const DEFAULT_HEALTH_EVERY: Duration = Duration::from_secs(10);
pub const DEFAULT_COLOR_EVERY: Duration = Duration::from_secs(3600);
pub const DEFAULT_BREAK_AFTER: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorIntervals {
    pub brightness_every: Duration,
    pub health_every: Duration,
    pub color_every: Duration,
    pub break_after: Duration,
}

impl Default for MonitorIntervals {
    fn default() -> Self {
        Self {
            brightness_every: DEFAULT_BRIGHTNESS_EVERY,
            health_every: DEFAULT_HEALTH_EVERY,
            color_every: DEFAULT_COLOR_EVERY,
            break_after: DEFAULT_BREAK_AFTER,
        }
    }
}

impl MonitorIntervals {
    pub fn validate(&self) -> Result<(), String> {
        let named = [
            ("brightness interval", self.brightness_every),
            ("health interval", self.health_every),
            ("color interval", self.color_every),
            ("break threshold", self.break_after),
        ];
        for (name, value) in named {
            if value.is_zero() {
                return Err(format!("{name} must be greater than 0"));
            }
        }
        Ok(())
    }
}

/// Tracks when the next break reminder is due. The reference moves forward
/// each time a reminder fires; the session start itself is never touched.
#[derive(Debug, Clone)]
pub struct BreakTimer {
    break_after: Duration,
    reference: Instant,
}

impl BreakTimer {
    pub fn new(break_after: Duration, started_at: Instant) -> Self {
        Self {
            break_after,
            reference: started_at,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.reference) >= self.break_after
    }

    pub fn time_until_due(&self, now: Instant) -> Duration {
        self.break_after
            .saturating_sub(now.saturating_duration_since(self.reference))
    }

    pub fn mark_reminded(&mut self, now: Instant) {
        self.reference = now;
    }
}
