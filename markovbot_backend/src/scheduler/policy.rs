use std::time::Duration;

use rand::Rng;

use crate::config::BotConfig;

/// Rolls are drawn from `[0, ROLL_SPACE)`.
pub const ROLL_SPACE: u32 = 100;

/// What to do about one admitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerDecision {
    /// Reply right away. The autonomous policy never picks this; it exists so
    /// callers can express an immediate reply through the same path.
    Immediate,
    Deferred(Duration),
    None,
}

/// Chance-based autonomous reply policy.
///
/// A roll below `chance_percent` defers a reply by a uniform number of whole
/// minutes below `max_delay_mins`; anything else stays quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyPolicy {
    pub chance_percent: u32,
    pub max_delay_mins: u64,
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self {
            chance_percent: 6,
            max_delay_mins: 180,
        }
    }
}

impl ReplyPolicy {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            chance_percent: config.deferred_chance_percent,
            max_delay_mins: config.max_deferred_delay_mins,
        }
    }

    pub fn decide<R: Rng + ?Sized>(&self, rng: &mut R) -> SchedulerDecision {
        let roll = rng.gen_range(0..ROLL_SPACE);
        if roll < self.chance_percent {
            SchedulerDecision::Deferred(self.draw_delay(rng))
        } else {
            SchedulerDecision::None
        }
    }

    fn draw_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_delay_mins == 0 {
            return Duration::ZERO;
        }
        let minutes = rng.gen_range(0..self.max_delay_mins);
        Duration::from_secs(minutes * 60)
    }
}
