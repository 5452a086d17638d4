use governor::{clock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::config::RateLimitConfig;

/// Token bucket in front of the control socket so a misbehaving client
/// cannot flood the daemon with start/stop or settings writes.
pub struct ControlRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, clock::DefaultClock>,
    enabled: bool,
}

impl ControlRateLimiter {
    /// Zero rates are raised to one rather than rejected.
    pub fn new(commands_per_second: u32, burst_capacity: u32, enabled: bool) -> Self {
        let quota = Quota::per_second(at_least_one(commands_per_second))
            .allow_burst(at_least_one(burst_capacity));

        Self {
            limiter: RateLimiter::direct(quota),
            enabled,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.commands_per_second,
            config.burst_capacity,
            config.enabled,
        )
    }

    /// Non-blocking; `false` means the command should be refused.
    pub fn check(&self) -> bool {
        !self.enabled || self.limiter.check().is_ok()
    }
}

fn at_least_one(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value.max(1)).unwrap_or(NonZeroU32::MIN)
}
