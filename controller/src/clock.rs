use std::time::{Duration, Instant};

use fridge_common::Clock;

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
    offset_ms: u32,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    pub fn with_offset(offset_ms: u32) -> Self {
        Self {
            start: Instant::now(),
            offset_ms,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        wrapping_ms(self.start.elapsed(), self.offset_ms)
    }
}

fn wrapping_ms(elapsed: Duration, offset_ms: u32) -> u32 {
    (elapsed.as_millis() as u32).wrapping_add(offset_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_counter_width() {
        let elapsed = Duration::from_millis(u64::from(u32::MAX) + 6);
        assert_eq!(wrapping_ms(elapsed, 0), 5);
    }

    #[test]
    fn offset_wraps_past_zero() {
        let elapsed = Duration::from_millis(1_500);
        assert_eq!(wrapping_ms(elapsed, u32::MAX - 499), 1_000);
    }

    #[test]
    fn clock_starts_near_offset() {
        let clock = MonotonicClock::with_offset(42_000);
        let now = clock.now_ms();
        assert!(now.wrapping_sub(42_000) < 1_000);
    }
}
