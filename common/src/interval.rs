/// Returns true once at least `interval_ms` has passed between `last_ms`
/// and `now_ms` on a wrapping millisecond counter.
///
/// The difference is taken modulo 2^32, so a counter rollover between the
/// two timestamps still yields the true elapsed time as long as the interval
/// is far smaller than the counter period.
#[inline]
pub fn elapsed(last_ms: u32, now_ms: u32, interval_ms: u32) -> bool {
    now_ms.wrapping_sub(last_ms) >= interval_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_exactly_at_interval() {
        assert!(!elapsed(1_000, 60_999, 60_000));
        assert!(elapsed(1_000, 61_000, 60_000));
        assert!(elapsed(1_000, 61_001, 60_000));
    }

    #[test]
    fn first_sample_waits_one_interval_from_zero() {
        assert!(!elapsed(0, 0, 60_000));
        assert!(!elapsed(0, 59_999, 60_000));
        assert!(elapsed(0, 60_000, 60_000));
    }

    #[test]
    fn survives_counter_rollover() {
        let last = u32::MAX - 9_999;
        // 10_000 ms until wrap, then 50_000 ms past zero.
        assert!(elapsed(last, 50_000, 60_000));
        assert!(!elapsed(last, 49_999, 60_000));

        // A naive `now > last + interval` would wrap the sum and fire early.
        assert!(!elapsed(last, last.wrapping_add(59_999), 60_000));
    }

    #[test]
    fn matches_modular_difference_across_boundary() {
        let interval = 1_000;
        for last in [u32::MAX - 1_500, u32::MAX - 500, u32::MAX, 0, 250] {
            for step in [0_u32, 1, 999, 1_000, 1_001, 4_000] {
                let now = last.wrapping_add(step);
                assert_eq!(
                    elapsed(last, now, interval),
                    step >= interval,
                    "last={last} step={step}"
                );
            }
        }
    }
}
