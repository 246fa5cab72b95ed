use crate::config::ControlConfig;

/// Inside the dead band, thresholds included, the current state is kept.
#[inline]
pub fn decide(current_temp_c: f32, relay_energized: bool, config: &ControlConfig) -> bool {
    if current_temp_c > config.high_threshold_c {
        true
    } else if current_temp_c < config.low_threshold_c {
        false
    } else {
        relay_energized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freezer() -> ControlConfig {
        ControlConfig {
            low_threshold_c: -18.0,
            high_threshold_c: -15.0,
            ..ControlConfig::default()
        }
    }

    #[test]
    fn too_warm_forces_cooling_from_either_state() {
        let config = freezer();
        for temp in [-14.99, -14.0, 0.0, 30.0] {
            assert!(decide(temp, false, &config), "temp={temp}");
            assert!(decide(temp, true, &config), "temp={temp}");
        }
    }

    #[test]
    fn cold_enough_stops_cooling_from_either_state() {
        let config = freezer();
        for temp in [-18.01, -19.0, -30.0] {
            assert!(!decide(temp, false, &config), "temp={temp}");
            assert!(!decide(temp, true, &config), "temp={temp}");
        }
    }

    #[test]
    fn dead_band_holds_previous_state() {
        let config = freezer();
        for temp in [-18.0, -17.5, -16.5, -15.01, -15.0] {
            assert!(!decide(temp, false, &config), "temp={temp}");
            assert!(decide(temp, true, &config), "temp={temp}");
        }
    }

    #[test]
    fn thresholds_are_inside_the_band() {
        let config = freezer();
        assert!(!decide(config.high_threshold_c, false, &config));
        assert!(decide(config.low_threshold_c, true, &config));
    }
}
