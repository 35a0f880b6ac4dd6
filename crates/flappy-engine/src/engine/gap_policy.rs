//! Gap-center selection for newly spawned obstacle pairs.
//!
//! Gap centers are drawn from two candidate ranges, one inside the upper third of
//! the world and one inside the lower third. Each range is shrunk so the whole gap
//! fits inside its third. A fair coin picks the range, then the center is drawn
//! uniformly within it, giving a bimodal distribution with no gaps hugging the
//! world edges.

use rand::Rng;

use crate::engine::world_config::WorldConfig;

/// Closed interval of allowed gap centers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapRange {
    pub min: f32,
    pub max: f32,
}

impl GapRange {
    #[must_use]
    pub fn contains(&self, center: f32) -> bool {
        (self.min..=self.max).contains(&center)
    }

    fn within_band(band_top: f32, band_bottom: f32, config: &WorldConfig) -> Self {
        let half = config.gap_height / 2.0;
        let min = band_top + half;
        let max = band_bottom - half;
        if min <= max {
            return Self { min, max };
        }
        // gap taller than the band: pin to the band's middle, still inside the world
        let mid = if half <= config.height - half {
            ((band_top + band_bottom) / 2.0).clamp(half, config.height - half)
        } else {
            // gap taller than the world
            config.height / 2.0
        };
        Self { min: mid, max: mid }
    }
}

/// Returns the `[upper, lower]` candidate ranges for `config`.
#[must_use]
pub fn candidate_ranges(config: &WorldConfig) -> [GapRange; 2] {
    let third = config.height / 3.0;
    [
        GapRange::within_band(0.0, third, config),
        GapRange::within_band(2.0 * third, config.height, config),
    ]
}

/// Draws the gap center of the next obstacle pair.
pub fn sample_gap_center<R>(rng: &mut R, config: &WorldConfig) -> f32
where
    R: Rng + ?Sized,
{
    let [upper, lower] = candidate_ranges(config);
    let range = if rng.random_bool(0.5) { upper } else { lower };
    if range.min >= range.max {
        return range.min;
    }
    rng.random_range(range.min..=range.max)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_default_ranges() {
        let [upper, lower] = candidate_ranges(&WorldConfig::default());
        assert!((upper.min - 85.0).abs() < 1e-4);
        assert!((upper.max - 115.0).abs() < 1e-4);
        assert!((lower.min - 485.0).abs() < 1e-4);
        assert!((lower.max - 515.0).abs() < 1e-4);
    }

    #[test]
    fn test_samples_stay_in_one_band_and_inside_world() {
        let config = WorldConfig::default();
        let [upper, lower] = candidate_ranges(&config);
        let mut rng = Pcg32::seed_from_u64(0x5eed);
        let mut seen_upper = false;
        let mut seen_lower = false;
        for _ in 0..2000 {
            let center = sample_gap_center(&mut rng, &config);
            let in_upper = upper.contains(center);
            let in_lower = lower.contains(center);
            assert!(in_upper != in_lower, "center {center} not in exactly one range");
            assert!(center - config.gap_height / 2.0 >= 0.0);
            assert!(center + config.gap_height / 2.0 <= config.height);
            seen_upper |= in_upper;
            seen_lower |= in_lower;
        }
        assert!(seen_upper && seen_lower);
    }

    #[test]
    fn test_gap_taller_than_third_collapses_inside_world() {
        let config = WorldConfig {
            gap_height: 300.0,
            ..WorldConfig::default()
        };
        let [upper, lower] = candidate_ranges(&config);
        assert!((upper.min - upper.max).abs() < f32::EPSILON);
        assert!((lower.min - lower.max).abs() < f32::EPSILON);
        assert!(upper.min - 150.0 >= 0.0);
        assert!(lower.max + 150.0 <= 600.0);

        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..100 {
            let center = sample_gap_center(&mut rng, &config);
            assert!(upper.contains(center) || lower.contains(center));
        }
    }

    #[test]
    fn test_gap_taller_than_world_is_centered() {
        let config = WorldConfig {
            gap_height: 900.0,
            ..WorldConfig::default()
        };
        for range in candidate_ranges(&config) {
            assert!((range.min - 300.0).abs() < f32::EPSILON);
            assert!((range.max - 300.0).abs() < f32::EPSILON);
        }
        let mut rng = Pcg32::seed_from_u64(2);
        assert!((sample_gap_center(&mut rng, &config) - 300.0).abs() < f32::EPSILON);
    }
}
