use serde::{Deserialize, Serialize};

/// Summary of a generation's fitness distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[display("min {min:.2} / median {median:.2} / mean {mean:.2} / max {max:.2} (std {std_dev:.2})")]
pub struct FitnessStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// Upper median for even counts
    pub median: f32,
    pub std_dev: f32,
}

impl FitnessStats {
    /// Computes the summary; `None` for an empty input.
    ///
    /// ```
    /// # use flappy_training::stats::FitnessStats;
    /// let stats = FitnessStats::new([5.0, 2.0, 4.0, 1.0, 3.0]).unwrap();
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.mean, 3.0);
    /// assert_eq!(stats.median, 3.0);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f32::total_cmp);

        let min = *values.first()?;
        let max = *values.last()?;
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let median = values[values.len() / 2];
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;

        Some(Self {
            min,
            max,
            mean,
            median,
            std_dev: variance.sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert!(FitnessStats::new([]).is_none());
    }

    #[test]
    fn test_single_value() {
        let stats = FitnessStats::new([7.5]).unwrap();
        assert!((stats.min - 7.5).abs() < f32::EPSILON);
        assert!((stats.median - 7.5).abs() < f32::EPSILON);
        assert!(stats.std_dev.abs() < f32::EPSILON);
    }

    #[test]
    fn test_std_dev_and_upper_median() {
        let stats = FitnessStats::new([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((stats.mean - 5.0).abs() < 1e-6);
        assert!((stats.std_dev - 2.0).abs() < 1e-6);
        assert!((stats.median - 5.0).abs() < f32::EPSILON);
    }
}
