/// Descriptive statistics summarizing a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Middle value, or the mean of the two middle values for an even count.
    pub median: f64,
    /// Bessel-corrected sample variance (0 for a single value).
    pub variance: f64,
    pub std_dev: f64,
}

impl DescriptiveStats {
    /// Computes statistics from unsorted values.
    ///
    /// Returns `None` for an empty sample.
    ///
    /// ```
    /// # use qlab_stats::descriptive::DescriptiveStats;
    /// let stats = DescriptiveStats::new([5.0, 2.0, 4.0, 1.0]).unwrap();
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.mean, 3.0);
    /// assert_eq!(stats.median, 3.0);
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        Self::from_sorted(&values)
    }

    /// Computes statistics from values sorted in ascending order.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64]) -> Option<Self> {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let min = *sorted_values.first()?;
        let max = *sorted_values.last()?;
        let n = sorted_values.len() as f64;
        let mean = sorted_values.iter().sum::<f64>() / n;
        let median = median_of_sorted(sorted_values)?;
        let variance = if sorted_values.len() < 2 {
            0.0
        } else {
            sorted_values
                .iter()
                .map(|v| (v - mean).powi(2))
                .sum::<f64>()
                / (n - 1.0)
        };

        Some(Self {
            min,
            max,
            mean,
            median,
            variance,
            std_dev: variance.sqrt(),
        })
    }
}

/// Median of an ascending slice, `None` when empty.
#[must_use]
pub fn median_of_sorted(sorted_values: &[f64]) -> Option<f64> {
    let len = sorted_values.len();
    if len == 0 {
        return None;
    }
    let mid = len / 2;
    if len % 2 == 1 {
        Some(sorted_values[mid])
    } else {
        Some(f64::midpoint(sorted_values[mid - 1], sorted_values[mid]))
    }
}
