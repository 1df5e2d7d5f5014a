//! Experiment result summary and the t-test difference against a baseline.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF as _, StudentsT};

use crate::descriptive::{DescriptiveStats, median_of_sorted};

/// A previously measured sample the experiment is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// One-tailed confidence level, e.g. `0.95`.
    pub confidence_level: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub size: usize,
}

/// Summary of the episodes-to-solve recorded by an experiment.
///
/// An empty result list summarizes to zeros and a single result to itself
/// with zero spread. Quartiles are the medians of the lower and upper halves
/// of the sorted results, excluding the middle value for an odd count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub runs: usize,
    pub max: f64,
    pub min: f64,
    pub median: f64,
    pub inter_quartile_range: f64,
    /// Lower bound of the improvement over the baseline mean, 0 when the
    /// improvement is not significant.
    pub difference: f64,
    pub failed_runs: usize,
}

impl ExperimentSummary {
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(results: &[usize], failed_runs: usize, baseline: &Baseline) -> Self {
        let mut sorted = results.iter().map(|&r| r as f64).collect::<Vec<_>>();
        sorted.sort_by(f64::total_cmp);

        let Some(stats) = DescriptiveStats::from_sorted(&sorted) else {
            return Self::empty(failed_runs);
        };
        if sorted.len() == 1 {
            return Self {
                mean: stats.mean,
                std_dev: 0.0,
                runs: 1,
                max: stats.max,
                min: stats.min,
                median: stats.median,
                inter_quartile_range: 0.0,
                difference: 0.0,
                failed_runs,
            };
        }

        let half = sorted.len() / 2;
        let upper_start = half + sorted.len() % 2;
        let first_quartile = median_of_sorted(&sorted[..half]).unwrap_or(stats.median);
        let third_quartile = median_of_sorted(&sorted[upper_start..]).unwrap_or(stats.median);

        Self {
            mean: stats.mean,
            std_dev: stats.std_dev,
            runs: sorted.len(),
            max: stats.max,
            min: stats.min,
            median: stats.median,
            inter_quartile_range: third_quartile - first_quartile,
            difference: difference(baseline, stats.mean, stats.std_dev, sorted.len()),
            failed_runs,
        }
    }

    fn empty(failed_runs: usize) -> Self {
        Self {
            mean: 0.0,
            std_dev: 0.0,
            runs: 0,
            max: 0.0,
            min: 0.0,
            median: 0.0,
            inter_quartile_range: 0.0,
            difference: 0.0,
            failed_runs,
        }
    }
}

/// Pooled-variance one-tailed t-test lower bound of `baseline.mean - mean`,
/// floored at 0.
///
/// An unusable baseline (fewer than two combined degrees of freedom or a
/// confidence level outside `(0, 1)`) gives 0.
#[expect(clippy::cast_precision_loss)]
fn difference(baseline: &Baseline, mean: f64, std_dev: f64, size: usize) -> f64 {
    let dof = (baseline.size + size).saturating_sub(2);
    let Some(critical_value) = critical_value(baseline.confidence_level, dof as f64) else {
        return 0.0;
    };
    let (n1, n2) = (baseline.size as f64, size as f64);
    let sum_of_squares = |std: f64, n: f64| std * std * (n - 1.0);
    let pooled_variance =
        (sum_of_squares(baseline.std_dev, n1) + sum_of_squares(std_dev, n2)) / dof as f64;
    let noise = pooled_variance.sqrt() * (1.0 / n1 + 1.0 / n2).sqrt();
    f64::max((baseline.mean - mean) - critical_value * noise, 0.0)
}

/// One-tailed Student-t critical value, or `None` unless `0 < confidence < 1`
/// and `dof > 0`.
fn critical_value(confidence: f64, dof: f64) -> Option<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let t = StudentsT::new(0.0, 1.0, dof).ok()?;
    Some(t.inverse_cdf(confidence)).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASELINE: Baseline = Baseline {
        confidence_level: 0.95,
        mean: 257.27,
        std_dev: 14.94,
        size: 30,
    };

    #[test]
    fn no_results_summarize_to_zeros() {
        let summary = ExperimentSummary::new(&[], 4, &BASELINE);
        assert_eq!(summary, ExperimentSummary::empty(4));
    }

    #[test]
    fn single_result_has_no_spread() {
        let summary = ExperimentSummary::new(&[42], 0, &BASELINE);
        assert_eq!(summary.mean, 42.0);
        assert_eq!(summary.median, 42.0);
        assert_eq!(summary.min, 42.0);
        assert_eq!(summary.max, 42.0);
        assert_eq!(summary.std_dev, 0.0);
        assert_eq!(summary.inter_quartile_range, 0.0);
        assert_eq!(summary.difference, 0.0);
        assert_eq!(summary.runs, 1);
    }

    #[test]
    fn quartiles_exclude_the_middle_of_odd_samples() {
        let summary = ExperimentSummary::new(&[5, 1, 4, 2, 3], 0, &BASELINE);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.inter_quartile_range, 3.0);

        let summary = ExperimentSummary::new(&[40, 10, 30, 20], 0, &BASELINE);
        assert_eq!(summary.median, 25.0);
        assert_eq!(summary.inter_quartile_range, 20.0);
    }

    #[test]
    fn significant_improvement_yields_lower_bound() {
        let summary = ExperimentSummary::new(&[100, 110, 120, 130], 2, &BASELINE);
        assert_eq!(summary.mean, 115.0);
        assert!((summary.std_dev - 12.909_944).abs() < 1e-6);
        assert!((summary.difference - 128.960_382).abs() < 1e-4);
        assert_eq!(summary.failed_runs, 2);
    }

    #[test]
    fn slower_results_floor_difference_at_zero() {
        let summary = ExperimentSummary::new(&[300, 310, 290], 0, &BASELINE);
        assert_eq!(summary.difference, 0.0);
    }

    #[test]
    fn unusable_baseline_gives_zero_difference() {
        let baseline = Baseline {
            confidence_level: 1.5,
            ..BASELINE
        };
        let summary = ExperimentSummary::new(&[10, 20], 0, &baseline);
        assert_eq!(summary.difference, 0.0);
    }

    #[test]
    fn critical_values_match_t_tables() {
        let cases = [
            (0.95, 10.0, 1.812_461),
            (0.975, 5.0, 2.570_582),
            (0.95, 32.0, 1.693_889),
            (0.95, 58.0, 1.671_553),
        ];
        for (confidence, dof, expected) in cases {
            let value = critical_value(confidence, dof).unwrap();
            assert!((value - expected).abs() < 1e-5, "{value} != {expected}");
        }
        assert!(critical_value(1.0, 10.0).is_none());
        assert!(critical_value(0.95, 0.0).is_none());
    }

    #[test]
    fn summary_serializes_with_field_names() {
        let summary = ExperimentSummary::new(&[1, 2], 0, &BASELINE);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["inter_quartile_range"], 1.0);
        assert_eq!(json["runs"], 2);
    }
}
