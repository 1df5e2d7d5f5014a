//! Summary statistics for training experiments.
//!
//! # Modules
//!
//! - [`descriptive`]: mean, sample standard deviation, median and extremes
//! - [`summary`]: the [`ExperimentSummary`](summary::ExperimentSummary) of a
//!   list of episodes-to-solve, including the one-tailed t-test difference
//!   against a [`Baseline`](summary::Baseline), with critical values from
//!   `statrs`' Student-t distribution
//!
//! # Examples
//!
//! ```
//! use qlab_stats::summary::{Baseline, ExperimentSummary};
//!
//! let baseline = Baseline { confidence_level: 0.95, mean: 250.0, std_dev: 15.0, size: 30 };
//! let summary = ExperimentSummary::new(&[120, 100, 110, 130], 1, &baseline);
//! assert_eq!(summary.runs, 4);
//! assert_eq!(summary.median, 115.0);
//! assert_eq!(summary.inter_quartile_range, 20.0);
//! assert!(summary.difference > 100.0);
//! ```

pub mod descriptive;
pub mod summary;
