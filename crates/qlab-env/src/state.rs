use arrayvec::ArrayVec;

/// Maximum number of observation dimensions a Q-table can be indexed by.
pub const MAX_STATE_DIMS: usize = 8;

/// A discretized state: one bucket index per observation dimension.
pub type State = ArrayVec<usize, MAX_STATE_DIMS>;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum BucketError {
    #[display("expected {expected} bucket counts, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[display("dimension {dimension} has zero buckets")]
    ZeroBuckets { dimension: usize },
    #[display("dimension {dimension} has an empty range [{low}, {high}]")]
    EmptyRange { dimension: usize, low: f64, high: f64 },
    #[display("{count} dimensions exceed the supported maximum of {}", MAX_STATE_DIMS)]
    TooManyDimensions { count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Dimension {
    low: f64,
    high: f64,
    buckets: usize,
}

/// Maps continuous observations onto an evenly spaced bucket grid.
///
/// Values at or below a dimension's lower bound fall into the first bucket,
/// values at or above the upper bound into the last one, and everything in
/// between is rounded to the nearest grid point.
///
/// # Example
///
/// ```
/// use qlab_env::Bucketizer;
///
/// let bucketizer = Bucketizer::new(&[(-1.0, 1.0), (0.0, 10.0)], &[3, 1]).unwrap();
/// assert_eq!(bucketizer.bucketize(&[-5.0, 3.0]).as_slice(), &[0, 0]);
/// assert_eq!(bucketizer.bucketize(&[0.1, 3.0]).as_slice(), &[1, 0]);
/// assert_eq!(bucketizer.bucketize(&[0.9, 3.0]).as_slice(), &[2, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct Bucketizer {
    dims: ArrayVec<Dimension, MAX_STATE_DIMS>,
    shape: State,
}

impl Bucketizer {
    pub fn new(bounds: &[(f64, f64)], buckets: &[usize]) -> Result<Self, BucketError> {
        if bounds.len() > MAX_STATE_DIMS {
            return Err(BucketError::TooManyDimensions {
                count: bounds.len(),
            });
        }
        if bounds.len() != buckets.len() {
            return Err(BucketError::DimensionMismatch {
                expected: bounds.len(),
                actual: buckets.len(),
            });
        }

        let mut dims = ArrayVec::new();
        for (dimension, (&(low, high), &count)) in bounds.iter().zip(buckets).enumerate() {
            if count == 0 {
                return Err(BucketError::ZeroBuckets { dimension });
            }
            if high <= low {
                return Err(BucketError::EmptyRange {
                    dimension,
                    low,
                    high,
                });
            }
            dims.push(Dimension {
                low,
                high,
                buckets: count,
            });
        }
        let shape = buckets.iter().copied().collect();
        Ok(Self { dims, shape })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Discretizes `values`, one entry per configured dimension.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not have one entry per dimension.
    #[must_use]
    pub fn bucketize(&self, values: &[f64]) -> State {
        assert_eq!(values.len(), self.dims.len());
        self.dims
            .iter()
            .zip(values)
            .map(|(dim, &x)| dim.bucket(x))
            .collect()
    }
}

impl Dimension {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn bucket(&self, x: f64) -> usize {
        let last = self.buckets - 1;
        if x <= self.low {
            return 0;
        }
        if x >= self.high {
            return last;
        }
        let scaled = (last as f64) * (x - self.low) / (self.high - self.low);
        (scaled.round_ties_even() as usize).min(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bucket_dimension_is_always_zero() {
        let b = Bucketizer::new(&[(-4.8, 4.8)], &[1]).unwrap();
        for x in [-10.0, -1.0, 0.0, 3.0, 10.0] {
            assert_eq!(b.bucketize(&[x]).as_slice(), &[0]);
        }
    }

    #[test]
    fn out_of_range_values_clamp_to_edge_buckets() {
        let b = Bucketizer::new(&[(-0.5, 0.5)], &[7]).unwrap();
        assert_eq!(b.bucketize(&[-0.5]).as_slice(), &[0]);
        assert_eq!(b.bucketize(&[-3.0]).as_slice(), &[0]);
        assert_eq!(b.bucketize(&[0.5]).as_slice(), &[6]);
        assert_eq!(b.bucketize(&[42.0]).as_slice(), &[6]);
        assert_eq!(b.bucketize(&[0.0]).as_slice(), &[3]);
    }

    #[test]
    fn rejects_mismatched_configuration() {
        assert_eq!(
            Bucketizer::new(&[(0.0, 1.0)], &[1, 2]).unwrap_err(),
            BucketError::DimensionMismatch {
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(
            Bucketizer::new(&[(0.0, 1.0)], &[0]).unwrap_err(),
            BucketError::ZeroBuckets { dimension: 0 }
        );
        assert!(matches!(
            Bucketizer::new(&[(1.0, 1.0)], &[2]),
            Err(BucketError::EmptyRange { dimension: 0, .. })
        ));
    }

    #[test]
    fn shape_reports_bucket_counts() {
        let b = Bucketizer::new(&[(0.0, 1.0), (0.0, 2.0)], &[4, 2]).unwrap();
        assert_eq!(b.shape(), &[4, 2]);
    }
}
