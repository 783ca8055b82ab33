//! How pixel values are grouped into buckets.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::AggregateError;
use crate::legend::Legend;

/// Grouping rule for a value count.
#[derive(Debug, Clone)]
pub enum Binning {
    /// One bucket per distinct value.
    Categorical,
    /// Fixed-width intervals `[k·width, (k+1)·width)`.
    Continuous { width: f64 },
    /// One bucket per legend entry; the first matching entry counts.
    Legend(Arc<Legend>),
}

impl Binning {
    /// Continuous binning, rejecting widths that are not finite and positive.
    pub fn continuous(width: f64) -> Result<Self, AggregateError> {
        if !width.is_finite() || width <= 0.0 {
            return Err(AggregateError::InvalidBucketWidth(width));
        }
        Ok(Binning::Continuous { width })
    }

    /// Bucket of a valid (non-nodata) value, `None` if the legend has no
    /// entry for it.
    #[inline]
    pub fn bucket(&self, value: f64) -> Option<Bucket> {
        match self {
            Binning::Categorical => Some(Bucket::value(value)),
            Binning::Continuous { width } => Some(Bucket::Interval((value / width).floor() as i64)),
            Binning::Legend(legend) => legend.match_index(value).map(Bucket::Entry),
        }
    }

    /// Human-readable label of a bucket under this rule.
    pub fn label(&self, bucket: &Bucket) -> String {
        match (self, bucket) {
            (Binning::Continuous { width }, Bucket::Interval(k)) => {
                format!("({}, {})", *k as f64 * width, (*k + 1) as f64 * width)
            }
            (Binning::Legend(legend), Bucket::Entry(index)) => legend
                .entry(*index)
                .map(|e| e.expression.clone())
                .unwrap_or_else(|| bucket.to_string()),
            _ => bucket.to_string(),
        }
    }
}

/// Identity of a histogram bucket.
#[derive(Debug, Clone, Copy)]
pub enum Bucket {
    /// An exact value; `-0.0` is stored as `0.0`.
    Value(f64),
    /// Interval index `floor(value / width)`.
    Interval(i64),
    /// Rank position of a legend entry.
    Entry(usize),
}

impl Bucket {
    #[inline]
    pub fn value(v: f64) -> Self {
        Bucket::Value(if v == 0.0 { 0.0 } else { v })
    }

    fn rank(&self) -> u8 {
        match self {
            Bucket::Value(_) => 0,
            Bucket::Interval(_) => 1,
            Bucket::Entry(_) => 2,
        }
    }
}

impl PartialEq for Bucket {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Bucket {}

impl PartialOrd for Bucket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bucket {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Bucket::Value(a), Bucket::Value(b)) => a.total_cmp(b),
            (Bucket::Interval(a), Bucket::Interval(b)) => a.cmp(b),
            (Bucket::Entry(a), Bucket::Entry(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Value(v) => write!(f, "{}", v),
            Bucket::Interval(k) => write!(f, "#{}", k),
            Bucket::Entry(i) => write!(f, "entry {}", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legend::{LegendEntry, LegendSemantics, Rgba};

    #[test]
    fn test_continuous_width_validation() {
        assert!(Binning::continuous(0.5).is_ok());
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Binning::continuous(bad),
                Err(AggregateError::InvalidBucketWidth(_))
            ));
        }
    }

    #[test]
    fn test_interval_index() {
        let binning = Binning::continuous(0.5).unwrap();
        assert_eq!(binning.bucket(0.0), Some(Bucket::Interval(0)));
        assert_eq!(binning.bucket(0.49), Some(Bucket::Interval(0)));
        assert_eq!(binning.bucket(0.5), Some(Bucket::Interval(1)));
        assert_eq!(binning.bucket(-0.1), Some(Bucket::Interval(-1)));
        assert_eq!(binning.label(&Bucket::Interval(3)), "(1.5, 2)");
    }

    #[test]
    fn test_categorical_normalises_negative_zero() {
        let binning = Binning::Categorical;
        assert_eq!(binning.bucket(-0.0), binning.bucket(0.0));
        assert_eq!(binning.label(&Bucket::value(2.0)), "2");
        assert_eq!(binning.label(&Bucket::value(2.5)), "2.5");
    }

    #[test]
    fn test_legend_buckets() {
        let legend = Legend::new(
            "t",
            vec![(
                LegendEntry::new(LegendSemantics::new("mid"), "(x >= 2) & (x < 5)", Rgba::opaque(1, 2, 3)),
                0,
            )],
        )
        .unwrap();
        let binning = Binning::Legend(Arc::new(legend));
        assert_eq!(binning.bucket(3.0), Some(Bucket::Entry(0)));
        assert_eq!(binning.bucket(7.0), None);
        assert_eq!(binning.label(&Bucket::Entry(0)), "(x >= 2) & (x < 5)");
    }

    #[test]
    fn test_bucket_ordering() {
        let mut buckets = vec![Bucket::value(3.0), Bucket::value(-1.0), Bucket::value(2.0)];
        buckets.sort();
        assert_eq!(buckets, vec![Bucket::value(-1.0), Bucket::value(2.0), Bucket::value(3.0)]);
    }
}
