//! Bucket counts with nodata bookkeeping.

use std::collections::BTreeMap;

use super::{Binning, Bucket};

/// Counts per bucket plus the pixels that were not counted.
///
/// Every examined pixel ends up in exactly one of: a bucket, `nodata`,
/// `clipped` (centre outside the clip extent) or `unmatched` (no legend
/// entry applies).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    buckets: BTreeMap<Bucket, u64>,
    nodata: u64,
    clipped: u64,
    unmatched: u64,
    total: u64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn count(&mut self, bucket: Bucket) {
        *self.buckets.entry(bucket).or_insert(0) += 1;
        self.total += 1;
    }

    #[inline]
    pub(crate) fn count_nodata(&mut self) {
        self.nodata += 1;
        self.total += 1;
    }

    #[inline]
    pub(crate) fn count_clipped(&mut self) {
        self.clipped += 1;
        self.total += 1;
    }

    #[inline]
    pub(crate) fn count_unmatched(&mut self) {
        self.unmatched += 1;
        self.total += 1;
    }

    /// Key-wise sum. Commutative and associative.
    pub fn merge(&mut self, other: &Histogram) {
        for (bucket, count) in &other.buckets {
            *self.buckets.entry(*bucket).or_insert(0) += count;
        }
        self.nodata += other.nodata;
        self.clipped += other.clipped;
        self.unmatched += other.unmatched;
        self.total += other.total;
    }

    pub fn merged(mut self, other: Histogram) -> Histogram {
        if self.total < other.total {
            let mut other = other;
            other.merge(&self);
            return other;
        }
        self.merge(&other);
        self
    }

    pub fn get(&self, bucket: &Bucket) -> u64 {
        self.buckets.get(bucket).copied().unwrap_or(0)
    }

    /// Buckets in ascending order.
    pub fn buckets(&self) -> impl Iterator<Item = (&Bucket, u64)> {
        self.buckets.iter().map(|(b, c)| (b, *c))
    }

    /// Pixels counted into buckets.
    pub fn counted(&self) -> u64 {
        self.buckets.values().sum()
    }

    pub fn nodata(&self) -> u64 {
        self.nodata
    }

    pub fn clipped(&self) -> u64 {
        self.clipped
    }

    pub fn unmatched(&self) -> u64 {
        self.unmatched
    }

    /// Pixels examined.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Whether no pixel was counted into a bucket.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Counts keyed by bucket label, scaled by `unit` (1 for plain counts,
    /// the pixel area for areas).
    pub fn labelled(&self, binning: &Binning, unit: f64) -> BTreeMap<String, f64> {
        self.buckets
            .iter()
            .map(|(bucket, count)| (binning.label(bucket), *count as f64 * unit))
            .collect()
    }
}
