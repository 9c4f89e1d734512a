//! Pareto frontier analysis over recall and throughput.
//!
//! Point A dominates point B when A is at least as good on both axes and
//! strictly better on one:
//!
//! ```text
//! (A.recall >= B.recall && A.throughput > B.throughput)
//!     || (A.recall > B.recall && A.throughput >= B.throughput)
//! ```
//!
//! Points with identical recall and throughput do not dominate each other, so
//! both survive. Filtering is a full pairwise scan; benchmark sweeps hold tens
//! to a few hundred points per dataset.

use std::cmp::Ordering;

/// Anything with a recall and a throughput.
pub trait Tradeoff {
    fn recall(&self) -> f64;
    fn throughput(&self) -> f64;
}

impl Tradeoff for (f64, f64) {
    fn recall(&self) -> f64 {
        self.0
    }

    fn throughput(&self) -> f64 {
        self.1
    }
}

impl<T: Tradeoff + ?Sized> Tradeoff for &T {
    fn recall(&self) -> f64 {
        (**self).recall()
    }

    fn throughput(&self) -> f64 {
        (**self).throughput()
    }
}

/// Whether `a` dominates `b`.
pub fn dominates<A: Tradeoff + ?Sized, B: Tradeoff + ?Sized>(a: &A, b: &B) -> bool {
    let (ar, at) = (a.recall(), a.throughput());
    let (br, bt) = (b.recall(), b.throughput());
    (ar >= br && at > bt) || (ar > br && at >= bt)
}

/// Whether no point in `others` dominates `candidate`.
///
/// `others` may contain `candidate` itself; a point never dominates itself.
pub fn is_pareto_optimal<T: Tradeoff>(candidate: &T, others: &[T]) -> bool {
    !others.iter().any(|other| dominates(other, candidate))
}

/// Indices of the non-dominated points, in input order.
pub fn pareto_indices<T: Tradeoff>(points: &[T]) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| is_pareto_optimal(*p, points))
        .map(|(i, _)| i)
        .collect()
}

/// Non-dominated points, in input order.
pub fn pareto_frontier<T: Tradeoff + Clone>(points: &[T]) -> Vec<T> {
    pareto_indices(points)
        .into_iter()
        .map(|i| points[i].clone())
        .collect()
}

/// Sort points by recall ascending, then throughput descending.
///
/// NaN values sort last.
pub fn sort_by_recall<T: Tradeoff>(points: &mut [T]) {
    points.sort_by(|a, b| {
        nan_last(a.recall(), b.recall())
            .then_with(|| nan_last(b.throughput(), a.throughput()))
    });
}

fn nan_last(a: f64, b: f64) -> Ordering {
    a.is_nan()
        .cmp(&b.is_nan())
        .then_with(|| a.total_cmp(&b))
}
