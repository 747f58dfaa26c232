use crate::Primitive;

mod euclideandistance;

pub use euclideandistance::EuclideanDistance;

/// Metric used by the assignment step to find each point's nearest centroid.
///
/// Implementations must be pure: every engine calls the same function on the same
/// inputs, and the label parity between engines depends on identical results.
pub trait DistanceFunction<T: Primitive>: Sync + Send {
    fn distance(&self, a: &[T], b: &[T]) -> T;
}
