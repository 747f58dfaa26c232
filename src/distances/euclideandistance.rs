use crate::{DistanceFunction, Primitive};

/// Squared euclidean distance. The square root is never taken: nearest-centroid
/// search and the convergence test both compare squared values.
#[derive(Clone, Copy, Debug, Default)]
pub struct EuclideanDistance;

impl<T: Primitive> DistanceFunction<T> for EuclideanDistance {
    #[inline(always)]
    fn distance(&self, a: &[T], b: &[T]) -> T {
        assert_eq!(a.len(), b.len(), "distance between points of differing dimension");
        a.iter().zip(b.iter())
            .map(|(&ap, &bp)| ap - bp)
            .map(|v| v * v)
            .fold(T::zero(), |acc, v| acc + v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_distance() {
        assert_eq!(EuclideanDistance.distance(&[1.0f64, 2.0, 3.0], &[4.0, 6.0, 3.0]), 25.0);
        assert_eq!(EuclideanDistance.distance(&[0.5f32], &[0.5]), 0.0);
        let empty: [f64; 0] = [];
        assert_eq!(EuclideanDistance.distance(&empty, &empty), 0.0);
    }

    #[test]
    #[should_panic(expected = "differing dimension")]
    fn mismatched_dimensions_panic() {
        EuclideanDistance.distance(&[1.0f64, 2.0], &[1.0]);
    }
}
