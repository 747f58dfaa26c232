use crate::{memory::*, CentroidSet, ClusterSums, DistanceFunction, EuclideanDistance};

/// Outcome of one update step.
#[derive(Clone, Debug)]
pub struct CentroidUpdate<T: Primitive> {
	/// The replacement for the previous centroid set
	pub centroids: CentroidSet<T>,
	/// Largest squared distance any centroid moved (always `>= 0`)
	pub max_shift: T,
	/// Whether `max_shift < threshold²`
	pub converged: bool,
}

/// Turns global per-cluster sums into new centroids and decides about convergence.
///
/// Every engine (and, in the distributed case, every rank) runs exactly this code on
/// identical inputs, so they all agree on the new centroids and on when to stop.
#[derive(Clone, Copy, Debug)]
pub struct ConvergenceMonitor<T: Primitive> {
	threshold_sq: T,
}
impl<T: Primitive> ConvergenceMonitor<T> {
	/// ## Arguments
	/// - **threshold**: Distance below which a centroid counts as not moving anymore.
	/// Squared once here, so no square roots are needed later.
	pub fn new(threshold: T) -> Self {
		Self { threshold_sq: threshold * threshold }
	}

	pub fn threshold_sq(&self) -> T {
		self.threshold_sq
	}

	pub fn is_converged(&self, max_shift: T) -> bool {
		max_shift < self.threshold_sq
	}

	/// Divide the sums by their counts. A cluster without points keeps its previous
	/// centroid bit for bit and contributes no shift.
	pub fn update(&self, previous: &CentroidSet<T>, totals: &ClusterSums<T>) -> CentroidUpdate<T> {
		debug_assert_eq!(previous.k(), totals.k());
		let mut centroids = CentroidSet::zeroed(previous.k(), previous.dims());
		let mut max_shift = T::zero();

		for (ci, &count) in totals.counts().iter().enumerate() {
			if count == 0 {
				centroids.centroid_mut(ci).copy_from_slice(previous.centroid(ci));
				continue;
			}
			let count = T::from(count).unwrap_or_else(T::nan);
			centroids.centroid_mut(ci).iter_mut()
				.zip(totals.cluster_sum(ci).iter())
				.for_each(|(c, &s)| *c = s / count);

			let shift = EuclideanDistance.distance(previous.centroid(ci), centroids.centroid(ci));
			if shift > max_shift {
				max_shift = shift;
			}
		}

		CentroidUpdate { converged: self.is_converged(max_shift), centroids, max_shift }
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::Point;

	fn totals(points: &[(f64, usize)], k: usize) -> ClusterSums<f64> {
		let mut sums = ClusterSums::new(k, 1);
		points.iter().for_each(|&(x, c)| sums.add_point(&Point { coords: vec![x], cluster: Some(c) }));
		sums
	}

	#[test]
	fn mean_and_shift() {
		let monitor = ConvergenceMonitor::new(1e-4);
		let previous = CentroidSet::from_flat(vec![1.0, 10.0], 2, 1).unwrap();
		let update = monitor.update(&previous, &totals(&[(1.0, 0), (2.0, 0), (3.0, 0), (10.0, 1), (11.0, 1), (12.0, 1)], 2));
		assert_eq!(update.centroids.as_flat(), &[2.0, 11.0]);
		assert_eq!(update.max_shift, 1.0);
		assert!(!update.converged);

		let again = monitor.update(&update.centroids, &totals(&[(1.0, 0), (2.0, 0), (3.0, 0), (10.0, 1), (11.0, 1), (12.0, 1)], 2));
		assert_eq!(again.max_shift, 0.0);
		assert!(again.converged);
	}

	#[test]
	fn empty_cluster_keeps_previous_centroid() {
		let monitor = ConvergenceMonitor::new(1e-4);
		let previous = CentroidSet::from_flat(vec![2.0, 0.1 + 0.2], 2, 1).unwrap();
		let update = monitor.update(&previous, &totals(&[(1.0, 0), (3.0, 0)], 2));
		assert_eq!(update.centroids.centroid(1)[0].to_bits(), (0.1f64 + 0.2).to_bits());
		assert!(update.centroids.as_flat().iter().all(|v| !v.is_nan()));
		assert_eq!(update.max_shift, 0.0);
	}

	#[test]
	fn threshold_is_compared_squared() {
		let monitor = ConvergenceMonitor::new(0.5f32);
		assert_eq!(monitor.threshold_sq(), 0.25);
		assert!(monitor.is_converged(0.2499));
		assert!(!monitor.is_converged(0.25));
		assert!(!ConvergenceMonitor::new(0.0f64).is_converged(0.0));
	}
}
