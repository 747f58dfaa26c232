use crate::{memory::*, Point};

/// Partial result of the update step: per-cluster coordinate sums and point counts.
///
/// Every engine produces these the same way: workers (threads or ranks) accumulate into
/// a private instance and the instances are combined with [`ClusterSums::merge`], which
/// is element-wise addition and therefore associative and commutative. Synchronization
/// cost is one merge per worker, independent of the amount of points.
///
/// ## Fields
/// - **sums**: Coordinate sums [row-major] = [<cluster0>,<cluster1>,...]
/// - **counts**: Amount of points accumulated into each cluster
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterSums<T: Primitive> {
    pub(crate) k: usize,
    pub(crate) dims: usize,
    pub(crate) sums: Vec<T>,
    pub(crate) counts: Vec<usize>,
}
impl<T: Primitive> ClusterSums<T> {
    pub fn new(k: usize, dims: usize) -> Self {
        Self { k, dims, sums: vec![T::zero(); k * dims], counts: vec![0; k] }
    }

    /// Rebuild from the two buffers exchanged by the distributed engine's all-reduce.
    pub(crate) fn from_parts(k: usize, dims: usize, sums: Vec<T>, counts: Vec<usize>) -> Self {
        debug_assert_eq!(sums.len(), k * dims);
        debug_assert_eq!(counts.len(), k);
        Self { k, dims, sums, counts }
    }

    /// Add one point to the cluster it is labeled with. Unlabeled points are skipped.
    #[inline(always)]
    pub fn add_point(&mut self, point: &Point<T>) {
        if let Some(cluster) = point.cluster {
            self.add(cluster, &point.coords);
        }
    }

    #[inline(always)]
    pub fn add(&mut self, cluster: usize, coords: &[T]) {
        self.counts[cluster] += 1;
        self.sums[cluster * self.dims..(cluster + 1) * self.dims].iter_mut()
            .zip(coords.iter())
            .for_each(|(s, c)| *s += c);
    }

    /// Combine two partial results.
    pub fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!((self.k, self.dims), (other.k, other.dims));
        self.sums.iter_mut().zip(other.sums.iter()).for_each(|(s, o)| *s += o);
        self.counts.iter_mut().zip(other.counts.iter()).for_each(|(c, o)| *c += o);
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn sums(&self) -> &[T] {
        &self.sums
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub(crate) fn cluster_sum(&self, cluster: usize) -> &[T] {
        &self.sums[cluster * self.dims..(cluster + 1) * self.dims]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(coords: Vec<f64>, cluster: usize) -> Point<f64> {
        Point { coords, cluster: Some(cluster) }
    }

    #[test]
    fn accumulate_and_merge() {
        let points = vec![
            labeled(vec![1.0, 1.0], 0),
            labeled(vec![2.0, 0.0], 1),
            labeled(vec![3.0, 5.0], 0),
            Point::new(vec![100.0, 100.0]),
        ];

        let mut whole = ClusterSums::new(2, 2);
        points.iter().for_each(|p| whole.add_point(p));

        let (left, right) = points.split_at(1);
        let mut a = ClusterSums::new(2, 2);
        let mut b = ClusterSums::new(2, 2);
        left.iter().for_each(|p| a.add_point(p));
        right.iter().for_each(|p| b.add_point(p));

        assert_eq!(whole.sums(), &[4.0, 6.0, 2.0, 0.0]);
        assert_eq!(whole.counts(), &[2, 1]);
        assert_eq!(whole.total(), 3);
        assert_eq!(a.clone().merge(b.clone()), whole);
        assert_eq!(b.merge(a), whole);
    }
}
