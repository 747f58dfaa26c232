use super::lloyd::{Lloyd, Pooled};
use crate::{memory::*, CentroidSet, Dataset, DistanceFunction, Engine, EuclideanDistance, KMeansConfig, Result, Status};

/// Shared-memory parallel Lloyd's algorithm.
///
/// Each iteration forks twice onto a private rayon pool: once to label the points (workers
/// only read the centroid snapshot and write their own points' labels), once to sum the
/// points into thread-local [`ClusterSums`](crate::ClusterSums) that are merged after the
/// parallel region. Dividing the sums and the convergence test stay on the calling thread.
///
/// Labels are independent of the thread count; centroid coordinates may differ from the
/// serial engine in the last bits, since the summation order differs.
pub struct SharedMemoryKMeans<'c, 'a, T: Primitive, D: DistanceFunction<T> = EuclideanDistance> {
    lloyd: Lloyd<'c, 'a, T>,
    executor: Pooled,
    distance: D,
}
impl<'c, 'a, T: Primitive> SharedMemoryKMeans<'c, 'a, T> {
    /// Create the engine and its thread pool (sized by [`KMeansConfigBuilder::threads`](crate::KMeansConfigBuilder::threads),
    /// rayon's default otherwise).
    pub fn new(config: &'c KMeansConfig<'a, T>) -> Result<Self> {
        Self::with_distance(config, EuclideanDistance)
    }
}
impl<'c, 'a, T: Primitive, D: DistanceFunction<T>> SharedMemoryKMeans<'c, 'a, T, D> {
    pub fn with_distance(config: &'c KMeansConfig<'a, T>, distance: D) -> Result<Self> {
        if config.threads == Some(0) {
            return crate::error::invalid("thread count must be at least 1");
        }
        Ok(Self { lloyd: Lloyd::new(config), executor: Pooled::new(config.threads)?, distance })
    }

    pub fn threads(&self) -> usize {
        self.executor.threads()
    }
}
impl<'c, 'a, T: Primitive, D: DistanceFunction<T>> Engine<T> for SharedMemoryKMeans<'c, 'a, T, D> {
    fn run(&mut self, data: &mut Dataset<T>) -> Result<usize> {
        self.lloyd.run("shared-memory", &self.executor, &self.distance, data)
    }

    fn centroids(&self) -> Option<&CentroidSet<T>> {
        self.lloyd.centroids.as_ref()
    }

    fn status(&self) -> Status {
        self.lloyd.status
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Init, KMeansError, SerialKMeans};
    use rand::prelude::*;

    #[test]
    fn two_groups_on_four_threads() {
        let mut data = Dataset::from_flat(&[1.0, 2.0, 3.0, 10.0, 11.0, 12.0], 6, 1).unwrap();
        let conf = KMeansConfig::build().k(2).threads(4).init(Init::Precomputed(vec![1.0, 10.0])).build();

        let mut kmean = SharedMemoryKMeans::new(&conf).unwrap();
        assert_eq!(kmean.threads(), 4);
        assert_eq!(kmean.run(&mut data).unwrap(), 2);
        assert_eq!(kmean.status(), Status::Converged);
        assert_eq!(kmean.centroids().unwrap().as_flat(), &[2.0, 11.0]);
    }

    #[test]
    fn zero_threads_rejected() {
        let conf = KMeansConfig::<f64>::build().k(2).threads(0).build();
        assert!(matches!(SharedMemoryKMeans::new(&conf), Err(KMeansError::InvalidConfiguration(_))));
    }

    #[test]
    fn labels_independent_of_thread_count() {
        let (sample_cnt, sample_dims, k) = (3000, 4, 6);
        let mut rnd = StdRng::seed_from_u64(1337);
        let samples: Vec<f64> = (0..sample_cnt * sample_dims).map(|_| rnd.gen_range(0.0..100.0)).collect();
        let data = Dataset::from_flat(&samples, sample_cnt, sample_dims).unwrap();

        // one iteration from fixed centroids: no drift between summation orders possible
        let init: Vec<f64> = samples[..k * sample_dims].to_vec();
        let serial_conf = KMeansConfig::build().k(k).max_iter(1).init(Init::Precomputed(init.clone())).build();
        let mut serial_data = data.clone();
        SerialKMeans::new(&serial_conf).run(&mut serial_data).unwrap();

        for threads in [1, 2, 5, 16] {
            let conf = KMeansConfig::build().k(k).max_iter(1).threads(threads).init(Init::Precomputed(init.clone())).build();
            let mut parallel_data = data.clone();
            let mut kmean = SharedMemoryKMeans::new(&conf).unwrap();
            kmean.run(&mut parallel_data).unwrap();
            assert_eq!(parallel_data.labels(), serial_data.labels());
        }
    }
}
