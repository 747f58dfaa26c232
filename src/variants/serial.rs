use super::lloyd::{Lloyd, Sequential};
use crate::{memory::*, CentroidSet, Dataset, DistanceFunction, Engine, EuclideanDistance, KMeansConfig, Result, Status};

/// Single-threaded reference implementation of Lloyd's algorithm. The other engines are
/// defined by producing the same labels as this one.
///
/// ## Example
/// ```rust
/// use kmeans_engines::*;
///
/// let mut data = Dataset::from_flat(&[1.0, 2.0, 3.0, 10.0, 11.0, 12.0], 6, 1).unwrap();
/// let conf = KMeansConfig::build().k(2).init(Init::Precomputed(vec![1.0, 10.0])).build();
///
/// let mut kmean = SerialKMeans::new(&conf);
/// let iterations = kmean.run(&mut data).unwrap();
///
/// assert_eq!(iterations, 2);
/// assert_eq!(kmean.centroids().unwrap().as_flat(), &[2.0, 11.0]);
/// ```
pub struct SerialKMeans<'c, 'a, T: Primitive, D: DistanceFunction<T> = EuclideanDistance> {
    lloyd: Lloyd<'c, 'a, T>,
    distance: D,
}
impl<'c, 'a, T: Primitive> SerialKMeans<'c, 'a, T> {
    pub fn new(config: &'c KMeansConfig<'a, T>) -> Self {
        Self::with_distance(config, EuclideanDistance)
    }
}
impl<'c, 'a, T: Primitive, D: DistanceFunction<T>> SerialKMeans<'c, 'a, T, D> {
    pub fn with_distance(config: &'c KMeansConfig<'a, T>, distance: D) -> Self {
        Self { lloyd: Lloyd::new(config), distance }
    }
}
impl<'c, 'a, T: Primitive, D: DistanceFunction<T>> Engine<T> for SerialKMeans<'c, 'a, T, D> {
    fn run(&mut self, data: &mut Dataset<T>) -> Result<usize> {
        self.lloyd.run("serial", &Sequential, &self.distance, data)
    }

    fn centroids(&self) -> Option<&CentroidSet<T>> {
        self.lloyd.centroids.as_ref()
    }

    fn status(&self) -> Status {
        self.lloyd.status
    }
}
