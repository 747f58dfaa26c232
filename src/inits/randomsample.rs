use crate::{error::invalid, CentroidSet, Dataset, Primitive, Result};
use rand::prelude::*;

/// Choose **k** distinct samples uniformly at random, without replacement: the sample indices
/// are shuffled and the first **k** of them become the centroids (in that order).
pub(crate) fn calculate<T: Primitive>(data: &Dataset<T>, k: usize, rnd: &mut dyn RngCore) -> Result<CentroidSet<T>> {
    if data.len() < k {
        return invalid(format!(
            "number of clusters k ({}) is larger than dataset size ({})", k, data.len()
        ));
    }
    let mut indices: Vec<usize> = (0..data.len()).collect();
    indices.shuffle(rnd);

    let mut centroids = Vec::with_capacity(k * data.dims());
    indices.iter().take(k)
        .for_each(|&i| centroids.extend_from_slice(&data.points()[i].coords));
    CentroidSet::from_flat(centroids, k, data.dims())
}
