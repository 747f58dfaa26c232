use crate::{Dataset, CentroidSet, Init, KMeansConfig, Primitive, Result};

pub(crate) mod precomputed;
pub(crate) mod randomsample;

/// Produce the initial centroids for **data** according to the configured [`Init`] method.
/// Expects the configuration to have been validated against **data**.
pub(crate) fn initial_centroids<T: Primitive>(config: &KMeansConfig<'_, T>, data: &Dataset<T>) -> Result<CentroidSet<T>> {
    match config.init {
        Init::RandomSample => randomsample::calculate(data, config.k, &mut *config.rnd.borrow_mut()),
        Init::Precomputed(ref centroids) => precomputed::calculate(data, config.k, centroids),
    }
}
