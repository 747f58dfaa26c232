use crate::{CentroidSet, Dataset, Primitive, Result};

#[inline(always)]
pub(crate) fn calculate<T: Primitive>(data: &Dataset<T>, k: usize, computed: &[T]) -> Result<CentroidSet<T>> {
    CentroidSet::from_flat(computed.to_vec(), k, data.dims())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, Init, KMeansConfig, SerialKMeans};

    #[test]
    fn train_with_precomputed_centroids() {
        let samples = vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0];
        let mut data = Dataset::from_flat(&samples, samples.len(), 1).unwrap();

        let conf = KMeansConfig::build().k(2).max_iter(200).init(Init::Precomputed(vec![0.0f32, 21.0])).build();
        let mut kmean = SerialKMeans::new(&conf);
        kmean.run(&mut data).unwrap();

        // 10 is closer to 0 than to 21, 11 is closer to 21
        assert_eq!(kmean.centroids().unwrap().as_flat(), &[11.0 / 3.0, 52.0 / 3.0]);
        assert_eq!(data.labels(), vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1)]);
    }

    #[test]
    fn wrong_amount_of_values() {
        let data = Dataset::from_flat(&[0.0f64, 1.0, 2.0, 3.0], 2, 2).unwrap();
        assert!(calculate(&data, 2, &[0.0, 1.0, 2.0]).is_err());
    }
}
