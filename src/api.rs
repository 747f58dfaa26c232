use crate::{error::invalid, memory::*, CentroidSet, Dataset, Result};
use rand::prelude::*;
use std::cell::RefCell;

pub type InitDoneCallbackFn<'a, T> = &'a dyn Fn(&CentroidSet<T>);
pub type IterationDoneCallbackFn<'a, T> = &'a dyn Fn(&CentroidSet<T>, usize, T);

/// How the initial centroids of a run are chosen.
#[derive(Clone, Debug, PartialEq)]
pub enum Init<T: Primitive> {
    /// Pick k distinct samples uniformly at random (a.k.a. Forgy), using the configured
    /// random generator.
    RandomSample,
    /// Start from the given centroids [row-major] = [<centroid0>,<centroid1>,...].
    /// Must contain exactly `k * dims` values.
    Precomputed(Vec<T>),
}

/// This is a structure holding the configuration of a k-means calculation: cluster count,
/// iteration limit, convergence threshold, the random number generator to use, and a couple
/// of callbacks that can be set to get status information from a running calculation.
///
/// The same configuration can drive every engine. For the distributed engine, each rank
/// builds its own (identical) configuration.
///
/// For a more detailed information about all possible options, have a look at [`KMeansConfigBuilder`].
pub struct KMeansConfig<'a, T: Primitive> {
    pub(crate) k: usize,
    pub(crate) max_iter: usize,
    pub(crate) threshold: T,
    pub(crate) threads: Option<usize>,
    pub(crate) init: Init<T>,
    /// Callback that is called, when the initialization phase finished
    /// ## Arguments
    /// - **centroids**: The initial centroids
    pub(crate) init_done: InitDoneCallbackFn<'a, T>,
    /// Callback that is called after each iteration
    /// ## Arguments
    /// - **centroids**: The centroids computed by this iteration
    /// - **iteration_id**: Number of the current iteration (starting at 1)
    /// - **max_shift**: Largest squared distance a centroid moved in this iteration
    pub(crate) iteration_done: IterationDoneCallbackFn<'a, T>,
    /// Random number generator to use
    pub(crate) rnd: Box<RefCell<dyn RngCore>>,
}
impl<'a, T: Primitive> Default for KMeansConfig<'a, T> {
    fn default() -> Self {
        Self {
            k: 1,
            max_iter: 100,
            threshold: T::from(1e-4).unwrap_or_else(T::epsilon),
            threads: None,
            init: Init::RandomSample,
            init_done: &|_| {},
            iteration_done: &|_, _, _| {},
            rnd: Box::new(RefCell::new(rand::thread_rng())),
        }
    }
}
impl<'a, T: Primitive> KMeansConfig<'a, T> {
    /// Use the [`KMeansConfigBuilder`] to build a [`KMeansConfig`] instance.
    pub fn build() -> KMeansConfigBuilder<'a, T> {
        KMeansConfigBuilder { config: KMeansConfig::default() }
    }

    pub fn k(&self) -> usize { self.k }
    pub fn max_iter(&self) -> usize { self.max_iter }
    pub fn threshold(&self) -> T { self.threshold }
    pub fn threads(&self) -> Option<usize> { self.threads }

    /// Check this configuration against a dataset of `sample_cnt` points with `sample_dims`
    /// dimensions, before anything is computed.
    pub(crate) fn validate(&self, sample_cnt: usize, sample_dims: usize) -> Result<()> {
        if sample_cnt == 0 {
            return invalid("dataset is empty");
        }
        if self.k == 0 {
            return invalid("k must be at least 1");
        }
        if self.k > sample_cnt {
            return invalid(format!(
                "number of clusters k ({}) is larger than dataset size ({})", self.k, sample_cnt
            ));
        }
        if !(self.threshold >= T::zero()) {
            return invalid(format!("threshold must be a non-negative number, got {}", self.threshold));
        }
        if self.threads == Some(0) {
            return invalid("thread count must be at least 1");
        }
        if let Init::Precomputed(ref centroids) = self.init {
            if centroids.len() != self.k * sample_dims {
                return invalid(format!(
                    "{} precomputed values do not form {} centroids of {} dimensions",
                    centroids.len(), self.k, sample_dims
                ));
            }
        }
        Ok(())
    }
}
impl<'a, T: Primitive> std::fmt::Debug for KMeansConfig<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KMeansConfig")
            .field("k", &self.k)
            .field("max_iter", &self.max_iter)
            .field("threshold", &self.threshold)
            .field("threads", &self.threads)
            .field("init", &self.init)
            .finish()
    }
}

pub struct KMeansConfigBuilder<'a, T: Primitive> {
    config: KMeansConfig<'a, T>
}
impl<'a, T: Primitive> KMeansConfigBuilder<'a, T> {
    /// Set the amount of clusters to search for.
    pub fn k(mut self, k: usize) -> Self {
        self.config.k = k; self
    }
    /// Limit the maximum amount of iterations.
    /// ## Default
    /// `100`
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter; self
    }
    /// Set the distance a centroid may still move in an iteration that counts as converged.
    /// The calculation stops once every centroid moved less than this.
    /// ## Default
    /// `1e-4`
    pub fn threshold(mut self, threshold: T) -> Self {
        self.config.threshold = threshold; self
    }
    /// Set the amount of worker threads of the shared-memory engine (and of each rank
    /// of the distributed engine). Distributed ranks run single-threaded when unset.
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads); self
    }
    /// Set the centroid initialization method. See [`Init`].
    pub fn init(mut self, init: Init<T>) -> Self {
        self.config.init = init; self
    }
    /// Set the callback that should be called after the centroid initialization, before the iteration starts.
    pub fn init_done(mut self, init_done: InitDoneCallbackFn<'a, T>) -> Self {
        self.config.init_done = init_done; self
    }
    /// Set the callback that should be called after each iteration during a running k-means calculation.
    pub fn iteration_done(mut self, iteration_done: IterationDoneCallbackFn<'a, T>) -> Self {
        self.config.iteration_done = iteration_done; self
    }
    /// Set the random number generator that should be used in the k-means calculation.
    /// Use a seeded generator for deterministically repeatable results.
    pub fn random_generator<R: RngCore + 'static>(mut self, rnd: R) -> Self {
        self.config.rnd = Box::new(RefCell::new(rnd)); self
    }
    /// Shorthand for a [`StdRng`] seeded with **seed**. Engines configured with the same seed
    /// pick the same initial centroids.
    pub fn seed(self, seed: u64) -> Self {
        self.random_generator(StdRng::seed_from_u64(seed))
    }
    /// Return the internally built configuration structure.
    pub fn build(self) -> KMeansConfig<'a, T> { self.config }
}


/// Where an engine's state machine stopped: `Init → (Assign → Update)* → Converged | MaxIterReached`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// No run finished yet (or the last one was rejected)
    Init,
    Converged,
    MaxIterReached,
}

/// Common surface of all execution strategies.
pub trait Engine<T: Primitive> {
    /// Cluster **data** in place (every point's label is updated) and return the amount of
    /// iterations executed. Rejected input leaves the centroids unset.
    fn run(&mut self, data: &mut Dataset<T>) -> Result<usize>;

    /// Centroids of the last successful run.
    fn centroids(&self) -> Option<&CentroidSet<T>>;

    fn status(&self) -> Status;
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::KMeansError;

    #[test]
    fn defaults() {
        let conf = KMeansConfig::<f64>::default();
        assert_eq!(conf.k(), 1);
        assert_eq!(conf.max_iter(), 100);
        assert_eq!(conf.threshold(), 1e-4);
        assert_eq!(conf.threads(), None);
    }

    #[test]
    fn validation() {
        let reject = |conf: KMeansConfig<f64>, cnt, dims| {
            assert!(matches!(conf.validate(cnt, dims), Err(KMeansError::InvalidConfiguration(_))));
        };
        reject(KMeansConfig::build().k(5).build(), 3, 2);
        reject(KMeansConfig::build().k(0).build(), 3, 2);
        reject(KMeansConfig::build().k(1).build(), 0, 2);
        reject(KMeansConfig::build().k(1).threshold(-1.0).build(), 3, 2);
        reject(KMeansConfig::build().k(1).threshold(f64::NAN).build(), 3, 2);
        reject(KMeansConfig::build().k(1).threads(0).build(), 3, 2);
        reject(KMeansConfig::build().k(2).init(Init::Precomputed(vec![1.0, 2.0])).build(), 3, 2);

        assert!(KMeansConfig::<f64>::build().k(3).build().validate(3, 2).is_ok());
        assert!(KMeansConfig::build().k(2).init(Init::Precomputed(vec![1.0, 2.0, 3.0, 4.0])).build().validate(3, 2).is_ok());
    }
}
