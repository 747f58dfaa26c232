//! # kmeans-engines - API documentation
//!
//! Lloyd's k-means clustering with three interchangeable execution strategies:
//! - [`SerialKMeans`]: the single-threaded reference
//! - [`SharedMemoryKMeans`]: fork-join over a rayon thread pool
//! - [`DistributedKMeans`]: SPMD over a process group, where ranks only talk through
//!   collectives ([`comm::Communicator`]): in-process threads ([`comm::LocalComm`]) or
//!   processes connected via TCP ([`comm::TcpComm`])
//!
//! All of them implement [`Engine`], take the same [`KMeansConfig`] and agree on the
//! result: started from the same initial centroids they produce the same labels, and
//! centroids equal up to floating point summation order.
//!
//! ## Algorithm
//! Each iteration assigns every point to its nearest centroid (squared euclidean distance,
//! ties go to the lower index), then replaces every centroid by the mean of its points.
//! A centroid without points stays where it is. The run stops once no centroid moved
//! further than the configured threshold, or after `max_iter` iterations.
//!
//! ## Supported centroid initializations
//! See [`Init`]: random samples of the dataset (seedable), or precomputed centroids.
//!
//! ## Supported primitive types
//! - [`f32`]
//! - [`f64`]
//!
//! ## Example
//! ```rust
//! use kmeans_engines::*;
//!
//! let (sample_cnt, sample_dims, k, max_iter) = (2000, 8, 4, 100);
//!
//! // Generate some random data
//! let mut samples = vec![0.0f64; sample_cnt * sample_dims];
//! samples.iter_mut().for_each(|v| *v = rand::random());
//! let mut data = Dataset::from_flat(&samples, sample_cnt, sample_dims).unwrap();
//!
//! let conf = KMeansConfig::build().k(k).max_iter(max_iter).threads(4).seed(1337).build();
//! let mut kmean = SharedMemoryKMeans::new(&conf).unwrap();
//! let iterations = kmean.run(&mut data).unwrap();
//!
//! println!("Finished after {} iterations: {:?}", iterations, kmean.status());
//! println!("Centroids: {:?}", kmean.centroids().unwrap().as_flat());
//! println!("Cluster-Assignments: {:?}", data.labels());
//! ```
//!
//! ## Example (distributed, one thread per rank)
//! ```rust
//! use kmeans_engines::{comm::{Communicator, LocalComm}, *};
//!
//! let samples = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0];
//! let group = LocalComm::group(3).unwrap();
//!
//! std::thread::scope(|s| {
//!     for comm in group {
//!         s.spawn(move || {
//!             // only the coordinator's dataset is read
//!             let mut data = match comm.rank() {
//!                 0 => Dataset::from_flat(&samples, 6, 1).unwrap(),
//!                 _ => Dataset::new(Vec::new()).unwrap(),
//!             };
//!             let conf = KMeansConfig::build().k(2).init(Init::Precomputed(vec![1.0, 10.0])).build();
//!             let mut kmean = DistributedKMeans::new(&conf, comm).unwrap();
//!             kmean.run(&mut data).unwrap();
//!             assert_eq!(kmean.centroids().unwrap().as_flat(), &[2.0, 11.0]);
//!         });
//!     }
//! });
//! ```
//!
//! ## Example (using the status event callbacks)
//! ```rust
//! use kmeans_engines::*;
//!
//! let mut data = Dataset::from_flat(&[1.0f32, 2.0, 3.0, 10.0, 11.0, 12.0], 6, 1).unwrap();
//! let conf = KMeansConfig::build()
//!     .k(2)
//!     .seed(7)
//!     .init_done(&|c| println!("Initialization completed: {:?}", c.as_flat()))
//!     .iteration_done(&|c, nr, max_shift| println!("Iteration {} - max shift {:.4}: {:?}", nr, max_shift, c.as_flat()))
//!     .build();
//! SerialKMeans::new(&conf).run(&mut data).unwrap();
//! ```
//!
//! ## Logging
//! Runs report through [`tracing`]: start and end at `info`, each iteration at `debug`,
//! each distributed phase at `trace`, rejected configurations at `warn`. Install any
//! subscriber to see them.

#[macro_use] mod helpers;
mod memory;
mod error;
mod point;
mod distances;
mod reduction;
mod convergence;
mod api;
mod inits;
mod variants;
mod phaselog;
pub mod comm;

pub use api::{Engine, Init, InitDoneCallbackFn, IterationDoneCallbackFn, KMeansConfig, KMeansConfigBuilder, Status};
pub use convergence::{CentroidUpdate, ConvergenceMonitor};
pub use distances::{DistanceFunction, EuclideanDistance};
pub use error::{KMeansError, Result};
pub use memory::{Element, Primitive};
pub use phaselog::{PhaseEvent, PhaseKind, PhaseLog};
pub use point::{CentroidSet, Dataset, Point};
pub use reduction::ClusterSums;
pub use variants::{DistributedKMeans, SerialKMeans, SharedMemoryKMeans};


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{comm::{Communicator, LocalComm}, helpers::testing::*};
    use std::thread;

    struct Outcome {
        iterations: usize,
        status: Status,
        centroids: Vec<f64>,
        labels: Vec<Option<usize>>,
    }

    fn run_engine(engine: &mut dyn Engine<f64>, data: &Dataset<f64>) -> Outcome {
        let mut data = data.clone();
        let iterations = engine.run(&mut data).unwrap();
        Outcome {
            iterations,
            status: engine.status(),
            centroids: engine.centroids().unwrap().as_flat().to_vec(),
            labels: data.labels(),
        }
    }

    fn run_distributed(ranks: usize, data: &Dataset<f64>, conf: impl Fn() -> KMeansConfig<'static, f64> + Sync) -> Outcome {
        let group = LocalComm::group(ranks).unwrap();
        let mut outcomes: Vec<Outcome> = thread::scope(|s| {
            let conf = &conf;
            let handles: Vec<_> = group.into_iter().map(|comm| s.spawn(move || {
                let mine = if comm.is_coordinator() { data.clone() } else { Dataset::new(Vec::new()).unwrap() };
                let conf = conf();
                let mut kmean = DistributedKMeans::new(&conf, comm).unwrap();
                run_engine(&mut kmean, &mine)
            })).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        outcomes.swap_remove(0)
    }

    fn assert_equivalent(should: &Outcome, actual: &Outcome) {
        assert_eq!(should.iterations, actual.iterations);
        assert_eq!(should.status, actual.status);
        assert_eq!(should.labels, actual.labels);
        for (a, b) in should.centroids.iter().zip(actual.centroids.iter()) {
            assert_approx_eq!(*a, *b, 1e-9);
        }
    }

    #[test]
    fn engines_agree_on_random_init() {
        let data = blobs(42, 6, 250, 4, 1.5);
        let conf = || KMeansConfig::build().k(6).seed(1337).build();

        let serial = run_engine(&mut SerialKMeans::new(&conf()), &data);
        assert!(serial.labels.iter().all(|l| matches!(l, Some(c) if *c < 6)));

        for threads in [1, 3, 8] {
            let shared_conf = KMeansConfig::build().k(6).seed(1337).threads(threads).build();
            let shared = run_engine(&mut SharedMemoryKMeans::new(&shared_conf).unwrap(), &data);
            assert_equivalent(&serial, &shared);
        }
        for ranks in [1, 2, 5] {
            assert_equivalent(&serial, &run_distributed(ranks, &data, conf));
        }
    }

    #[test]
    fn engines_agree_on_iteration_cap() {
        let data = blobs(7, 10, 100, 2, 20.0);
        let conf = || KMeansConfig::build().k(4).max_iter(3).threshold(0.0).seed(5).build();

        let serial = run_engine(&mut SerialKMeans::new(&conf()), &data);
        assert_eq!(serial.iterations, 3);
        assert_eq!(serial.status, Status::MaxIterReached);
        assert_equivalent(&serial, &run_distributed(3, &data, conf));
    }

    #[test]
    fn permuted_init_gives_same_partition() {
        let data = blobs(3, 3, 40, 3, 0.5);
        let centroid = |i: usize| data.points()[i * 40].coords.clone();
        let forward: Vec<f64> = [0, 1, 2].iter().flat_map(|&i| centroid(i)).collect();
        let backward: Vec<f64> = [2, 1, 0].iter().flat_map(|&i| centroid(i)).collect();

        let conf = KMeansConfig::build().k(3).init(Init::Precomputed(forward)).build();
        let serial = run_engine(&mut SerialKMeans::new(&conf), &data);
        let conf = KMeansConfig::build().k(3).threads(2).init(Init::Precomputed(backward)).build();
        let shared = run_engine(&mut SharedMemoryKMeans::new(&conf).unwrap(), &data);

        assert_ne!(serial.labels, shared.labels);
        assert_same_partition(&serial.labels, &shared.labels);
    }

    #[test]
    fn single_precision() {
        let mut data = Dataset::from_flat(&[0.0f32, 0.0, 0.5, 0.5, 9.0, 9.0, 9.5, 9.5], 4, 2).unwrap();
        let conf = KMeansConfig::build().k(2).init(Init::Precomputed(vec![0.0, 0.0, 9.0, 9.0])).build();
        let mut kmean = SharedMemoryKMeans::new(&conf).unwrap();
        assert_eq!(kmean.run(&mut data).unwrap(), 2);
        assert_eq!(kmean.centroids().unwrap().as_flat(), &[0.25, 0.25, 9.25, 9.25]);
    }
}
