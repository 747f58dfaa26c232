use super::lloyd::{Executor, Pooled, Sequential};
use crate::{
    comm::{Communicator, Partition},
    error::invalid,
    inits, memory::*, CentroidSet, ClusterSums, ConvergenceMonitor, Dataset, DistanceFunction, Engine,
    EuclideanDistance, KMeansConfig, KMeansError, PhaseKind, PhaseLog, Point, Result, Status,
};

/// Label sent for points that were never assigned (only possible without any iteration).
const UNASSIGNED: usize = usize::MAX;

/// How a rank processes its own slice of the points.
enum RankExecutor {
    Sequential,
    Pooled(Pooled),
}
impl<T: Primitive> Executor<T> for RankExecutor {
    fn assign<D: DistanceFunction<T>>(&self, points: &mut [Point<T>], centroids: &CentroidSet<T>, distance: &D) {
        match self {
            RankExecutor::Sequential => Sequential.assign(points, centroids, distance),
            RankExecutor::Pooled(pool) => pool.assign(points, centroids, distance),
        }
    }

    fn accumulate(&self, points: &[Point<T>], k: usize, dims: usize) -> ClusterSums<T> {
        match self {
            RankExecutor::Sequential => Sequential.accumulate(points, k, dims),
            RankExecutor::Pooled(pool) => pool.accumulate(points, k, dims),
        }
    }
}

/// Lloyd's algorithm over a process group (SPMD).
///
/// Every rank creates one of these around its own [`Communicator`] and calls
/// [`Engine::run`]; all ranks then walk through the same sequence of collectives:
///
/// 1. `Metadata`: the coordinator validates the configuration against its dataset, picks
///    the initial centroids and broadcasts `[n, dims, k, max_iter, rejected]`, then its
///    threshold. A rejected run ends here with [`KMeansError::InvalidConfiguration`] on
///    every rank.
/// 2. `ScatterData`: the coordinator's points are split into contiguous blocks (see
///    [`Partition`]) and each rank receives its block.
/// 3. Per iteration: `Broadcast` of the centroids, `CalcLocal` (assign and sum the local
///    block), `AllReduce` of sums and counts, `Update` on every rank.
/// 4. `GatherLabels`: the coordinator writes every rank's labels back into its dataset.
///
/// Only the coordinator's dataset is read; other ranks may pass an empty one, which is left
/// untouched. Cluster count, iteration limit and threshold are taken from the coordinator's
/// configuration; the other ranks only contribute their callbacks and `threads`.
/// `iteration_done` fires on every rank, `init_done` only on the coordinator.
///
/// Every rank ends up with the same centroids, status and iteration count. With `threads`
/// configured, each rank processes its block on a pool of that size; otherwise on the
/// calling thread.
pub struct DistributedKMeans<'c, 'a, T: Primitive, C: Communicator, D: DistanceFunction<T> = EuclideanDistance> {
    config: &'c KMeansConfig<'a, T>,
    comm: C,
    distance: D,
    executor: RankExecutor,
    centroids: Option<CentroidSet<T>>,
    status: Status,
    log: PhaseLog,
}
impl<'c, 'a, T: Primitive, C: Communicator> DistributedKMeans<'c, 'a, T, C> {
    pub fn new(config: &'c KMeansConfig<'a, T>, comm: C) -> Result<Self> {
        Self::with_distance(config, comm, EuclideanDistance)
    }
}
impl<'c, 'a, T: Primitive, C: Communicator, D: DistanceFunction<T>> DistributedKMeans<'c, 'a, T, C, D> {
    pub fn with_distance(config: &'c KMeansConfig<'a, T>, comm: C, distance: D) -> Result<Self> {
        let executor = match config.threads {
            Some(0) => return invalid("thread count must be at least 1"),
            Some(threads) => RankExecutor::Pooled(Pooled::new(Some(threads))?),
            None => RankExecutor::Sequential,
        };
        let log = PhaseLog::new(comm.rank());
        Ok(Self { config, comm, distance, executor, centroids: None, status: Status::Init, log })
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn into_comm(self) -> C {
        self.comm
    }

    /// Phases of the last run on this rank.
    pub fn phase_log(&self) -> &PhaseLog {
        &self.log
    }
}

fn desynchronized<T>(msg: String) -> Result<T> {
    Err(KMeansError::Desynchronized(msg))
}

impl<'c, 'a, T: Primitive, C: Communicator, D: DistanceFunction<T>> Engine<T> for DistributedKMeans<'c, 'a, T, C, D> {
    fn run(&mut self, data: &mut Dataset<T>) -> Result<usize> {
        let Self { config, comm, distance, executor, centroids: result, status, log } = self;
        let (config, distance, executor): (&KMeansConfig<'a, T>, &D, &RankExecutor) = (*config, distance, executor);
        *result = None;
        *status = Status::Init;
        log.restart();
        let rank = comm.rank();

        let prepared = if comm.is_coordinator() {
            Some(data.check_dims()
                .and_then(|_| config.validate(data.len(), data.dims()))
                .and_then(|_| inits::initial_centroids(config, data)))
        } else {
            None
        };
        let mut meta = match prepared {
            Some(ref prepared) => vec![data.len(), data.dims(), config.k, config.max_iter, usize::from(prepared.is_err())],
            None => Vec::new(),
        };
        log.measure(PhaseKind::Communication, "Metadata", || comm.broadcast(&mut meta))?;
        let (n, dims, k, max_iter) = match meta[..] {
            [_, _, _, _, 1] => return match prepared {
                Some(Err(e)) => Err(e),
                _ => invalid("rejected by the coordinator"),
            },
            [n, dims, k, max_iter, 0] => (n, dims, k, max_iter),
            _ => return desynchronized(format!("unexpected run metadata {:?}", meta)),
        };
        // loop control comes from the coordinator, so every rank issues the same collectives
        let mut threshold = vec![config.threshold];
        log.measure(PhaseKind::Communication, "Metadata", || comm.broadcast(&mut threshold))?;
        let threshold = match threshold[..] {
            [threshold] => threshold,
            _ => return desynchronized(format!("received {} threshold values", threshold.len())),
        };

        let mut centroids = prepared.and_then(Result::ok);
        if let Some(ref initial) = centroids {
            (config.init_done)(initial);
            tracing::info!(variant = "distributed", k, points = n, dims, ranks = comm.size(), max_iter, "starting k-means");
        }

        let partition = Partition::new(n, comm.size());
        let flat = if comm.is_coordinator() { Some(data.to_flat()) } else { None };
        let coords = partition.scaled(dims);
        let block = log.measure(PhaseKind::Communication, "ScatterData", || comm.scatter(flat.as_deref(), coords.counts()))?;
        drop(flat);
        let mut local = Dataset::from_flat(&block, partition.count(rank), dims)?;

        let monitor = ConvergenceMonitor::new(threshold);
        let mut iterations = 0;
        let mut converged = false;
        while iterations < max_iter && !converged {
            let current = broadcast_centroids(comm, log, centroids.take(), k, dims)?;

            let local_sums = log.measure(PhaseKind::Computation, "CalcLocal", || {
                executor.assign(local.points_mut(), &current, distance);
                executor.accumulate(local.points(), k, dims)
            });
            let sums = log.measure(PhaseKind::Communication, "AllReduce", || comm.all_reduce_sum(local_sums.sums()))?;
            let counts = log.measure(PhaseKind::Communication, "AllReduce", || comm.all_reduce_sum(local_sums.counts()))?;
            let totals = ClusterSums::from_parts(k, dims, sums, counts);
            if totals.total() != n {
                return desynchronized(format!("reduced counts cover {} of {} points", totals.total(), n));
            }

            let update = log.measure(PhaseKind::Computation, "Update", || monitor.update(&current, &totals));
            iterations += 1;
            (config.iteration_done)(&update.centroids, iterations, update.max_shift);
            tracing::debug!(variant = "distributed", rank, iteration = iterations, max_shift = %update.max_shift, "iteration done");

            converged = update.converged;
            centroids = Some(update.centroids);
        }
        if iterations == 0 {
            // without any iteration only the coordinator has seen the initial centroids
            centroids = Some(broadcast_centroids(comm, log, centroids, k, dims)?);
        }

        let labels: Vec<usize> = local.points().iter().map(|p| p.cluster.unwrap_or(UNASSIGNED)).collect();
        if let Some(all) = log.measure(PhaseKind::Communication, "GatherLabels", || comm.gather(&labels))? {
            if all.len() != data.len() {
                return desynchronized(format!("gathered {} labels for {} points", all.len(), data.len()));
            }
            data.points_mut().iter_mut()
                .zip(all)
                .filter(|(_, label)| *label != UNASSIGNED)
                .for_each(|(p, label)| p.cluster = Some(label));
        }

        *status = if converged { Status::Converged } else { Status::MaxIterReached };
        *result = centroids;
        if comm.is_coordinator() {
            let (comp, comm_time) = log.totals();
            tracing::info!(variant = "distributed", iterations, converged, comp_seconds = comp, comm_seconds = comm_time, "k-means finished");
        }
        Ok(iterations)
    }

    fn centroids(&self) -> Option<&CentroidSet<T>> {
        self.centroids.as_ref()
    }

    fn status(&self) -> Status {
        self.status
    }
}

/// Hand the coordinator's **centroids** to every rank.
fn broadcast_centroids<T: Primitive, C: Communicator>(comm: &mut C, log: &mut PhaseLog, centroids: Option<CentroidSet<T>>, k: usize, dims: usize) -> Result<CentroidSet<T>> {
    let mut flat = centroids.map(|c| c.as_flat().to_vec()).unwrap_or_default();
    log.measure(PhaseKind::Communication, "Broadcast", || comm.broadcast(&mut flat))?;
    if flat.len() != k * dims {
        return desynchronized(format!("received {} centroid values, expected {}", flat.len(), k * dims));
    }
    CentroidSet::from_flat(flat, k, dims)
}
