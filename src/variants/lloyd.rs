use crate::{
    inits, memory::*, CentroidSet, ClusterSums, ConvergenceMonitor, Dataset, DistanceFunction, KMeansConfig, Point,
    Result, Status,
};
use rayon::prelude::*;

/// Index of the centroid nearest to **coords**. Ties go to the lowest index: a later centroid
/// only wins with a strictly smaller distance.
#[inline(always)]
pub(crate) fn nearest_centroid<T: Primitive, D: DistanceFunction<T>>(coords: &[T], centroids: &CentroidSet<T>, distance: &D) -> usize {
    let mut best_idx = 0;
    let mut best_dist = T::infinity();
    for (ci, c) in centroids.iter().enumerate() {
        let dist = distance.distance(coords, c);
        if dist < best_dist {
            best_idx = ci;
            best_dist = dist;
        }
    }
    best_idx
}

/// The two data-parallel phases of a Lloyd iteration. Implementations differ only in how
/// the work is spread; the results they produce are the same.
pub(crate) trait Executor<T: Primitive> {
    /// Label every point with its nearest centroid. **centroids** is a read-only snapshot.
    fn assign<D: DistanceFunction<T>>(&self, points: &mut [Point<T>], centroids: &CentroidSet<T>, distance: &D);

    /// Sum up the points per label.
    fn accumulate(&self, points: &[Point<T>], k: usize, dims: usize) -> ClusterSums<T>;
}


/// Plain loops on the calling thread.
pub(crate) struct Sequential;
impl<T: Primitive> Executor<T> for Sequential {
    fn assign<D: DistanceFunction<T>>(&self, points: &mut [Point<T>], centroids: &CentroidSet<T>, distance: &D) {
        points.iter_mut()
            .for_each(|p| p.cluster = Some(nearest_centroid(&p.coords, centroids, distance)));
    }

    fn accumulate(&self, points: &[Point<T>], k: usize, dims: usize) -> ClusterSums<T> {
        let mut sums = ClusterSums::new(k, dims);
        points.iter().for_each(|p| sums.add_point(p));
        sums
    }
}


/// Fork-join on a dedicated rayon pool with a fixed amount of threads.
pub(crate) struct Pooled {
    pool: rayon::ThreadPool,
}
impl Pooled {
    pub(crate) fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        Ok(Self { pool: builder.build()? })
    }

    pub(crate) fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    // manually calculate work-packet size, because rayon does not do static scheduling (which is more apropriate here)
    fn work_packet_size(&self, sample_cnt: usize) -> usize {
        (sample_cnt / self.threads()).max(1)
    }
}
impl<T: Primitive> Executor<T> for Pooled {
    fn assign<D: DistanceFunction<T>>(&self, points: &mut [Point<T>], centroids: &CentroidSet<T>, distance: &D) {
        let work_packet_size = self.work_packet_size(points.len());
        self.pool.install(|| {
            points.par_iter_mut()
                .with_min_len(work_packet_size)
                .for_each(|p| p.cluster = Some(nearest_centroid(&p.coords, centroids, distance)));
        });
    }

    fn accumulate(&self, points: &[Point<T>], k: usize, dims: usize) -> ClusterSums<T> {
        let work_packet_size = self.work_packet_size(points.len());
        // Thread-local partial sums, merged once per worker after the parallel region
        self.pool.install(|| {
            points.par_iter()
                .with_min_len(work_packet_size)
                .fold(|| ClusterSums::new(k, dims), |mut acc, p| { acc.add_point(p); acc })
                .reduce(|| ClusterSums::new(k, dims), ClusterSums::merge)
        })
    }
}


/// Run-wide bookkeeping shared by the single-process engines.
pub(crate) struct Lloyd<'c, 'a, T: Primitive> {
    pub(crate) config: &'c KMeansConfig<'a, T>,
    pub(crate) centroids: Option<CentroidSet<T>>,
    pub(crate) status: Status,
}
impl<'c, 'a, T: Primitive> Lloyd<'c, 'a, T> {
    pub(crate) fn new(config: &'c KMeansConfig<'a, T>) -> Self {
        Self { config, centroids: None, status: Status::Init }
    }

    /// `Init → (Assign → Update)* → Converged | MaxIterReached`
    pub(crate) fn run<X, D>(&mut self, variant: &'static str, executor: &X, distance: &D, data: &mut Dataset<T>) -> Result<usize>
            where X: Executor<T>, D: DistanceFunction<T> {
        self.centroids = None;
        self.status = Status::Init;
        let config = self.config;
        data.check_dims()?;
        config.validate(data.len(), data.dims())?;

        let (k, dims) = (config.k, data.dims());
        let mut centroids = inits::initial_centroids(config, data)?;
        (config.init_done)(&centroids);
        tracing::info!(variant, k, points = data.len(), dims, max_iter = config.max_iter, "starting k-means");

        let monitor = ConvergenceMonitor::new(config.threshold);
        let mut iterations = 0;
        let mut converged = false;
        while iterations < config.max_iter && !converged {
            executor.assign(data.points_mut(), &centroids, distance);
            let totals = executor.accumulate(data.points(), k, dims);
            debug_assert_eq!(totals.total(), data.len());

            let update = monitor.update(&centroids, &totals);
            iterations += 1;
            (config.iteration_done)(&update.centroids, iterations, update.max_shift);
            tracing::debug!(variant, iteration = iterations, max_shift = %update.max_shift, "iteration done");

            converged = update.converged;
            centroids = update.centroids;
        }

        self.status = if converged { Status::Converged } else { Status::MaxIterReached };
        self.centroids = Some(centroids);
        tracing::info!(variant, iterations, converged, "k-means finished");
        Ok(iterations)
    }
}
