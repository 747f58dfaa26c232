use crate::{error::invalid, memory::*, KMeansError, Result};

/// A single sample: its coordinates and the cluster it was last assigned to.
#[derive(Clone, Debug, PartialEq)]
pub struct Point<T: Primitive> {
    pub coords: Vec<T>,
    /// `None` until the first assignment step touched this point.
    pub cluster: Option<usize>,
}
impl<T: Primitive> Point<T> {
    pub fn new(coords: Vec<T>) -> Self {
        Self { coords, cluster: None }
    }

    pub fn dims(&self) -> usize {
        self.coords.len()
    }
}
impl<T: Primitive> From<Vec<T>> for Point<T> {
    fn from(coords: Vec<T>) -> Self {
        Self::new(coords)
    }
}


/// Ordered collection of points sharing one dimension.
///
/// The order is stable: flattening into a row-major buffer and rebuilding from it
/// reproduces the same points in the same positions, which is what the distributed
/// engine relies on when it scatters slices and gathers labels back.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset<T: Primitive> {
    points: Vec<Point<T>>,
    dims: usize,
}
impl<T: Primitive> Dataset<T> {
    /// Build a dataset, checking that every point has the same amount of coordinates.
    pub fn new(points: Vec<Point<T>>) -> Result<Self> {
        let dims = points.first().map(Point::dims).unwrap_or(0);
        let data = Self { points, dims };
        data.check_dims()?;
        Ok(data)
    }

    /// Every point still has `dims` coordinates. [`Dataset::points_mut`] gives access to the
    /// coordinates too, so engines check this again before each run.
    pub fn check_dims(&self) -> Result<()> {
        match self.points.iter().find(|p| p.dims() != self.dims) {
            Some(bad) => Err(KMeansError::DimensionMismatch { expected: self.dims, found: bad.dims() }),
            None => Ok(()),
        }
    }

    /// Create a dataset from a row-major buffer.
    ///
    /// ## Arguments
    /// - **samples**: Vector of samples [row-major] = [<sample0>,<sample1>,<sample2>,...]
    /// - **sample_cnt**: Amount of samples, contained in the passed **samples** vector
    /// - **sample_dims**: Amount of dimensions each sample from the **sample** vector has
    pub fn from_flat(samples: &[T], sample_cnt: usize, sample_dims: usize) -> Result<Self> {
        if samples.len() != sample_cnt * sample_dims {
            return invalid(format!(
                "buffer of {} values cannot hold {} samples with {} dimensions",
                samples.len(), sample_cnt, sample_dims
            ));
        }
        if sample_dims == 0 {
            return Ok(Self { points: (0..sample_cnt).map(|_| Point::new(Vec::new())).collect(), dims: 0 });
        }
        let points = samples.chunks_exact(sample_dims)
            .map(|c| Point::new(c.to_vec()))
            .collect();
        Ok(Self { points, dims: sample_dims })
    }

    /// Row-major copy of all coordinates (point `i`, coordinate `d` at `i * dims + d`).
    pub fn to_flat(&self) -> Vec<T> {
        let mut flat = Vec::with_capacity(self.points.len() * self.dims);
        self.points.iter().for_each(|p| flat.extend_from_slice(&p.coords));
        flat
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn points(&self) -> &[Point<T>] {
        &self.points
    }

    /// Mutable access to the points. Only the labels are meant to be changed through this.
    pub fn points_mut(&mut self) -> &mut [Point<T>] {
        &mut self.points
    }

    pub fn labels(&self) -> Vec<Option<usize>> {
        self.points.iter().map(|p| p.cluster).collect()
    }

    pub fn into_points(self) -> Vec<Point<T>> {
        self.points
    }
}


/// The k cluster centers of a run, stored row-major = [<centroid0>,<centroid1>,...].
/// A centroid's index is the identity of its cluster for the whole run.
#[derive(Clone, Debug, PartialEq)]
pub struct CentroidSet<T: Primitive> {
    k: usize,
    dims: usize,
    coords: Vec<T>,
}
impl<T: Primitive> CentroidSet<T> {
    pub fn from_flat(coords: Vec<T>, k: usize, dims: usize) -> Result<Self> {
        if k == 0 || coords.len() != k * dims {
            return invalid(format!("{} values do not form {} centroids of {} dimensions", coords.len(), k, dims));
        }
        Ok(Self { k, dims, coords })
    }

    pub(crate) fn zeroed(k: usize, dims: usize) -> Self {
        Self { k, dims, coords: vec![T::zero(); k * dims] }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn centroid(&self, idx: usize) -> &[T] {
        &self.coords[idx * self.dims..(idx + 1) * self.dims]
    }

    pub(crate) fn centroid_mut(&mut self, idx: usize) -> &mut [T] {
        &mut self.coords[idx * self.dims..(idx + 1) * self.dims]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        // dims == 0 would make chunks_exact panic
        self.coords.chunks_exact(self.dims.max(1)).take(self.k)
    }

    pub fn as_flat(&self) -> &[T] {
        &self.coords
    }
}
