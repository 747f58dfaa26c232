use num::{Float, NumCast, Zero};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt::{Debug, Display, LowerExp},
    iter::Sum,
    ops::{Add, AddAssign, Sub, SubAssign},
};

/// Floating point type used for coordinates, centroids and distances.
pub trait Primitive: Add + AddAssign + Sum + Sub + SubAssign + Zero + Float + NumCast
                + PartialOrd + Copy + Default + Display + Debug + Sync + Send + LowerExp + 'static
                + Serialize + DeserializeOwned + for<'a> AddAssign<&'a Self> {}
impl Primitive for f32 {}
impl Primitive for f64 {}

/// Anything that can travel through a collective operation and be sum-reduced.
/// Covers the coordinate primitives as well as the `usize` cluster counts.
pub trait Element: Copy + Zero + AddAssign + Send + Sync + Debug + Serialize + DeserializeOwned + 'static {}
impl<E> Element for E where E: Copy + Zero + AddAssign + Send + Sync + Debug + Serialize + DeserializeOwned + 'static {}
