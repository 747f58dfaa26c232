//! Collective communication between the ranks of a process group.
//!
//! Every operation here is *collective*: all ranks of the group must call it, in the same
//! order, with compatible arguments. A rank that skips or reorders a call leaves its peers
//! blocked forever, so callers keep their collective sequence independent of their role and
//! pass role-specific data as `Option`.
//!
//! Rank [`COORDINATOR`] (rank 0) is the root of every rooted collective.

use crate::{memory::Element, Result};

mod local;
mod partition;
mod tcp;

pub use local::LocalComm;
pub use partition::Partition;
pub use tcp::TcpComm;

/// Rank that owns the full dataset and roots broadcast, scatter and gather.
pub const COORDINATOR: usize = 0;

pub trait Communicator {
    fn rank(&self) -> usize;

    /// Amount of ranks in the group.
    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// Replace **buf** on every rank with the coordinator's **buf**.
    fn broadcast<E: Element>(&mut self, buf: &mut Vec<E>) -> Result<()>;

    /// Split the coordinator's **send** buffer into consecutive slices of **counts[rank]**
    /// elements and hand each rank its slice. **send** is only read on the coordinator.
    fn scatter<E: Element>(&mut self, send: Option<&[E]>, counts: &[usize]) -> Result<Vec<E>>;

    /// Element-wise sum of every rank's **local** buffer, delivered to every rank.
    /// The contributions are added in rank order, so all ranks receive bit-identical results.
    fn all_reduce_sum<E: Element>(&mut self, local: &[E]) -> Result<Vec<E>>;

    /// Concatenation of every rank's **local** buffer in rank order, delivered to the
    /// coordinator (`None` elsewhere).
    fn gather<E: Element>(&mut self, local: &[E]) -> Result<Option<Vec<E>>>;
}

/// Rank-ordered element-wise sum used by every implementation of `all_reduce_sum`.
pub(crate) fn sum_in_rank_order<'a, E: Element>(len: usize, contributions: impl Iterator<Item = &'a [E]>) -> Vec<E> {
    let mut total = vec![E::zero(); len];
    contributions.for_each(|c| total.iter_mut().zip(c.iter()).for_each(|(t, &v)| *t += v));
    total
}
