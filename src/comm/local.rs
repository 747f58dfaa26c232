use super::{partition::offsets_of, sum_in_rank_order, Communicator, COORDINATOR};
use crate::{error::invalid, memory::Element, KMeansError, Result};
use parking_lot::RwLock;
use std::{
    any::{type_name, Any},
    sync::{Arc, Barrier},
};

/// Which collective a rank is taking part in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Collective {
    Broadcast,
    Scatter,
    AllReduceSum,
    Gather,
}

/// What a rank leaves in its slot for one collective. Ranks without data for the others
/// still announce which collective they are in.
struct Contribution {
    collective: Collective,
    payload: Option<Box<dyn Any + Send + Sync>>,
}

/// One slot per rank plus the barrier all ranks meet at.
struct Exchange {
    slots: RwLock<Vec<Option<Contribution>>>,
    barrier: Barrier,
}

/// A process group whose ranks are threads of the current process.
///
/// Each collective is two barrier rounds: every rank publishes its contribution in its own
/// slot, waits for the others, reads what it needs, and waits again before anyone may
/// overwrite a slot with the next contribution. Ranks that meet in different collectives
/// all fail with [`KMeansError::Desynchronized`]; a rank that never arrives (panicked, or
/// skipped a collective) leaves the other ranks waiting.
pub struct LocalComm {
    rank: usize,
    size: usize,
    exchange: Arc<Exchange>,
}
impl LocalComm {
    /// Create the communicators of a group of **size** ranks; element `r` is rank `r`.
    /// Hand each one to its own thread.
    pub fn group(size: usize) -> Result<Vec<Self>> {
        if size == 0 {
            return invalid("a process group needs at least one rank");
        }
        let exchange = Arc::new(Exchange {
            slots: RwLock::new((0..size).map(|_| None).collect()),
            barrier: Barrier::new(size),
        });
        Ok((0..size).map(|rank| Self { rank, size, exchange: Arc::clone(&exchange) }).collect())
    }

    fn exchange<R>(
        &self,
        contribution: Contribution,
        read: impl FnOnce(&[Option<Contribution>]) -> Result<R>,
    ) -> Result<R> {
        let collective = contribution.collective;
        self.exchange.slots.write()[self.rank] = Some(contribution);
        self.exchange.barrier.wait();
        let result = {
            let slots = self.exchange.slots.read();
            match slots.iter().enumerate().find(|(_, s)| s.as_ref().map(|c| c.collective) != Some(collective)) {
                Some((rank, other)) => Err(KMeansError::Desynchronized(format!(
                    "rank {} is in {:?} while rank {} is in {:?}",
                    self.rank, collective, rank, other.as_ref().map(|c| c.collective)
                ))),
                None => read(&slots[..]),
            }
        };
        self.exchange.barrier.wait();
        result
    }
}

fn contribution<E: Element>(slots: &[Option<Contribution>], rank: usize) -> Result<&[E]> {
    slots[rank].as_ref()
        .and_then(|c| c.payload.as_ref())
        .and_then(|p| p.downcast_ref::<Vec<E>>())
        .map(Vec::as_slice)
        .ok_or_else(|| KMeansError::Desynchronized(
            format!("rank {} contributed no buffer of {}", rank, type_name::<E>())
        ))
}

fn publish<E: Element>(collective: Collective, values: Option<&[E]>) -> Contribution {
    Contribution {
        collective,
        payload: values.map(|v| Box::new(v.to_vec()) as Box<dyn Any + Send + Sync>),
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast<E: Element>(&mut self, buf: &mut Vec<E>) -> Result<()> {
        let root = self.is_coordinator();
        let mine = publish(Collective::Broadcast, root.then(|| buf.as_slice()));
        self.exchange(mine, |slots| {
            if !root {
                *buf = contribution::<E>(slots, COORDINATOR)?.to_vec();
            }
            Ok(())
        })
    }

    fn scatter<E: Element>(&mut self, send: Option<&[E]>, counts: &[usize]) -> Result<Vec<E>> {
        let (rank, size) = (self.rank, self.size);
        let mine = publish(Collective::Scatter, if self.is_coordinator() { send } else { None });
        self.exchange(mine, |slots| {
            if counts.len() != size {
                return Err(KMeansError::Desynchronized(format!("scatter counts for {} ranks in a group of {}", counts.len(), size)));
            }
            let offset = offsets_of(counts)[rank];
            contribution::<E>(slots, COORDINATOR)?
                .get(offset..offset + counts[rank])
                .map(<[E]>::to_vec)
                .ok_or_else(|| KMeansError::Desynchronized(format!("scatter buffer too short for rank {}", rank)))
        })
    }

    fn all_reduce_sum<E: Element>(&mut self, local: &[E]) -> Result<Vec<E>> {
        let size = self.size;
        self.exchange(publish(Collective::AllReduceSum, Some(local)), |slots| {
            let parts = (0..size).map(|r| contribution::<E>(slots, r)).collect::<Result<Vec<_>>>()?;
            if let Some(r) = parts.iter().position(|p| p.len() != local.len()) {
                return Err(KMeansError::Desynchronized(format!(
                    "rank {} reduces {} elements, expected {}", r, parts[r].len(), local.len()
                )));
            }
            Ok(sum_in_rank_order(local.len(), parts.into_iter()))
        })
    }

    fn gather<E: Element>(&mut self, local: &[E]) -> Result<Option<Vec<E>>> {
        let (root, size) = (self.is_coordinator(), self.size);
        self.exchange(publish(Collective::Gather, Some(local)), |slots| {
            if !root {
                return Ok(None);
            }
            let mut all = Vec::new();
            for r in 0..size {
                all.extend_from_slice(contribution::<E>(slots, r)?);
            }
            Ok(Some(all))
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn on_every_rank<R: Send>(size: usize, f: impl Fn(LocalComm) -> R + Sync) -> Vec<R> {
        let group = LocalComm::group(size).unwrap();
        thread::scope(|s| {
            let handles: Vec<_> = group.into_iter().map(|comm| s.spawn(|| f(comm))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn broadcast_from_coordinator() {
        let results = on_every_rank(4, |mut comm| {
            let mut buf = if comm.is_coordinator() { vec![1.5f64, 2.5] } else { Vec::new() };
            comm.broadcast(&mut buf).unwrap();
            buf
        });
        assert!(results.iter().all(|b| b == &[1.5, 2.5]));
    }

    #[test]
    fn scatter_slices() {
        let results = on_every_rank(3, |mut comm| {
            let data: Vec<usize> = (0..7).collect();
            let send = comm.is_coordinator().then(|| data.as_slice());
            comm.scatter(send, &[3, 2, 2]).unwrap()
        });
        assert_eq!(results, vec![vec![0, 1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn all_reduce_is_identical_everywhere() {
        let results = on_every_rank(5, |mut comm| {
            let local = vec![0.1f64 * comm.rank() as f64, 1.0 / (comm.rank() + 1) as f64];
            let counts = comm.all_reduce_sum(&[comm.rank(), 1]).unwrap();
            (comm.all_reduce_sum(&local).unwrap(), counts)
        });
        for (sums, counts) in &results {
            assert_eq!(counts, &vec![10, 5]);
            assert!(sums.iter().zip(results[0].0.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
        }
    }

    #[test]
    fn gather_in_rank_order() {
        let results = on_every_rank(3, |mut comm| {
            let local = vec![comm.rank(); comm.rank()];
            comm.gather(&local).unwrap()
        });
        assert_eq!(results, vec![Some(vec![1, 2, 2]), None, None]);
    }

    #[test]
    fn mismatched_reduction_is_reported() {
        let results = on_every_rank(2, |mut comm| {
            let local = vec![1.0f32; 2 + comm.rank()];
            comm.all_reduce_sum(&local)
        });
        assert!(results.iter().all(|r| matches!(r, Err(KMeansError::Desynchronized(_)))));
    }

    #[test]
    fn mismatched_collectives_are_reported() {
        let results = on_every_rank(2, |mut comm| {
            if comm.is_coordinator() {
                let mut buf = vec![1.0f64, 2.0];
                comm.broadcast(&mut buf).map(|_| ())
            } else {
                comm.gather(&[3.0f64, 4.0]).map(|_| ())
            }
        });
        assert!(results.iter().all(|r| matches!(r, Err(KMeansError::Desynchronized(_)))));
    }

    #[test]
    fn empty_group_rejected() {
        assert!(LocalComm::group(0).is_err());
    }
}
