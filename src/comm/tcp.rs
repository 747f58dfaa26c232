use super::{partition::offsets_of, sum_in_rank_order, Communicator, COORDINATOR};
use crate::{error::invalid, memory::Element, KMeansError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    io::{self, Read, Write},
    net::{TcpListener, TcpStream, ToSocketAddrs},
};

/// Largest frame a rank accepts. A longer length prefix is treated as a corrupt stream.
const MAX_FRAME_BYTES: u64 = 1 << 31;

/// A process group connected over TCP in a star around the coordinator.
///
/// The coordinator holds one stream per peer; every other rank holds a single stream to
/// the coordinator. Rooted collectives run over the star directly, the all-reduce is a
/// gather to the coordinator (summed in rank order) followed by a broadcast of the total.
///
/// Frames are a little-endian `u64` byte length followed by a bincode-encoded vector.
/// A peer that disappears surfaces as an I/O error on the ranks talking to it.
pub struct TcpComm {
    rank: usize,
    size: usize,
    /// Coordinator: streams to ranks `1..size` (index `r - 1`). Others: the stream to the coordinator.
    streams: Vec<TcpStream>,
}
impl TcpComm {
    /// Coordinator side: wait until ranks `1..size` connected to **listener**.
    pub fn accept(listener: TcpListener, size: usize) -> Result<Self> {
        if size == 0 {
            return invalid("a process group needs at least one rank");
        }
        let mut peers: Vec<Option<TcpStream>> = (1..size).map(|_| None).collect();
        for _ in 1..size {
            let (mut stream, addr) = listener.accept()?;
            stream.set_nodelay(true)?;
            let hello: Vec<u64> = recv_frame(&mut stream)?;
            let rank = match hello.as_slice() {
                &[rank, peer_size] if peer_size as usize == size && rank >= 1 && (rank as usize) < size => rank as usize,
                _ => return invalid(format!("unexpected handshake {:?} from {}", hello, addr)),
            };
            if peers[rank - 1].is_some() {
                return invalid(format!("rank {} connected twice", rank));
            }
            tracing::debug!(rank, %addr, "peer joined process group");
            peers[rank - 1] = Some(stream);
        }
        let streams = peers.into_iter().flatten().collect();
        Ok(Self { rank: COORDINATOR, size, streams })
    }

    /// Peer side: join the group of **size** ranks as **rank** via the coordinator at **addr**.
    pub fn connect<A: ToSocketAddrs>(addr: A, rank: usize, size: usize) -> Result<Self> {
        if rank == COORDINATOR || rank >= size {
            return invalid(format!("cannot join a group of {} ranks as rank {}", size, rank));
        }
        let mut stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        send_frame(&mut stream, &[rank as u64, size as u64])?;
        Ok(Self { rank, size, streams: vec![stream] })
    }

    fn coordinator_stream(&mut self) -> &mut TcpStream {
        &mut self.streams[0]
    }
}

fn send_frame<E: Serialize>(stream: &mut TcpStream, values: &[E]) -> Result<()> {
    let payload = bincode::serialize(values)?;
    stream.write_all(&(payload.len() as u64).to_le_bytes())?;
    stream.write_all(&payload)?;
    Ok(())
}

fn recv_frame<E: DeserializeOwned>(stream: &mut TcpStream) -> Result<Vec<E>> {
    let mut len = [0u8; 8];
    stream.read_exact(&mut len)?;
    let len = u64::from_le_bytes(len);
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds the limit of {} bytes", len, MAX_FRAME_BYTES),
        ).into());
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload)?;
    Ok(bincode::deserialize(&payload)?)
}

impl Communicator for TcpComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast<E: Element>(&mut self, buf: &mut Vec<E>) -> Result<()> {
        if self.is_coordinator() {
            for stream in self.streams.iter_mut() {
                send_frame(stream, &buf[..])?;
            }
        } else {
            *buf = recv_frame(self.coordinator_stream())?;
        }
        Ok(())
    }

    fn scatter<E: Element>(&mut self, send: Option<&[E]>, counts: &[usize]) -> Result<Vec<E>> {
        if counts.len() != self.size {
            return Err(KMeansError::Desynchronized(format!("scatter counts for {} ranks in a group of {}", counts.len(), self.size)));
        }
        if !self.is_coordinator() {
            return recv_frame(self.coordinator_stream());
        }
        let send = send.unwrap_or(&[]);
        if send.len() < counts.iter().sum() {
            return Err(KMeansError::Desynchronized(format!(
                "scatter buffer holds {} elements, counts need {}", send.len(), counts.iter().sum::<usize>()
            )));
        }
        let offsets = offsets_of(counts);
        for (peer, stream) in self.streams.iter_mut().enumerate() {
            let r = peer + 1;
            send_frame(stream, &send[offsets[r]..offsets[r] + counts[r]])?;
        }
        Ok(send[..counts[COORDINATOR]].to_vec())
    }

    fn all_reduce_sum<E: Element>(&mut self, local: &[E]) -> Result<Vec<E>> {
        if !self.is_coordinator() {
            send_frame(self.coordinator_stream(), local)?;
            return recv_frame(self.coordinator_stream());
        }
        let mut parts = vec![local.to_vec()];
        for (peer, stream) in self.streams.iter_mut().enumerate() {
            let part: Vec<E> = recv_frame(stream)?;
            if part.len() != local.len() {
                return Err(KMeansError::Desynchronized(format!(
                    "rank {} reduces {} elements, expected {}", peer + 1, part.len(), local.len()
                )));
            }
            parts.push(part);
        }
        let total = sum_in_rank_order(local.len(), parts.iter().map(Vec::as_slice));
        for stream in self.streams.iter_mut() {
            send_frame(stream, &total)?;
        }
        Ok(total)
    }

    fn gather<E: Element>(&mut self, local: &[E]) -> Result<Option<Vec<E>>> {
        if !self.is_coordinator() {
            send_frame(self.coordinator_stream(), local)?;
            return Ok(None);
        }
        let mut all = local.to_vec();
        for stream in self.streams.iter_mut() {
            all.extend(recv_frame::<E>(stream)?);
        }
        Ok(Some(all))
    }
}
