mod lloyd;
mod serial;
mod shared;
mod distributed;

pub use serial::SerialKMeans;
pub use shared::SharedMemoryKMeans;
pub use distributed::DistributedKMeans;
