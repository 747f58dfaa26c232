//! One rank of a distributed run over TCP. Start `--size` processes with the same
//! arguments and ranks `0..size`; rank 0 listens on `--addr` and owns the data.
//!
//! ```bash
//! for r in 1 2 3; do cargo run --example tcp_rank -- --rank $r --size 4 & done
//! cargo run --example tcp_rank -- --rank 0 --size 4
//! ```

use clap::Parser;
use kmeans_engines::{comm::{Communicator, TcpComm}, *};
use rand::prelude::*;
use std::{fs::File, net::TcpListener, path::PathBuf, thread, time::Duration};

#[derive(Parser, Debug)]
#[command(name = "tcp_rank")]
#[command(about = "Run one rank of a distributed k-means over TCP")]
struct Args {
    #[arg(long)]
    rank: usize,

    #[arg(long)]
    size: usize,

    #[arg(long, default_value = "127.0.0.1:7878")]
    addr: String,

    #[arg(long, default_value = "200000")]
    points: usize,

    #[arg(long, default_value = "4")]
    dims: usize,

    #[arg(long, default_value = "8")]
    k: usize,

    #[arg(long, default_value = "100")]
    max_iter: usize,

    /// Worker threads per rank (single-threaded when unset)
    #[arg(long)]
    threads: Option<usize>,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Where to write this rank's phase log (`mpi_log_rank_<rank>.csv`)
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,
}

fn join(args: &Args) -> Result<TcpComm> {
    if args.rank == comm::COORDINATOR {
        return TcpComm::accept(TcpListener::bind(&args.addr)?, args.size);
    }
    // the coordinator may not be listening yet
    let mut attempts = 0;
    loop {
        match TcpComm::connect(&args.addr, args.rank, args.size) {
            Err(KMeansError::Io(e)) if attempts < 50 => {
                tracing::debug!(error = %e, attempts, "coordinator not reachable yet");
                attempts += 1;
                thread::sleep(Duration::from_millis(200));
            }
            result => return result,
        }
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let comm = join(&args)?;
    let mut data = if comm.is_coordinator() {
        let mut rnd = StdRng::seed_from_u64(args.seed);
        let samples: Vec<f64> = (0..args.points * args.dims).map(|_| rnd.gen_range(0.0..100.0)).collect();
        Dataset::from_flat(&samples, args.points, args.dims)?
    } else {
        Dataset::new(Vec::new())?
    };

    let mut builder = KMeansConfig::build().k(args.k).max_iter(args.max_iter).seed(args.seed);
    if let Some(threads) = args.threads {
        builder = builder.threads(threads);
    }
    let conf = builder.build();

    let mut kmean = DistributedKMeans::new(&conf, comm)?;
    let iterations = kmean.run(&mut data)?;

    let log = kmean.phase_log();
    let (comp, comm_time) = log.totals();
    println!(
        "rank {}: {} iterations ({:?}), {:.3}s computing, {:.3}s communicating",
        args.rank, iterations, kmean.status(), comp, comm_time
    );
    if kmean.comm().is_coordinator() {
        println!("Centroids: {:?}", kmean.centroids().map(CentroidSet::as_flat));
    }
    log.write_csv(File::create(args.log_dir.join(format!("mpi_log_rank_{}.csv", args.rank)))?)?;
    Ok(())
}
