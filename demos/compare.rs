use clap::{Parser, ValueEnum};
use kmeans_engines::{comm::{Communicator, LocalComm, Partition}, *};
use rand::prelude::*;
use std::{fs::File, path::PathBuf, thread, time::Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Serial,
    Shared,
    Distributed,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "compare")]
#[command(about = "Run the k-means engines on the same random data and compare their timings")]
struct Args {
    #[arg(long, value_enum, default_value = "all")]
    mode: Mode,

    #[arg(long, default_value = "100000")]
    points: usize,

    #[arg(long, default_value = "8")]
    dims: usize,

    #[arg(long, default_value = "16")]
    k: usize,

    #[arg(long, default_value = "100")]
    max_iter: usize,

    #[arg(long, default_value = "0.0001")]
    threshold: f64,

    /// Worker threads of the shared-memory engine
    #[arg(long, default_value = "4")]
    threads: usize,

    /// Ranks of the (in-process) distributed engine
    #[arg(long, default_value = "4")]
    ranks: usize,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Run every engine this many times and report the mean wall time
    #[arg(long, default_value = "1")]
    repeat: usize,

    /// Directory to write one phase log per rank into (`mpi_log_rank_<rank>.csv`)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn generate(points: usize, dims: usize, seed: u64) -> Dataset<f64> {
    let mut rnd = StdRng::seed_from_u64(seed);
    let samples: Vec<f64> = (0..points * dims).map(|_| rnd.gen_range(0.0..100.0)).collect();
    Dataset::from_flat(&samples, points, dims).expect("generated buffer matches its shape")
}

fn config(args: &Args, threads: Option<usize>) -> KMeansConfig<'static, f64> {
    let builder = KMeansConfig::build().k(args.k).max_iter(args.max_iter).threshold(args.threshold).seed(args.seed);
    match threads {
        Some(threads) => builder.threads(threads),
        None => builder,
    }.build()
}

fn timed<R>(repeat: usize, mut run: impl FnMut() -> Result<R>) -> Result<(R, f64)> {
    let start = Instant::now();
    let mut result = run()?;
    for _ in 1..repeat {
        result = run()?;
    }
    Ok((result, start.elapsed().as_secs_f64() / repeat.max(1) as f64))
}

fn report(name: &str, seconds: f64, iterations: usize, status: Status, baseline: Option<f64>) {
    match baseline {
        Some(serial) => println!("{:<12} {:>9.3}s  {:>4} iterations  {:?}  speedup {:.2}x", name, seconds, iterations, status, serial / seconds),
        None => println!("{:<12} {:>9.3}s  {:>4} iterations  {:?}", name, seconds, iterations, status),
    }
}

fn run_distributed(args: &Args, data: &Dataset<f64>) -> Result<(usize, Status, Vec<Option<usize>>, Vec<PhaseLog>)> {
    let group = LocalComm::group(args.ranks)?;
    let outcomes: Vec<Result<(usize, Status, Dataset<f64>, PhaseLog)>> = thread::scope(|s| {
        let handles: Vec<_> = group.into_iter().map(|comm| s.spawn(move || -> Result<(usize, Status, Dataset<f64>, PhaseLog)> {
            let mut mine = if comm.is_coordinator() { data.clone() } else { Dataset::new(Vec::new())? };
            let conf = config(args, None);
            let mut kmean = DistributedKMeans::new(&conf, comm)?;
            let iterations = kmean.run(&mut mine)?;
            Ok((iterations, kmean.status(), mine, kmean.phase_log().clone()))
        })).collect();
        handles.into_iter().map(|h| h.join().expect("rank panicked")).collect()
    });

    let mut logs = Vec::new();
    let mut coordinator = None;
    for outcome in outcomes {
        let (iterations, status, mine, log) = outcome?;
        if coordinator.is_none() {
            coordinator = Some((iterations, status, mine.labels()));
        }
        logs.push(log);
    }
    let (iterations, status, labels) = coordinator.expect("a group has at least one rank");
    Ok((iterations, status, labels, logs))
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    println!("Generating {} points in {} dimensions...", args.points, args.dims);
    let data = generate(args.points, args.dims, args.seed);

    let mut baseline = None;
    let mut serial_labels = None;
    if matches!(args.mode, Mode::Serial | Mode::All) {
        let conf = config(&args, None);
        let mut mine = data.clone();
        let mut kmean = SerialKMeans::new(&conf);
        let (iterations, seconds) = timed(args.repeat, || { mine = data.clone(); kmean.run(&mut mine) })?;
        report("serial", seconds, iterations, kmean.status(), None);
        baseline = Some(seconds);
        serial_labels = Some(mine.labels());
    }

    if matches!(args.mode, Mode::Shared | Mode::All) {
        let conf = config(&args, Some(args.threads));
        let mut mine = data.clone();
        let mut kmean = SharedMemoryKMeans::new(&conf)?;
        let (iterations, seconds) = timed(args.repeat, || { mine = data.clone(); kmean.run(&mut mine) })?;
        report(&format!("shared({})", kmean.threads()), seconds, iterations, kmean.status(), baseline);
        if let Some(ref should) = serial_labels {
            println!("{:<12} labels identical to serial: {}", "", should == &mine.labels());
        }
    }

    if matches!(args.mode, Mode::Distributed | Mode::All) {
        let ((iterations, status, labels, logs), seconds) = timed(args.repeat, || run_distributed(&args, &data))?;
        report(&format!("dist({})", args.ranks), seconds, iterations, status, baseline);
        if let Some(ref should) = serial_labels {
            println!("{:<12} labels identical to serial: {}", "", should == &labels);
        }
        let partition = Partition::new(args.points, args.ranks);
        for (rank, log) in (0..partition.ranks()).zip(&logs) {
            let (comp, comm) = log.totals();
            println!("{:<12} rank {} (points {:?}): {:.3}s computing, {:.3}s communicating", "", rank, partition.range(rank), comp, comm);
        }
        if let Some(ref dir) = args.log_dir {
            for log in &logs {
                log.write_csv(File::create(dir.join(format!("mpi_log_rank_{}.csv", log.rank())))?)?;
            }
            println!("Phase logs written to {}", dir.display());
        }
    }

    Ok(())
}
