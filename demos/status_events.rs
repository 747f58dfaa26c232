use kmeans_engines::*;

fn main() {
    let (sample_cnt, sample_dims, k, max_iter) = (20000, 20, 4, 2500);

    // Generate some random data
    let mut samples = vec![0.0f64;sample_cnt * sample_dims];
    samples.iter_mut().for_each(|v| *v = rand::random());
    let mut data = Dataset::from_flat(&samples, sample_cnt, sample_dims).unwrap();

	let conf = KMeansConfig::build()
		.k(k)
		.max_iter(max_iter)
		.threads(4)
		.init_done(&|_| println!("Initialization completed."))
		.iteration_done(&|c, nr, max_shift|
			println!("Iteration {} - largest squared shift: {:.3e} | first centroid: {:.3?}",
				nr, max_shift, &c.centroid(0)[..3]))
		.build();

    let mut kmean = SharedMemoryKMeans::new(&conf).unwrap();
    let iterations = kmean.run(&mut data).unwrap();

    println!("Finished after {} iterations ({:?})", iterations, kmean.status());
    println!("Centroids: {:?}", kmean.centroids().unwrap().as_flat());
    println!("Cluster-Assignments: {:?}", &data.labels()[..20]);
}
