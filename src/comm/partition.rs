/// Block distribution of `n` items over `ranks` ranks: contiguous, in order, without gaps
/// or overlap. The first `n % ranks` ranks receive one item more than the rest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}
impl Partition {
    pub fn new(n: usize, ranks: usize) -> Self {
        assert!(ranks > 0, "partition over zero ranks");
        let (base, remainder) = (n / ranks, n % ranks);
        let counts: Vec<usize> = (0..ranks).map(|r| base + usize::from(r < remainder)).collect();
        let offsets = offsets_of(&counts);
        Self { counts, offsets }
    }

    /// The same partition measured in elements of `width` values each
    /// (points → coordinates of a row-major buffer).
    pub fn scaled(&self, width: usize) -> Self {
        Self {
            counts: self.counts.iter().map(|c| c * width).collect(),
            offsets: self.offsets.iter().map(|o| o * width).collect(),
        }
    }

    pub fn ranks(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn count(&self, rank: usize) -> usize {
        self.counts[rank]
    }

    pub fn range(&self, rank: usize) -> std::ops::Range<usize> {
        self.offsets[rank]..self.offsets[rank] + self.counts[rank]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Start offsets of consecutive slices with the given **counts**.
pub(crate) fn offsets_of(counts: &[usize]) -> Vec<usize> {
    counts.iter()
        .scan(0, |acc, &c| { let offset = *acc; *acc += c; Some(offset) })
        .collect()
}
