/// Binary-indexed tree of signed byte deltas keyed by line number.
///
/// `prefix_sum(line)` is the net byte shift of that line's start since the
/// block storage was last materialized. Updates and queries are
/// O(log lines).
#[derive(Debug)]
pub struct Fenwick {
    tree: Vec<i64>,
}

impl Fenwick {
    pub fn new(n: usize) -> Self {
        Self {
            tree: vec![0; n + 1],
        }
    }

    /// Add `delta` at `idx`, affecting every prefix sum from `idx` on.
    /// Out-of-capacity indices are ignored; they can only describe lines
    /// past the end of the document.
    pub fn add(&mut self, idx: usize, delta: i64) {
        let mut i = idx + 1;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += i & i.wrapping_neg();
        }
    }

    /// Sum of deltas at indices `0..=idx`.
    pub fn prefix_sum(&self, idx: usize) -> i64 {
        let mut sum = 0;
        let mut i = (idx + 1).min(self.tree.len() - 1);
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }

    /// Zero the tree, growing it to hold `n` indices.
    pub fn reset(&mut self, n: usize) {
        self.tree.clear();
        self.tree.resize(n + 1, 0);
    }
}
