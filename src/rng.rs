/// Small deterministic generator for reproducible synthetic weights.
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn gen_range(&mut self, range: std::ops::Range<f64>) -> f64 {
        let normalized = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        range.start + normalized * (range.end - range.start)
    }

    /// Uniform in `[-bound, bound)`.
    pub fn uniform(&mut self, bound: f32) -> f32 {
        self.gen_range(-(bound as f64)..bound as f64) as f32
    }

    pub fn fill(&mut self, n: usize, bound: f32) -> Vec<f32> {
        (0..n).map(|_| self.uniform(bound)).collect()
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        // xorshift the LCG output so low bits are usable
        let mut x = self.state;
        x ^= x >> 33;
        x = x.wrapping_mul(0xff51afd7ed558ccd);
        x ^= x >> 33;
        x
    }
}
