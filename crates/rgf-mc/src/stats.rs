//! Batch statistics with a commutative, associative merge.

use serde::{Deserialize, Serialize};

/// Running `(count, mean, sum of squared deviations)` accumulator.
///
/// Batches accumulated independently merge with the pairwise update of Chan
/// et al., so partial statistics from worker threads combine in any fixed
/// order without revisiting the samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Number of accumulated samples.
    pub n: u64,
    /// Sample mean.
    pub mean: f64,
    /// Sum of squared deviations from the mean.
    pub m2: f64,
}

impl BatchStats {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates one sample (Welford update).
    pub fn push(&mut self, value: f64) {
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Merges another accumulator into this one.
    pub fn merge(&mut self, other: &BatchStats) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = *other;
            return;
        }
        let n1 = self.n as f64;
        let n2 = other.n as f64;
        let delta = other.mean - self.mean;
        let total = n1 + n2;
        self.mean += delta * n2 / total;
        self.m2 += other.m2 + delta * delta * n1 * n2 / total;
        self.n += other.n;
    }

    /// Unbiased sample variance; zero below two samples.
    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / (self.n - 1) as f64
        }
    }

    /// Standard error of the mean.
    pub fn std_error(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            (self.variance() / self.n as f64).sqrt()
        }
    }
}

/// Effective sample size of a correlated chain.
///
/// Uses the initial positive sequence estimator: autocovariances are summed
/// until the first non-positive term, then `ESS = n / (1 + 2 Σ ρ_k)`.
pub fn effective_sample_size(chain: &[f64]) -> f64 {
    let n = chain.len();
    if n < 4 {
        return n as f64;
    }
    let mean = chain.iter().sum::<f64>() / n as f64;
    let var: f64 = chain.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
    if var <= 0.0 {
        return n as f64;
    }

    let mut rho_sum = 0.0;
    for lag in 1..n / 2 {
        let cov: f64 = chain[..n - lag]
            .iter()
            .zip(chain[lag..].iter())
            .map(|(a, b)| (a - mean) * (b - mean))
            .sum::<f64>()
            / n as f64;
        let rho = cov / var;
        if rho <= 0.0 {
            break;
        }
        rho_sum += rho;
    }

    let ess = n as f64 / (1.0 + 2.0 * rho_sum);
    ess.clamp(1.0, n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_matches_pushing_everything() {
        let values = [1.0, 2.5, -0.5, 4.0, 3.25, 0.0, -2.0, 1.5];
        let mut whole = BatchStats::new();
        for v in values {
            whole.push(v);
        }
        let mut left = BatchStats::new();
        let mut right = BatchStats::new();
        for v in &values[..3] {
            left.push(*v);
        }
        for v in &values[3..] {
            right.push(*v);
        }
        let mut merged = left;
        merged.merge(&right);

        assert_eq!(merged.n, whole.n);
        assert!((merged.mean - whole.mean).abs() < 1e-12);
        assert!((merged.m2 - whole.m2).abs() < 1e-12);
    }

    #[test]
    fn merge_is_commutative() {
        let mut a = BatchStats::new();
        let mut b = BatchStats::new();
        for v in [1.0, 2.0, 3.0] {
            a.push(v);
        }
        for v in [10.0, 20.0] {
            b.push(v);
        }
        let mut ab = a;
        ab.merge(&b);
        let mut ba = b;
        ba.merge(&a);
        assert_eq!(ab.n, ba.n);
        assert!((ab.mean - ba.mean).abs() < 1e-12);
        assert!((ab.m2 - ba.m2).abs() < 1e-9);
    }

    #[test]
    fn merging_an_empty_accumulator_is_the_identity() {
        let mut a = BatchStats::new();
        for v in [1.0, 2.0] {
            a.push(v);
        }
        let before = a;
        a.merge(&BatchStats::new());
        assert_eq!(a, before);
    }

    #[test]
    fn iid_chain_has_near_full_ess() {
        let mut rng = rgf_core::rng::RngHandle::from_seed(7);
        let chain: Vec<f64> = (0..512).map(|_| rng.uniform()).collect();
        let ess = effective_sample_size(&chain);
        assert!(ess > 256.0, "ess = {ess}");
    }

    #[test]
    fn sticky_chain_has_low_ess() {
        // Long constant runs mimic a sticky Metropolis chain.
        let chain: Vec<f64> = (0..512).map(|i| (i / 64) as f64).collect();
        let ess = effective_sample_size(&chain);
        assert!(ess < 64.0, "ess = {ess}");
    }
}
