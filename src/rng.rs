use crate::prelude::Real;
use rand::prelude::*;
use rand_distr::{Binomial, Exp, Gamma, Geometric, LogNormal, Normal, Poisson};

/// Seeded pseudo-random engine plus the distribution helpers used across
/// the simulation kernels. One engine per model; replicates get their own
/// clone reseeded with `seed + replicate`, so no engine is ever shared
/// between threads.
#[derive(Debug, Clone)]
pub struct EpiRng {
    rng: SmallRng,
}

/// Fresh engine seeded from the OS entropy pool.
pub fn default_rng() -> EpiRng {
    EpiRng {
        rng: SmallRng::from_entropy(),
    }
}

impl EpiRng {
    pub fn seeded(seed: u64) -> Self {
        EpiRng {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Uniform draw on [0, 1).
    pub fn runif(&mut self) -> Real {
        self.rng.gen::<Real>()
    }

    pub fn runif_range(&mut self, lo: Real, hi: Real) -> Real {
        lo + (hi - lo) * self.runif()
    }

    /// Uniform index on 0..n. n must be positive.
    pub fn unif_index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        let which = (self.runif() * n as Real) as usize;
        which.min(n - 1)
    }

    pub fn gen_bool(&mut self, p: Real) -> bool {
        self.runif() < p
    }

    pub fn rnorm(&mut self, mean: Real, sd: Real) -> Real {
        debug_assert!(sd >= 0.0);
        let d = Normal::new(mean, sd).unwrap_or_else(|_| Normal::new(mean, 0.0).unwrap());
        d.sample(&mut self.rng)
    }

    pub fn rlnorm(&mut self, meanlog: Real, sdlog: Real) -> Real {
        debug_assert!(sdlog >= 0.0);
        let d = LogNormal::new(meanlog, sdlog)
            .unwrap_or_else(|_| LogNormal::new(meanlog, 0.0).unwrap());
        d.sample(&mut self.rng)
    }

    pub fn rgamma(&mut self, shape: Real, scale: Real) -> Real {
        debug_assert!(shape > 0.0 && scale > 0.0);
        match Gamma::new(shape, scale) {
            Ok(d) => d.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    pub fn rexp(&mut self, rate: Real) -> Real {
        debug_assert!(rate > 0.0);
        match Exp::new(rate) {
            Ok(d) => d.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    pub fn rpois(&mut self, lambda: Real) -> u64 {
        if lambda <= 0.0 {
            return 0;
        }
        Poisson::new(lambda).map(|d| d.sample(&mut self.rng) as u64).unwrap_or(0)
    }

    /// Number of failures before the first success.
    pub fn rgeom(&mut self, p: Real) -> u64 {
        debug_assert!(p > 0.0 && p <= 1.0);
        Geometric::new(p).map(|d| d.sample(&mut self.rng)).unwrap_or(0)
    }

    pub fn rbinom(&mut self, n: u64, p: Real) -> u64 {
        if n == 0 || p <= 0.0 {
            return 0;
        }
        let p = p.min(1.0);
        Binomial::new(n, p).map(|d| d.sample(&mut self.rng)).unwrap_or(0)
    }

    /// Negative binomial via the standard gamma-Poisson mixture: the number
    /// of failures before `size` successes with success probability `prob`.
    pub fn rnbinom(&mut self, size: Real, prob: Real) -> u64 {
        debug_assert!(size > 0.0 && prob > 0.0 && prob <= 1.0);
        if prob >= 1.0 {
            return 0;
        }
        let lambda = self.rgamma(size, (1.0 - prob) / prob);
        self.rpois(lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = EpiRng::seeded(42);
        let mut b = EpiRng::seeded(42);
        for _ in 0..100 {
            assert_eq!(a.runif(), b.runif());
        }
        let mut c = a.clone();
        assert_eq!(a.rnorm(0.0, 1.0), c.rnorm(0.0, 1.0));
    }

    #[test]
    fn unif_index_in_bounds() {
        let mut rng = EpiRng::seeded(7);
        for _ in 0..1000 {
            assert!(rng.unif_index(10) < 10);
        }
        assert_eq!(rng.unif_index(1), 0);
    }

    #[test]
    fn binomial_mean() {
        let mut rng = EpiRng::seeded(11);
        let total: u64 = (0..2000).map(|_| rng.rbinom(100, 0.3)).sum();
        let mean = total as Real / 2000.0;
        assert!((mean - 30.0).abs() < 1.0, "mean = {}", mean);
    }

    #[test]
    fn degenerate_draws() {
        let mut rng = EpiRng::seeded(3);
        assert_eq!(rng.rbinom(0, 0.5), 0);
        assert_eq!(rng.rbinom(10, 0.0), 0);
        assert_eq!(rng.rpois(0.0), 0);
        assert_eq!(rng.rnbinom(2.0, 1.0), 0);
    }
}
