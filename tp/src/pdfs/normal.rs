//! An isotropic normal distribution as the example target

use super::Pdf;

/// Isotropic normal with mean `mu` and standard deviation `sigma`
#[derive(Debug, Clone)]
pub struct Normal {
    mu: f64,
    sigma: f64,
}

impl Normal {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }

    /// Standard normal
    pub fn standard() -> Self {
        Self::new(0.0, 1.0)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl Pdf for Normal {
    fn log_prob(&self, x: &[f64]) -> f64 {
        let ss: f64 = x.iter().map(|xi| (xi - self.mu).powi(2)).sum();
        -0.5 * ss / (self.sigma * self.sigma)
    }
}
