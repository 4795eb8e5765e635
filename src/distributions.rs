/*!
Target-distribution capability and example targets.

The sampler consumes a target through the [`GradientTarget`] trait: an
unnormalized log-density plus its gradient, both pure. Anything that can
evaluate those two functions for a fixed-dimension parameter vector can be
sampled from; the example implementations below are used by the demo
binary and the test-suite.

This module is generic over the floating-point precision (`f32` or `f64`)
via [`num_traits::Float`].

# Examples

```rust
use mini_nuts::distributions::{DiagGaussian, GradientTarget};

let gauss = DiagGaussian::new(vec![0.0_f64, 1.0], vec![1.0, 2.0]);
let theta = vec![0.5, -0.5];
let mut grad = vec![0.0; 2];
let logp = gauss.logp_and_grad(&theta, &mut grad).unwrap();
println!("logp = {logp}, grad = {grad:?}");
```
*/

use crate::error::TargetError;
use num_traits::Float;
use rand::Rng;

/// A differentiable target distribution over a fixed-dimension parameter
/// vector.
///
/// Both methods must be pure and deterministic. Returning `Err` aborts the
/// whole run; returning a non-finite value inside a trajectory is treated
/// as a numeric divergence and truncates that trajectory only.
pub trait GradientTarget<T: Float> {
    /// Unnormalized log-density at `theta`.
    fn logp(&self, theta: &[T]) -> Result<T, TargetError>;

    /// Gradient of the log-density at `theta`, written into `grad`.
    ///
    /// `grad` always has the same length as `theta`, so a dimension
    /// mismatch between position and gradient cannot occur.
    fn grad_logp(&self, theta: &[T], grad: &mut [T]) -> Result<(), TargetError>;

    /// Evaluates log-density and gradient together.
    fn logp_and_grad(&self, theta: &[T], grad: &mut [T]) -> Result<T, TargetError> {
        self.grad_logp(theta, grad)?;
        self.logp(theta)
    }
}

/// An isotropic Gaussian with mean zero and standard deviation `std` in
/// every coordinate, for arbitrary dimension.
#[derive(Clone, Debug)]
pub struct IsotropicGaussian<T: Float> {
    pub std: T,
}

impl<T: Float> IsotropicGaussian<T> {
    pub fn new(std: T) -> Self {
        Self { std }
    }
}

impl<T: Float> GradientTarget<T> for IsotropicGaussian<T> {
    fn logp(&self, theta: &[T]) -> Result<T, TargetError> {
        let mut sum = T::zero();
        for &x in theta {
            sum = sum + x * x;
        }
        Ok(-T::from(0.5).unwrap() * sum / (self.std * self.std))
    }

    fn grad_logp(&self, theta: &[T], grad: &mut [T]) -> Result<(), TargetError> {
        let inv_var = (self.std * self.std).recip();
        for (g, &x) in grad.iter_mut().zip(theta) {
            *g = -x * inv_var;
        }
        Ok(())
    }
}

/// A Gaussian with per-coordinate mean and standard deviation (diagonal
/// covariance), for arbitrary dimension.
#[derive(Clone, Debug)]
pub struct DiagGaussian<T: Float> {
    pub mean: Vec<T>,
    pub std: Vec<T>,
}

impl<T: Float> DiagGaussian<T> {
    pub fn new(mean: Vec<T>, std: Vec<T>) -> Self {
        assert_eq!(mean.len(), std.len(), "mean and std must match in length");
        Self { mean, std }
    }
}

impl<T: Float> GradientTarget<T> for DiagGaussian<T> {
    fn logp(&self, theta: &[T]) -> Result<T, TargetError> {
        let mut sum = T::zero();
        for ((&x, &mu), &sd) in theta.iter().zip(&self.mean).zip(&self.std) {
            let z = (x - mu) / sd;
            sum = sum + z * z;
        }
        Ok(-T::from(0.5).unwrap() * sum)
    }

    fn grad_logp(&self, theta: &[T], grad: &mut [T]) -> Result<(), TargetError> {
        for ((g, (&x, &mu)), &sd) in grad
            .iter_mut()
            .zip(theta.iter().zip(&self.mean))
            .zip(&self.std)
        {
            *g = -(x - mu) / (sd * sd);
        }
        Ok(())
    }
}

/// The 2D Rosenbrock density `exp(-(a - x)^2 - b (y - x^2)^2)`, a standard
/// curved, highly correlated stress target.
#[derive(Clone, Copy, Debug)]
pub struct Rosenbrock2D<T: Float> {
    pub a: T,
    pub b: T,
}

impl<T: Float> GradientTarget<T> for Rosenbrock2D<T> {
    fn logp(&self, theta: &[T]) -> Result<T, TargetError> {
        let (x, y) = (theta[0], theta[1]);
        let d1 = self.a - x;
        let d2 = y - x * x;
        Ok(-(d1 * d1) - self.b * d2 * d2)
    }

    fn grad_logp(&self, theta: &[T], grad: &mut [T]) -> Result<(), TargetError> {
        let (x, y) = (theta[0], theta[1]);
        let two = T::from(2.0).unwrap();
        let four = T::from(4.0).unwrap();
        let d2 = y - x * x;
        grad[0] = two * (self.a - x) + four * self.b * x * d2;
        grad[1] = -two * self.b * d2;
        Ok(())
    }
}

/**
Posterior over the slope `alpha` of a truncated power-law mass function
`p(m | alpha) ∝ m^-alpha` on `[m_min, m_max]`, under a flat prior.

The likelihood reduces to two sufficient statistics, the sample count and
the sum of log-masses, so evaluation cost is independent of the sample
size:

```text
log L(alpha) = n * log( (1 - alpha) / (m_max^(1-alpha) - m_min^(1-alpha)) )
             - alpha * sum_log_m
```

The parameter vector is one-dimensional (`theta = [alpha]`) and the
density has a removable singularity at `alpha = 1`, which the sampler
handles as a divergence if ever stepped onto exactly.
*/
#[derive(Clone, Debug)]
pub struct PowerLawMassFunction<T: Float> {
    pub n: usize,
    pub sum_log_m: T,
    pub m_min: T,
    pub m_max: T,
}

impl<T: Float> PowerLawMassFunction<T> {
    /// Builds the posterior from raw mass observations.
    pub fn from_masses(masses: &[T], m_min: T, m_max: T) -> Self {
        let sum_log_m = masses.iter().fold(T::zero(), |acc, &m| acc + m.ln());
        Self {
            n: masses.len(),
            sum_log_m,
            m_min,
            m_max,
        }
    }

    /// Draws `n` masses from the truncated power law by inverse CDF, for
    /// synthetic-data experiments.
    pub fn draw_masses<R: Rng>(n: usize, alpha: T, m_min: T, m_max: T, rng: &mut R) -> Vec<T>
    where
        rand_distr::StandardUniform: rand::distr::Distribution<T>,
    {
        let beta = T::one() - alpha;
        let lo = m_min.powf(beta);
        let hi = m_max.powf(beta);
        (0..n)
            .map(|_| {
                let u: T = rng.random();
                (lo + u * (hi - lo)).powf(beta.recip())
            })
            .collect()
    }
}

impl<T: Float> GradientTarget<T> for PowerLawMassFunction<T> {
    fn logp(&self, theta: &[T]) -> Result<T, TargetError> {
        let alpha = theta[0];
        let beta = T::one() - alpha;
        let denom = self.m_max.powf(beta) - self.m_min.powf(beta);
        let n = T::from(self.n).unwrap();
        Ok(n * (beta / denom).ln() - alpha * self.sum_log_m)
    }

    fn grad_logp(&self, theta: &[T], grad: &mut [T]) -> Result<(), TargetError> {
        let alpha = theta[0];
        let beta = T::one() - alpha;
        let (pmax, pmin) = (self.m_max.powf(beta), self.m_min.powf(beta));
        let denom = pmax - pmin;
        let n = T::from(self.n).unwrap();
        // d/d(alpha) = -d/d(beta) of [ln(beta) - ln(m_max^beta - m_min^beta)]
        let dlognorm =
            -(beta.recip() - (pmax * self.m_max.ln() - pmin * self.m_min.ln()) / denom);
        grad[0] = n * dlognorm - self.sum_log_m;
        Ok(())
    }
}
