/*!
The No-U-Turn Sampler core: leapfrog integrator, step-size heuristic,
recursive tree builder, dual-averaging adaptation, and the single-chain
driver tying them together.

The tree builder grows a binary tree of leapfrog trajectories by repeated
doubling, stopping when the trajectory starts to double back on itself
(the U-turn criterion), when a trajectory segment diverges numerically, or
when the configured maximum depth is reached. Only the boundary states and
a small summary per node are ever held, so memory stays constant while the
candidate set grows exponentially.

# Examples

```rust
use mini_nuts::distributions::DiagGaussian;
use mini_nuts::nuts::{NutsChain, NutsConfig};

let target = DiagGaussian::new(vec![1.0_f64, -1.0], vec![1.0, 2.0]);
let config = NutsConfig::new(200, 200, vec![0.0, 0.0]);
let mut chain = NutsChain::new(target, config).unwrap().set_seed(42);
let records = chain.run().unwrap();
println!("{}", chain.run_stats());
assert_eq!(records.len(), 200);
```
*/

use crate::distributions::GradientTarget;
use crate::error::{NutsError, Result};
use crate::stats::RunStats;
use indicatif::{ProgressBar, ProgressStyle};
use num_traits::Float;
use rand::distr::Distribution;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp1, StandardNormal, StandardUniform};
use std::collections::VecDeque;

/// One point in phase space, with the log-density and gradient at
/// `position` cached so each leapfrog step costs exactly one model
/// evaluation.
#[derive(Clone, Debug)]
pub struct PhaseState<T> {
    pub position: Vec<T>,
    pub momentum: Vec<T>,
    pub grad: Vec<T>,
    pub logp: T,
}

/// One accepted draw: position, its unnormalized log-density, and the
/// step size the iteration was run with.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleRecord<T> {
    pub position: Vec<T>,
    pub logp: T,
    pub epsilon: T,
}

/// Per-iteration diagnostics returned by [`NutsChain::step`].
#[derive(Clone, Copy, Debug)]
pub struct StepInfo<T> {
    /// Number of doublings performed.
    pub depth: usize,
    /// Mean Metropolis acceptance statistic over the iteration's base-case
    /// leapfrog steps, the quantity dual averaging drives toward `delta`.
    pub accept_prob: T,
    /// Step size the trajectory was built with.
    pub epsilon: T,
    /// At least one trajectory segment diverged numerically.
    pub diverged: bool,
    /// The doubling loop was cut off at `max_tree_depth` while the
    /// trajectory was still expanding.
    pub reached_max_depth: bool,
}

/// Configuration for a single NUTS chain.
///
/// `new` fills the standard defaults; all fields are public for direct
/// adjustment before the chain is constructed.
#[derive(Clone, Debug)]
pub struct NutsConfig<T> {
    /// Number of post-warm-up draws to return (M).
    pub n_collect: usize,
    /// Number of warm-up draws used for step-size adaptation (Madapt).
    pub n_adapt: usize,
    /// Initial position; its length fixes the dimension for the run.
    pub initial_position: Vec<T>,
    /// Target mean acceptance probability `delta` for dual averaging.
    pub target_accept: T,
    /// Maximum number of doublings per iteration.
    pub max_tree_depth: usize,
    /// A base-case step whose energy drops by more than this below the
    /// initial joint log-density is a divergence.
    pub divergence_threshold: T,
    /// Emit a per-iteration trace line to stderr.
    pub verbose: bool,
}

impl<T: Float> NutsConfig<T> {
    pub fn new(n_collect: usize, n_adapt: usize, initial_position: Vec<T>) -> Self {
        Self {
            n_collect,
            n_adapt,
            initial_position,
            target_accept: T::from(0.65).unwrap(),
            max_tree_depth: 10,
            divergence_threshold: T::from(1000.0).unwrap(),
            verbose: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.n_collect == 0 {
            return Err(NutsError::InvalidConfiguration(
                "n_collect must be positive".into(),
            ));
        }
        if self.initial_position.is_empty() {
            return Err(NutsError::InvalidConfiguration(
                "initial_position must be non-empty".into(),
            ));
        }
        if !(self.target_accept > T::zero() && self.target_accept < T::one()) {
            return Err(NutsError::InvalidConfiguration(
                "target_accept must lie in (0, 1)".into(),
            ));
        }
        if self.max_tree_depth == 0 {
            return Err(NutsError::InvalidConfiguration(
                "max_tree_depth must be at least 1".into(),
            ));
        }
        if !(self.divergence_threshold > T::zero()) {
            return Err(NutsError::InvalidConfiguration(
                "divergence_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn dot<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b)
        .fold(T::zero(), |acc, (&x, &y)| acc + x * y)
}

fn add_scaled<T: Float>(out: &mut [T], rhs: &[T], scale: T) {
    for (o, &r) in out.iter_mut().zip(rhs) {
        *o = *o + r * scale;
    }
}

/// Joint log-density `logp(position) - momentum^T momentum / 2`, the
/// negative Hamiltonian. `NaN` is coerced to `-inf` so a corrupted energy
/// reads as a zero-probability state instead of poisoning comparisons.
fn joint<T: Float>(state: &PhaseState<T>) -> T {
    let j = state.logp - T::from(0.5).unwrap() * dot(&state.momentum, &state.momentum);
    if j.is_nan() {
        T::neg_infinity()
    } else {
        j
    }
}

/// One leapfrog step of signed size `epsilon`: half momentum kick, full
/// position drift, half momentum kick. Reversible up to floating-point
/// error by re-stepping with `-epsilon`.
pub fn leapfrog<T, G>(state: &mut PhaseState<T>, epsilon: T, target: &G) -> Result<()>
where
    T: Float,
    G: GradientTarget<T>,
{
    let half = T::from(0.5).unwrap();
    add_scaled(&mut state.momentum, &state.grad, epsilon * half);
    add_scaled(&mut state.position, &state.momentum, epsilon);
    state.logp = target.logp_and_grad(&state.position, &mut state.grad)?;
    add_scaled(&mut state.momentum, &state.grad, epsilon * half);
    Ok(())
}

const MAX_EPSILON_SEARCH: usize = 100;

/// Coarse step-size calibration: doubles or halves `epsilon` until a
/// single leapfrog step's acceptance exponent crosses `log(1/2)` from the
/// side it started on. Non-finite joints read as `-inf` and drive the
/// search toward smaller steps.
pub fn find_reasonable_epsilon<T, G>(init: &PhaseState<T>, target: &G) -> Result<T>
where
    T: Float,
    G: GradientTarget<T>,
{
    let two = T::from(2.0).unwrap();
    let log_half = T::from(0.5).unwrap().ln();
    let joint0 = joint(init);

    let mut epsilon = T::one();
    let mut probe = init.clone();
    leapfrog(&mut probe, epsilon, target)?;
    let mut log_ratio = joint(&probe) - joint0;

    let a = if log_ratio > log_half {
        T::one()
    } else {
        -T::one()
    };

    let mut iters = 0;
    while a * (log_ratio - log_half) > T::zero() {
        iters += 1;
        if iters > MAX_EPSILON_SEARCH {
            break;
        }
        epsilon = epsilon * two.powf(a);
        probe = init.clone();
        leapfrog(&mut probe, epsilon, target)?;
        log_ratio = joint(&probe) - joint0;
    }
    if !log_ratio.is_finite() {
        return Err(NutsError::StepSizeSearch(iters));
    }
    Ok(epsilon)
}

/// Summary of one (sub)tree: the two outermost states, the surviving
/// candidate, the valid-state count feeding slice selection, and the
/// base-case acceptance statistics feeding dual averaging.
struct BuiltTree<T> {
    leftmost: PhaseState<T>,
    rightmost: PhaseState<T>,
    proposal: PhaseState<T>,
    n: usize,
    cont: bool,
    diverged: bool,
    alpha_sum: T,
    n_alpha: usize,
}

/// The trajectory has started curving back when the displacement between
/// the outermost states opposes the momentum at either end.
fn no_uturn<T: Float>(left: &PhaseState<T>, right: &PhaseState<T>) -> bool {
    let mut along_left = T::zero();
    let mut along_right = T::zero();
    for i in 0..left.position.len() {
        let d = right.position[i] - left.position[i];
        along_left = along_left + d * left.momentum[i];
        along_right = along_right + d * right.momentum[i];
    }
    along_left >= T::zero() && along_right >= T::zero()
}

/// Recursive doubling. Depth 0 takes a single signed leapfrog step; depth
/// `j` builds two depth `j-1` subtrees, the second grown from the first's
/// far endpoint only while the first is still continuing.
#[allow(clippy::too_many_arguments)]
fn build_tree<T, G, R>(
    start: &PhaseState<T>,
    log_u: T,
    direction: i8,
    depth: usize,
    epsilon: T,
    joint0: T,
    divergence_threshold: T,
    target: &G,
    rng: &mut R,
) -> Result<BuiltTree<T>>
where
    T: Float,
    G: GradientTarget<T>,
    R: Rng,
    StandardUniform: Distribution<T>,
{
    if depth == 0 {
        let signed_eps = if direction < 0 { -epsilon } else { epsilon };
        let mut state = start.clone();
        leapfrog(&mut state, signed_eps, target)?;

        let delta = joint(&state) - joint0;
        let diverged = !(delta > -divergence_threshold);
        let n = (!diverged && log_u <= joint(&state)) as usize;
        // clamp the exponent before exp so alpha stays within [0, 1]
        let alpha = delta.min(T::zero()).exp();

        return Ok(BuiltTree {
            leftmost: state.clone(),
            rightmost: state.clone(),
            proposal: state,
            n,
            cont: !diverged,
            diverged,
            alpha_sum: alpha,
            n_alpha: 1,
        });
    }

    let mut tree = build_tree(
        start,
        log_u,
        direction,
        depth - 1,
        epsilon,
        joint0,
        divergence_threshold,
        target,
        rng,
    )?;
    if tree.cont {
        let from = if direction < 0 {
            tree.leftmost.clone()
        } else {
            tree.rightmost.clone()
        };
        let second = build_tree(
            &from,
            log_u,
            direction,
            depth - 1,
            epsilon,
            joint0,
            divergence_threshold,
            target,
            rng,
        )?;
        if direction < 0 {
            tree.leftmost = second.leftmost;
        } else {
            tree.rightmost = second.rightmost;
        }

        let weight =
            T::from(second.n).unwrap() / T::from((tree.n + second.n).max(1)).unwrap();
        let coin: T = rng.random();
        if coin < weight {
            tree.proposal = second.proposal;
        }

        tree.n += second.n;
        tree.cont = second.cont && no_uturn(&tree.leftmost, &tree.rightmost);
        tree.diverged = tree.diverged || second.diverged;
        tree.alpha_sum = tree.alpha_sum + second.alpha_sum;
        tree.n_alpha += second.n_alpha;
    }
    Ok(tree)
}

/// A single NUTS chain with dual-averaging step-size adaptation.
///
/// Every random draw of an iteration (momentum components, slice
/// threshold, doubling directions, selection coins) comes from the one
/// `SmallRng` stream in a fixed order, so seeded runs reproduce bitwise.
#[derive(Debug)]
pub struct NutsChain<T, G> {
    target: G,
    config: NutsConfig<T>,
    position: Vec<T>,
    grad: Vec<T>,
    logp: T,
    epsilon: Option<T>,
    epsilon_bar: T,
    h_bar: T,
    mu: T,
    m: usize,
    n_divergent: usize,
    n_max_depth: usize,
    accept_sum: T,
    accept_count: usize,
    rng: SmallRng,
}

// Dual-averaging constants from Hoffman & Gelman (2014).
const ADAPT_GAMMA: f64 = 0.05;
const ADAPT_T0: f64 = 10.0;
const ADAPT_KAPPA: f64 = 0.75;

impl<T, G> NutsChain<T, G>
where
    T: Float,
    G: GradientTarget<T>,
    StandardNormal: Distribution<T>,
    StandardUniform: Distribution<T>,
    Exp1: Distribution<T>,
{
    /// Validates the configuration and probes the target once at the
    /// initial position. Fails before any iteration executes if the
    /// configuration is inconsistent or the initial log-density or
    /// gradient is non-finite.
    pub fn new(target: G, config: NutsConfig<T>) -> Result<Self> {
        config.validate()?;

        let dim = config.initial_position.len();
        let mut grad = vec![T::zero(); dim];
        let logp = target.logp_and_grad(&config.initial_position, &mut grad)?;
        if !logp.is_finite() || grad.iter().any(|g| !g.is_finite()) {
            return Err(NutsError::BadInitialPosition);
        }

        let position = config.initial_position.clone();
        let rng = SmallRng::from_rng(&mut rand::rng());
        Ok(Self {
            target,
            config,
            position,
            grad,
            logp,
            epsilon: None,
            epsilon_bar: T::one(),
            h_bar: T::zero(),
            mu: T::zero(),
            m: 0,
            n_divergent: 0,
            n_max_depth: 0,
            accept_sum: T::zero(),
            accept_count: 0,
            rng,
        })
    }

    /// Reseeds the RNG stream for a reproducible run.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// The chain's current position.
    pub fn position(&self) -> &[T] {
        &self.position
    }

    /// Diagnostic counters accumulated so far.
    pub fn run_stats(&self) -> RunStats<T> {
        RunStats {
            n_divergent: self.n_divergent,
            n_max_depth: self.n_max_depth,
            mean_accept: if self.accept_count > 0 {
                self.accept_sum / T::from(self.accept_count).unwrap()
            } else {
                T::nan()
            },
            epsilon: self.epsilon.unwrap_or_else(T::nan),
        }
    }

    /// Runs the step-size heuristic and fixes `mu`; called lazily by the
    /// first [`step`](Self::step) so that seeding via
    /// [`set_seed`](Self::set_seed) still covers the heuristic's momentum
    /// draw.
    fn prepare(&mut self) -> Result<T> {
        let mut momentum = vec![T::zero(); self.position.len()];
        for p in momentum.iter_mut() {
            *p = self.rng.sample(StandardNormal);
        }
        let init = PhaseState {
            position: self.position.clone(),
            momentum,
            grad: self.grad.clone(),
            logp: self.logp,
        };
        let epsilon = find_reasonable_epsilon(&init, &self.target)?;
        self.epsilon = Some(epsilon);
        self.mu = (T::from(10.0).unwrap() * epsilon).ln();
        if self.config.verbose {
            eprintln!(
                "initial epsilon = {:.6e}",
                epsilon.to_f64().unwrap_or(f64::NAN)
            );
        }
        Ok(epsilon)
    }

    /// One full NUTS iteration: momentum refresh, slice draw, doubling
    /// loop, and (during warm-up) dual-averaging adaptation.
    pub fn step(&mut self) -> Result<StepInfo<T>> {
        let epsilon = match self.epsilon {
            Some(e) => e,
            None => self.prepare()?,
        };
        self.m += 1;
        let half = T::from(0.5).unwrap();

        let mut momentum = vec![T::zero(); self.position.len()];
        for p in momentum.iter_mut() {
            *p = self.rng.sample(StandardNormal);
        }
        let state0 = PhaseState {
            position: self.position.clone(),
            momentum,
            grad: self.grad.clone(),
            logp: self.logp,
        };
        let joint0 = joint(&state0);
        let exp1: T = self.rng.sample(Exp1);
        let log_u = joint0 - exp1;

        let mut leftmost = state0.clone();
        let mut rightmost = state0;
        let mut depth = 0;
        let mut n = 1usize;
        let mut cont = true;
        let mut diverged = false;
        let mut alpha_sum = T::zero();
        let mut n_alpha = 0usize;

        while cont && depth < self.config.max_tree_depth {
            let coin: T = self.rng.random();
            let direction: i8 = if coin < half { 1 } else { -1 };
            let start = if direction < 0 {
                leftmost.clone()
            } else {
                rightmost.clone()
            };
            let tree = build_tree(
                &start,
                log_u,
                direction,
                depth,
                epsilon,
                joint0,
                self.config.divergence_threshold,
                &self.target,
                &mut self.rng,
            )?;
            if direction < 0 {
                leftmost = tree.leftmost;
            } else {
                rightmost = tree.rightmost;
            }

            if tree.cont {
                let weight = T::one().min(T::from(tree.n).unwrap() / T::from(n).unwrap());
                let coin: T = self.rng.random();
                if coin < weight {
                    self.position = tree.proposal.position;
                    self.grad = tree.proposal.grad;
                    self.logp = tree.proposal.logp;
                }
            }

            n += tree.n;
            diverged = diverged || tree.diverged;
            alpha_sum = alpha_sum + tree.alpha_sum;
            n_alpha += tree.n_alpha;
            cont = tree.cont && no_uturn(&leftmost, &rightmost);
            depth += 1;
        }

        let reached_max_depth = cont;
        if reached_max_depth {
            self.n_max_depth += 1;
        }
        if diverged {
            self.n_divergent += 1;
        }
        let accept_prob = alpha_sum / T::from(n_alpha.max(1)).unwrap();

        if self.m <= self.config.n_adapt {
            self.adapt(accept_prob);
        } else {
            self.accept_sum = self.accept_sum + accept_prob;
            self.accept_count += 1;
        }

        if self.config.verbose {
            eprintln!(
                "iter {:>6}: depth={} accept={:.3} epsilon={:.4e}{}",
                self.m,
                depth,
                accept_prob.to_f64().unwrap_or(f64::NAN),
                epsilon.to_f64().unwrap_or(f64::NAN),
                if diverged { " divergent" } else { "" },
            );
        }

        Ok(StepInfo {
            depth,
            accept_prob,
            epsilon,
            diverged,
            reached_max_depth,
        })
    }

    /// Dual-averaging update of log(epsilon), run during warm-up only. On
    /// the final warm-up iteration the step size is frozen at the running
    /// average for the rest of the run.
    fn adapt(&mut self, accept_prob: T) {
        let m_t = T::from(self.m).unwrap();
        let eta = (m_t + T::from(ADAPT_T0).unwrap()).recip();
        self.h_bar = (T::one() - eta) * self.h_bar
            + eta * (self.config.target_accept - accept_prob);

        let log_eps = self.mu - m_t.sqrt() / T::from(ADAPT_GAMMA).unwrap() * self.h_bar;
        self.epsilon = Some(log_eps.exp());

        let w = m_t.powf(-T::from(ADAPT_KAPPA).unwrap());
        self.epsilon_bar = ((T::one() - w) * self.epsilon_bar.ln() + w * log_eps).exp();

        if self.m == self.config.n_adapt {
            self.epsilon = Some(self.epsilon_bar);
            if self.config.verbose {
                eprintln!(
                    "warm-up finished: epsilon frozen at {:.6e}",
                    self.epsilon_bar.to_f64().unwrap_or(f64::NAN)
                );
            }
        }
    }

    /// Runs `n_adapt` warm-up iterations followed by `n_collect` sampling
    /// iterations and returns the post-warm-up records in order.
    pub fn run(&mut self) -> Result<Vec<SampleRecord<T>>> {
        let total = self.config.n_adapt + self.config.n_collect;
        let mut records = Vec::with_capacity(self.config.n_collect);
        for _ in 0..total {
            let info = self.step()?;
            if self.m > self.config.n_adapt {
                records.push(SampleRecord {
                    position: self.position.clone(),
                    logp: self.logp,
                    epsilon: info.epsilon,
                });
            }
        }
        Ok(records)
    }

    /// Like [`run`](Self::run), with an `indicatif` progress bar showing a
    /// sliding-window acceptance estimate and the divergence count.
    pub fn run_progress(&mut self) -> Result<(Vec<SampleRecord<T>>, RunStats<T>)> {
        let total = self.config.n_adapt + self.config.n_collect;
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:8} {bar:40.white} ETA {eta:3} | {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_prefix("NUTS");

        let window_size = 100;
        let mut accept_window: VecDeque<f64> = VecDeque::with_capacity(window_size);

        let mut records = Vec::with_capacity(self.config.n_collect);
        for _ in 0..total {
            let info = self.step()?;
            if self.m > self.config.n_adapt {
                records.push(SampleRecord {
                    position: self.position.clone(),
                    logp: self.logp,
                    epsilon: info.epsilon,
                });
            }

            accept_window.push_front(info.accept_prob.to_f64().unwrap_or(f64::NAN));
            if accept_window.len() > window_size {
                accept_window.pop_back();
            }
            let window_mean =
                accept_window.iter().sum::<f64>() / accept_window.len() as f64;
            pb.set_message(format!(
                "p(accept)≈{:.2} divergent={}",
                window_mean, self.n_divergent
            ));
            pb.inc(1);
        }
        pb.finish();
        Ok((records, self.run_stats()))
    }
}
