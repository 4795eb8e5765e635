/*!
A compact No-U-Turn Sampler (NUTS) engine.

NUTS is an adaptive variant of Hamiltonian Monte Carlo that picks its
trajectory length on the fly via recursive doubling with a U-turn stopping
rule, and tunes its step size online with dual averaging. The target
distribution is supplied by the caller as a [`distributions::GradientTarget`]
(unnormalized log-density plus gradient); the sampler knows nothing about
any specific model.

# Examples

```rust
use mini_nuts::distributions::IsotropicGaussian;
use mini_nuts::nuts::{NutsChain, NutsConfig};

let target = IsotropicGaussian::new(1.0);
let config = NutsConfig::new(100, 100, vec![0.5_f64, -0.5]);
let mut chain = NutsChain::new(target, config).unwrap().set_seed(42);
let records = chain.run().unwrap();
assert_eq!(records.len(), 100);
println!("last draw: {:?}", records.last().unwrap().position);
```
*/

pub mod distributions;
pub mod error;
pub mod nuts;
pub mod stats;
