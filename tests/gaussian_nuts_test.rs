//! End-to-end NUTS runs on Gaussian targets: stationarity of the chain,
//! dual-averaging convergence, dimension invariance, and reproducibility.

use mini_nuts::distributions::{DiagGaussian, IsotropicGaussian};
use mini_nuts::nuts::{NutsChain, NutsConfig};
use mini_nuts::stats::positions_matrix;

#[test]
fn recovers_gaussian_moments() {
    const SEED: u64 = 42;
    let mean = vec![1.0, -2.0];
    let std = vec![0.5, 3.0];
    let target = DiagGaussian::new(mean.clone(), std.clone());

    let config = NutsConfig::new(4000, 1000, vec![0.0, 0.0]);
    let mut chain = NutsChain::new(target, config).unwrap().set_seed(SEED);
    let records = chain.run().unwrap();
    let samples = positions_matrix(&records);
    assert_eq!(samples.shape(), &[4000, 2]);

    for d in 0..2 {
        let col: Vec<f64> = samples.column(d).to_vec();
        let m = col.iter().sum::<f64>() / col.len() as f64;
        let v = col.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (col.len() - 1) as f64;
        assert!(
            (m - mean[d]).abs() < 0.5,
            "dim {d}: mean {m} too far from {}",
            mean[d]
        );
        let sd = v.sqrt();
        assert!(
            (sd - std[d]).abs() < 0.25 * std[d],
            "dim {d}: std {sd} too far from {}",
            std[d]
        );
    }
}

#[test]
fn dual_averaging_hits_target_acceptance() {
    let target = IsotropicGaussian::<f64>::new(1.0);
    let mut config = NutsConfig::new(1000, 2000, vec![0.1, -0.1]);
    config.target_accept = 0.65;

    let mut chain = NutsChain::new(target, config).unwrap().set_seed(7);
    let records = chain.run().unwrap();
    let stats = chain.run_stats();

    assert!(records.iter().all(|r| r.epsilon == records[0].epsilon));
    assert!(
        (stats.mean_accept - 0.65).abs() < 0.05,
        "post-warm-up acceptance {} missed 0.65 +/- 0.05 (epsilon {})",
        stats.mean_accept,
        stats.epsilon
    );
}

#[test]
fn chain_is_dimension_invariant() {
    for dim in [1usize, 5] {
        let target = IsotropicGaussian::<f64>::new(1.0);
        let config = NutsConfig::new(500, 500, vec![0.3; dim]);
        let mut chain = NutsChain::new(target, config).unwrap().set_seed(13);
        let records = chain.run().unwrap();

        assert_eq!(records.len(), 500);
        assert!(
            records
                .iter()
                .all(|r| r.position.len() == dim
                    && r.position.iter().all(|x| x.is_finite())
                    && r.logp.is_finite()),
            "dim {dim}: non-finite draw"
        );
    }
}

#[test]
fn identical_seeds_reproduce_the_chain() {
    let run = |seed: u64| {
        let target = DiagGaussian::new(vec![0.0, 1.0], vec![2.0, 1.0]);
        let config = NutsConfig::new(200, 200, vec![0.5, 0.5]);
        NutsChain::new(target, config)
            .unwrap()
            .set_seed(seed)
            .run()
            .unwrap()
    };
    assert_eq!(run(99), run(99));
    assert_ne!(run(99), run(100));
}
