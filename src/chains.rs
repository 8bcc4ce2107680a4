use anyhow::{bail, Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::{
    iter::{IntoParallelIterator, ParallelIterator},
    ThreadPoolBuilder,
};

use crate::{
    model::CpuLogpFunc,
    nuts::NutsOptions,
    sampler::{new_sampler, DiagNuts, Sample},
};

/// Settings for running several independent chains.
#[derive(Debug, Clone, Copy)]
pub struct ChainSettings {
    pub num_chains: usize,
    pub num_draws: u64,
    /// Chain `i` uses the random stream `i` of a generator seeded with `seed`.
    pub seed: u64,
    /// Size of the thread pool. Zero lets rayon decide.
    pub num_threads: usize,
    pub options: NutsOptions,
}

impl Default for ChainSettings {
    fn default() -> Self {
        ChainSettings {
            num_chains: 4,
            num_draws: 1000,
            seed: 0,
            num_threads: 0,
            options: NutsOptions::default(),
        }
    }
}

/// The random number generator of chain `chain`.
pub fn chain_rng(seed: u64, chain: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(chain);
    rng
}

/// Sample a single chain, lazily.
pub fn sample_sequentially<'a, F: CpuLogpFunc + 'a>(
    logp: F,
    settings: &ChainSettings,
    start: &[f64],
    chain: u64,
) -> Result<impl Iterator<Item = Result<Sample>> + 'a> {
    let mut sampler: DiagNuts<F, ChaCha8Rng> =
        new_sampler(logp, settings.options, chain_rng(settings.seed, chain))?;
    sampler
        .set_position(start)
        .context("Could not initialize chain")?;
    Ok((0..settings.num_draws).map(move |_| sampler.transition().map_err(anyhow::Error::from)))
}

/// Sample all chains on a thread pool and return the draws of each chain.
///
/// `make_logp` creates the density for a chain, so that chains never share
/// mutable state.
pub fn sample_parallel<F, Func>(
    make_logp: Func,
    settings: &ChainSettings,
    start: &[f64],
) -> Result<Vec<Vec<Sample>>>
where
    F: CpuLogpFunc,
    Func: Fn(u64) -> F + Sync,
{
    if settings.num_chains == 0 {
        bail!("At least one chain is required");
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(settings.num_threads)
        .thread_name(|i| format!("nuts-tree-worker-{}", i))
        .build()
        .context("Could not start thread pool")?;

    pool.install(|| {
        (0..settings.num_chains as u64)
            .into_par_iter()
            .map(|chain| {
                sample_sequentially(make_logp(chain), settings, start, chain)?
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("Sampling failed in chain {}", chain))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_logps::NormalLogp;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    #[test]
    fn chain_streams_differ() {
        let mut a = chain_rng(1, 0);
        let mut b = chain_rng(1, 1);
        let mut c = chain_rng(1, 0);
        let x: u64 = a.random();
        assert_ne!(x, b.random::<u64>());
        assert_eq!(x, c.random::<u64>());
    }

    #[test]
    fn sequential_chain() -> Result<()> {
        let logp = NormalLogp { dim: 4, mu: 0.1 };
        let settings = ChainSettings {
            num_draws: 50,
            ..Default::default()
        };
        let draws =
            sample_sequentially(logp, &settings, &[0.2; 4], 1)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(draws.len(), 50);
        assert!(draws.iter().all(|draw| draw.position.len() == 4));
        Ok(())
    }

    #[test]
    fn bad_start() {
        let logp = NormalLogp { dim: 4, mu: 0.1 };
        let settings = ChainSettings::default();
        assert!(sample_sequentially(logp, &settings, &[0.2; 3], 0).is_err());
    }

    #[test]
    fn parallel_matches_sequential() -> Result<()> {
        let settings = ChainSettings {
            num_chains: 3,
            num_draws: 20,
            seed: 42,
            num_threads: 2,
            ..Default::default()
        };
        let start = [0.5; 2];
        let chains = sample_parallel(|_| NormalLogp { dim: 2, mu: 0. }, &settings, &start)?;
        assert_eq!(chains.len(), 3);

        for (chain, draws) in chains.iter().enumerate() {
            let logp = NormalLogp { dim: 2, mu: 0. };
            let expected = sample_sequentially(logp, &settings, &start, chain as u64)?
                .collect::<Result<Vec<_>>>()?;
            assert_eq!(draws.len(), expected.len());
            for (draw, expected) in draws.iter().zip(&expected) {
                assert_eq!(draw.position, expected.position);
            }
        }
        assert_ne!(chains[0][19].position, chains[1][19].position);
        Ok(())
    }
}
