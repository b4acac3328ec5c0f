#![deny(warnings)]

//! Monte Carlo trial simulation for Postscript hunts.
//!
//! A trial plays a cheese sequence against a starting notoriety vector: each
//! hunt picks a genre from the page-weight distribution, that genre gains the
//! cheese value (capped), and every other genre above 1 decays by one point.
//!
//! Randomness only enters through [`GenreSampler`], so callers can seed a
//! [`RngSampler`] for reproducible runs or plug a scripted sampler in tests.

use postscript_core::{ValidationError, NOTORIETY_CAP, READY_THRESHOLD};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod batch;
pub mod dual;
pub mod farm;
pub mod reroll;

pub use batch::{run_batch, BatchReport, ThresholdHistogram};

/// Errors produced by the simulators.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// An input violates its constraint.
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ValidationError),
    /// A farming cycle ran out of its run budget before every genre passed.
    #[error("farming cycle did not finish within {0} runs")]
    CycleStalled(u32),
}

/// Picks the genre a hunt lands on.
pub trait GenreSampler {
    /// Return an index into `cumulative`, a non-decreasing distribution whose
    /// last entry is 1.0.
    fn pick(&mut self, cumulative: &[f64]) -> usize;
}

/// [`GenreSampler`] backed by any [`Rng`].
#[derive(Clone, Debug)]
pub struct RngSampler<R> {
    rng: R,
}

impl RngSampler<ChaCha8Rng> {
    /// Deterministic sampler for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        RngSampler::new(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Sampler seeded from OS entropy.
    pub fn from_entropy() -> Self {
        RngSampler::new(ChaCha8Rng::from_entropy())
    }
}

impl<R: Rng> RngSampler<R> {
    pub fn new(rng: R) -> Self {
        RngSampler { rng }
    }

    /// Underlying generator, for draws that are not genre picks.
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

impl<R: Rng> GenreSampler for RngSampler<R> {
    fn pick(&mut self, cumulative: &[f64]) -> usize {
        let roll: f64 = self.rng.gen();
        select_index(cumulative, roll)
    }
}

/// First index whose cumulative threshold is `>= roll`; the last index if none.
pub fn select_index(cumulative: &[f64], roll: f64) -> usize {
    cumulative
        .iter()
        .position(|threshold| roll <= *threshold)
        .unwrap_or_else(|| cumulative.len().saturating_sub(1))
}

/// Running sum of `probabilities`, with the final entry forced to 1.0.
pub fn cumulative(probabilities: &[f64]) -> Vec<f64> {
    let mut running = 0.0;
    let mut out: Vec<f64> = probabilities
        .iter()
        .map(|p| {
            running += p;
            running
        })
        .collect();
    if let Some(last) = out.last_mut() {
        *last = 1.0;
    }
    out
}

/// Final state of one simulated sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub notoriety: Vec<u32>,
    pub ready: bool,
}

/// Whether every genre reached [`READY_THRESHOLD`].
pub fn is_ready(values: &[u32]) -> bool {
    values.iter().all(|v| *v >= READY_THRESHOLD)
}

/// Play one hunt: the picked genre gains `cheese`, the others decay by one.
pub fn apply_hunt_step<S: GenreSampler + ?Sized>(
    values: &mut [u32],
    cheese: u32,
    cumulative: &[f64],
    sampler: &mut S,
) -> usize {
    let idx = sampler.pick(cumulative).min(values.len().saturating_sub(1));
    for (other, value) in values.iter_mut().enumerate() {
        if other == idx {
            *value = value.saturating_add(cheese).min(NOTORIETY_CAP);
        } else if *value > 1 {
            *value -= 1;
        }
    }
    idx
}

/// Play a whole cheese sequence from `base`.
pub fn simulate_sequence<S: GenreSampler + ?Sized>(
    base: &[u32],
    sequence: &[u32],
    cumulative: &[f64],
    sampler: &mut S,
) -> TrialOutcome {
    let mut values = base.to_vec();
    for cheese in sequence {
        apply_hunt_step(&mut values, *cheese, cumulative, &mut *sampler);
    }
    let ready = is_ready(&values);
    TrialOutcome {
        notoriety: values,
        ready,
    }
}

/// Fraction of `trials` sequences that end with every genre ready.
///
/// Returns 0.0 for zero trials; callers that need a score validate first.
pub fn ready_probability<S: GenreSampler + ?Sized>(
    base: &[u32],
    sequence: &[u32],
    cumulative: &[f64],
    trials: u32,
    sampler: &mut S,
) -> f64 {
    if trials == 0 {
        return 0.0;
    }
    let ready = (0..trials)
        .filter(|_| simulate_sequence(base, sequence, cumulative, &mut *sampler).ready)
        .count();
    ready as f64 / trials as f64
}

#[cfg(test)]
pub(crate) mod testing {
    use super::GenreSampler;

    /// Replays a fixed list of picks, cycling when exhausted.
    pub struct ScriptedSampler {
        picks: Vec<usize>,
        pos: usize,
    }

    impl ScriptedSampler {
        pub fn new(picks: Vec<usize>) -> Self {
            ScriptedSampler { picks, pos: 0 }
        }
    }

    impl GenreSampler for ScriptedSampler {
        fn pick(&mut self, _cumulative: &[f64]) -> usize {
            let idx = self.picks[self.pos % self.picks.len()];
            self.pos += 1;
            idx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedSampler;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cumulative_ends_at_one() {
        let c = cumulative(&[0.1, 0.2, 0.3, 0.2, 0.1]);
        assert_eq!(c.len(), 5);
        assert!((c[1] - 0.3).abs() < 1e-12);
        assert_eq!(c[4], 1.0);
        assert!(cumulative(&[]).is_empty());
    }

    #[test]
    fn select_uses_inclusive_thresholds() {
        let c = [0.25, 0.5, 0.75, 1.0];
        assert_eq!(select_index(&c, 0.0), 0);
        assert_eq!(select_index(&c, 0.25), 0);
        assert_eq!(select_index(&c, 0.2501), 1);
        assert_eq!(select_index(&c, 0.99), 3);
        assert_eq!(select_index(&[0.2, 0.4], 0.9), 1);
    }

    #[test]
    fn hunt_step_caps_and_decays() {
        let mut values = vec![190, 1, 0, 2, 80];
        let mut sampler = ScriptedSampler::new(vec![0]);
        let idx = apply_hunt_step(&mut values, 50, &[1.0; 5], &mut sampler);
        assert_eq!(idx, 0);
        assert_eq!(values, vec![200, 1, 0, 1, 79]);

        let mut values = vec![u32::MAX, 0, 0, 0, 0];
        apply_hunt_step(&mut values, 125, &[1.0; 5], &mut sampler);
        assert_eq!(values[0], NOTORIETY_CAP);
    }

    #[test]
    fn sequence_ready_check() {
        let mut sampler = ScriptedSampler::new(vec![0, 1, 2, 3, 4]);
        let out = simulate_sequence(&[40; 5], &[50; 5], &cumulative(&[0.2; 5]), &mut sampler);
        // Each genre gets one +50 and four decays.
        assert_eq!(out.notoriety, vec![86; 5]);
        assert!(out.ready);
    }

    #[test]
    fn seeded_probability_is_reproducible() {
        let cum = cumulative(&[0.2; 5]);
        let seq = vec![50; 10];
        let a = ready_probability(&[60; 5], &seq, &cum, 500, &mut RngSampler::seeded(7));
        let b = ready_probability(&[60; 5], &seq, &cum, 500, &mut RngSampler::seeded(7));
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));
        assert_eq!(ready_probability(&[60; 5], &seq, &cum, 0, &mut RngSampler::seeded(7)), 0.0);
    }

    #[test]
    fn saturated_start_is_always_ready() {
        let cum = cumulative(&[0.2; 5]);
        let p = ready_probability(&[200; 5], &[125; 13], &cum, 200, &mut RngSampler::seeded(1));
        assert_eq!(p, 1.0);
    }

    #[test]
    fn zero_weight_genre_is_never_picked() {
        let cum = cumulative(&[0.0, 0.5, 0.5, 0.0, 0.0]);
        let mut sampler = RngSampler::seeded(3);
        for _ in 0..1_000 {
            let idx = sampler.pick(&cum);
            assert!(idx == 1 || idx == 2, "picked {idx}");
        }
    }

    proptest! {
        #[test]
        fn notoriety_stays_in_bounds(base in proptest::collection::vec(0u32..=200, 5),
                                     seed in any::<u64>()) {
            let cum = cumulative(&[0.3, 0.1, 0.2, 0.2, 0.2]);
            let mut sampler = RngSampler::seeded(seed);
            let out = simulate_sequence(&base, &[125, 125, 50, 50, 25], &cum, &mut sampler);
            prop_assert!(out.notoriety.iter().all(|v| *v <= NOTORIETY_CAP));
            for (start, end) in base.iter().zip(&out.notoriety) {
                // Decay never pushes a genre below 1 unless it started at 0.
                prop_assert!(*end >= (*start).min(1));
            }
        }
    }
}
