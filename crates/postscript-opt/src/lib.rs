#![deny(warnings)]

//! Weight optimizer: improve a page allocation by repeated local search,
//! scoring candidates through an [`Evaluator`].

use postscript_core::{Allocation, HuntPlan, ValidationError};
use postscript_sim::{cumulative, ready_probability, GenreSampler};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub mod perturb;

use perturb::DirectionBias;

#[derive(Debug, Error, PartialEq)]
pub enum OptimizeError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ValidationError),
    #[error("evaluator returned a non-finite score ({0})")]
    NonFiniteScore(f64),
}

/// Scores an allocation; higher is better.
pub trait Evaluator {
    fn evaluate(&mut self, allocation: &Allocation, trials: u32) -> f64;

    /// Number of categories the evaluator expects, when it has an opinion.
    fn categories(&self) -> Option<usize> {
        None
    }
}

impl<F> Evaluator for F
where
    F: FnMut(&Allocation, u32) -> f64,
{
    fn evaluate(&mut self, allocation: &Allocation, trials: u32) -> f64 {
        self(allocation, trials)
    }
}

/// Fraction of trials in which every genre ends ready.
pub struct ReadinessEvaluator<S> {
    base: Vec<u32>,
    sequence: Vec<u32>,
    sampler: S,
}

impl<S: GenreSampler> ReadinessEvaluator<S> {
    pub fn new(base: &[u32], plan: &HuntPlan, sampler: S) -> Result<Self, ValidationError> {
        plan.validate()?;
        Ok(ReadinessEvaluator {
            base: postscript_core::clamp_notoriety(base),
            sequence: plan.sequence(),
            sampler,
        })
    }
}

impl<S: GenreSampler> Evaluator for ReadinessEvaluator<S> {
    fn evaluate(&mut self, allocation: &Allocation, trials: u32) -> f64 {
        let cum = cumulative(&allocation.probabilities());
        ready_probability(&self.base, &self.sequence, &cum, trials, &mut self.sampler)
    }

    fn categories(&self) -> Option<usize> {
        Some(self.base.len())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Uniform neighbours of the incumbent, best one kept if strictly better.
    HillClimb,
    /// Systematic and direction-biased moves with a shrinking range and a
    /// score-weighted blend of the top candidates.
    #[default]
    Adaptive,
}

impl Strategy {
    pub fn parse(name: &str) -> Option<Strategy> {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "hill_climb" | "hillclimb" => Some(Strategy::HillClimb),
            "adaptive" => Some(Strategy::Adaptive),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeParams {
    /// Perturbation range in page units.
    pub adjustment_range: f64,
    pub iterations: u32,
    pub candidates_per_iteration: u32,
    pub trials_per_candidate: u32,
    pub strategy: Strategy,
}

impl Default for OptimizeParams {
    fn default() -> Self {
        OptimizeParams {
            adjustment_range: 20.0,
            iterations: 10,
            candidates_per_iteration: 20,
            trials_per_candidate: 20_000,
            strategy: Strategy::default(),
        }
    }
}

impl OptimizeParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.adjustment_range.is_finite() || self.adjustment_range < 0.0 {
            return Err(ValidationError::invalid(
                "adjustment_range",
                "must be finite and >= 0",
            ));
        }
        if self.candidates_per_iteration == 0 {
            return Err(ValidationError::invalid("candidates_per_iteration", "must be > 0"));
        }
        if self.trials_per_candidate == 0 {
            return Err(ValidationError::invalid("trials_per_candidate", "must be > 0"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub allocation: Allocation,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizeOutcome {
    pub best: Candidate,
    pub initial_score: f64,
    pub rounds: u32,
    /// Rounds in which the incumbent was replaced.
    pub improvements: u32,
}

fn score<E: Evaluator + ?Sized>(
    evaluator: &mut E,
    allocation: &Allocation,
    trials: u32,
) -> Result<f64, OptimizeError> {
    let s = evaluator.evaluate(allocation, trials);
    if s.is_finite() {
        Ok(s)
    } else {
        Err(OptimizeError::NonFiniteScore(s))
    }
}

fn hill_climb_round<E, R>(
    best: &mut Candidate,
    params: &OptimizeParams,
    evaluator: &mut E,
    rng: &mut R,
) -> Result<bool, OptimizeError>
where
    E: Evaluator + ?Sized,
    R: Rng + ?Sized,
{
    let mut round_best: Option<Candidate> = None;
    for _ in 0..params.candidates_per_iteration {
        let allocation = perturb::neighbor(&best.allocation, params.adjustment_range, &mut *rng);
        let s = score(evaluator, &allocation, params.trials_per_candidate)?;
        if round_best.as_ref().map_or(true, |c| s > c.score) {
            round_best = Some(Candidate { allocation, score: s });
        }
    }
    match round_best {
        Some(c) if c.score > best.score => {
            *best = c;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn adaptive_round<E, R>(
    best: &mut Candidate,
    round: u32,
    bias: &mut DirectionBias,
    params: &OptimizeParams,
    evaluator: &mut E,
    rng: &mut R,
) -> Result<bool, OptimizeError>
where
    E: Evaluator + ?Sized,
    R: Rng + ?Sized,
{
    let factor = perturb::adaptive_factor(round, params.iterations);
    let range = params.adjustment_range * factor;
    let wanted = ((params.candidates_per_iteration as f64 * factor) as usize).max(3);

    let mut pool = perturb::systematic(&best.allocation, range);
    while pool.len() < wanted {
        pool.push(perturb::biased(&best.allocation, range, bias.values(), &mut *rng));
    }
    let mut results = Vec::with_capacity(pool.len() + 1);
    for allocation in pool {
        let s = score(evaluator, &allocation, params.trials_per_candidate)?;
        results.push(Candidate { allocation, score: s });
    }
    results.push(best.clone());
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(3);

    let top = results[0].clone();
    let challenger = match perturb::blend(&results) {
        Some(allocation) => {
            let s = score(evaluator, &allocation, params.trials_per_candidate)?;
            if s >= top.score {
                Candidate { allocation, score: s }
            } else {
                top
            }
        }
        None => top,
    };

    let previous = best.allocation.clone();
    let improved = challenger.score > best.score;
    if improved {
        *best = challenger;
    }
    bias.update(previous.weights(), best.allocation.weights());
    Ok(improved)
}

/// Search for an allocation with a higher score than `initial`.
///
/// The returned score is never below the initial one; ties keep the
/// incumbent.
pub fn optimize<E, R>(
    initial: &Allocation,
    params: &OptimizeParams,
    evaluator: &mut E,
    rng: &mut R,
) -> Result<OptimizeOutcome, OptimizeError>
where
    E: Evaluator + ?Sized,
    R: Rng + ?Sized,
{
    params.validate()?;
    initial.validate()?;
    if let Some(expected) = evaluator.categories() {
        postscript_core::validate_len(initial.weights(), expected)?;
    }
    info!(
        strategy = ?params.strategy,
        range = params.adjustment_range,
        iterations = params.iterations,
        candidates = params.candidates_per_iteration,
        trials = params.trials_per_candidate,
        "optimizer starting"
    );
    let initial_score = score(evaluator, initial, params.trials_per_candidate)?;
    let mut best = Candidate {
        allocation: initial.clone(),
        score: initial_score,
    };
    let mut improvements = 0;
    let mut bias = DirectionBias::new(initial.len());
    for round in 0..params.iterations {
        let improved = match params.strategy {
            Strategy::HillClimb => hill_climb_round(&mut best, params, evaluator, &mut *rng)?,
            Strategy::Adaptive => {
                adaptive_round(&mut best, round, &mut bias, params, evaluator, &mut *rng)?
            }
        };
        if improved {
            improvements += 1;
        }
        debug!(round, score = best.score, improved, "optimizer round");
    }
    info!(initial_score, score = best.score, improvements, "optimizer finished");
    Ok(OptimizeOutcome {
        best,
        initial_score,
        rounds: params.iterations,
        improvements,
    })
}

/// [`optimize`] with a `ChaCha8Rng` seeded from `seed`.
pub fn optimize_seeded<E: Evaluator + ?Sized>(
    initial: &Allocation,
    params: &OptimizeParams,
    evaluator: &mut E,
    seed: u64,
) -> Result<OptimizeOutcome, OptimizeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    optimize(initial, params, evaluator, &mut rng)
}
