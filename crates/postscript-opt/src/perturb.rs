//! Candidate generators. Every allocation returned here keeps the total of the
//! allocation it was derived from.

use postscript_core::Allocation;
use rand::{seq::index, Rng};

use crate::Candidate;

/// Add an independent `U[-range, range]` draw to every weight, clamp at zero
/// and rescale. Falls back to the incumbent when nothing positive is left.
pub fn neighbor<R: Rng + ?Sized>(incumbent: &Allocation, range: f64, rng: &mut R) -> Allocation {
    if range <= 0.0 {
        return incumbent.clone();
    }
    let weights = incumbent
        .weights()
        .iter()
        .map(|w| w + rng.gen_range(-range..=range))
        .collect();
    Allocation::rescaled(weights, incumbent.total()).unwrap_or_else(|| incumbent.clone())
}

/// One `+range` and one `-range` move for every positive category.
pub fn systematic(incumbent: &Allocation, range: f64) -> Vec<Allocation> {
    let mut out = Vec::new();
    for (idx, value) in incumbent.weights().iter().enumerate() {
        if *value <= 0.0 {
            continue;
        }
        for delta in [range, -range] {
            let mut weights = incumbent.weights().to_vec();
            weights[idx] = (value + delta).max(0.0);
            if let Some(moved) = Allocation::rescaled(weights, incumbent.total()) {
                out.push(moved);
            }
        }
    }
    if out.is_empty() {
        out.push(incumbent.clone());
    }
    out
}

/// Move a random half of the positive categories, nudged along `bias`.
pub fn biased<R: Rng + ?Sized>(
    incumbent: &Allocation,
    range: f64,
    bias: &[f64],
    rng: &mut R,
) -> Allocation {
    let weights = incumbent.weights();
    let mut positive: Vec<usize> = (0..weights.len()).filter(|idx| weights[*idx] > 0.0).collect();
    if positive.is_empty() {
        positive = (0..weights.len()).collect();
    }
    let subset = ((positive.len() + 1) / 2).max(1);
    let selected: Vec<usize> = if positive.len() > subset {
        index::sample(rng, positive.len(), subset)
            .iter()
            .map(|i| positive[i])
            .collect()
    } else {
        positive
    };
    let mut varied = weights.to_vec();
    for idx in selected {
        let nudge = bias.get(idx).copied().unwrap_or(0.0) * 0.1 * range;
        let jitter = if range > 0.0 { rng.gen_range(-range..=range) } else { 0.0 };
        varied[idx] = (weights[idx] + jitter + nudge).max(0.0);
    }
    Allocation::rescaled(varied, incumbent.total()).unwrap_or_else(|| incumbent.clone())
}

/// Score-weighted average of the given candidates. With no positive score
/// the first candidate is returned as is.
pub fn blend(candidates: &[Candidate]) -> Option<Allocation> {
    let first = candidates.first()?;
    let score_sum: f64 = candidates.iter().map(|c| c.score.max(0.0)).sum();
    if score_sum <= 0.0 {
        return Some(first.allocation.clone());
    }
    let mut blended = vec![0.0; first.allocation.len()];
    for c in candidates {
        let share = c.score.max(0.0) / score_sum;
        for (b, w) in blended.iter_mut().zip(c.allocation.weights()) {
            *b += w * share;
        }
    }
    Allocation::rescaled(blended, first.allocation.total())
        .or_else(|| Some(first.allocation.clone()))
}

/// Per-category memory of the direction accepted moves went in.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionBias(Vec<f64>);

impl DirectionBias {
    pub fn new(categories: usize) -> Self {
        DirectionBias(vec![0.0; categories])
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Blend in the sign of each change; unchanged categories decay.
    pub fn update(&mut self, previous: &[f64], next: &[f64]) {
        for (idx, bias) in self.0.iter_mut().enumerate() {
            let prev = previous.get(idx).copied().unwrap_or(0.0);
            let new = next.get(idx).copied().unwrap_or(0.0);
            let delta = new - prev;
            if delta == 0.0 {
                *bias *= 0.9;
            } else {
                *bias = 0.7 * *bias + 0.3 * delta.signum();
            }
        }
    }
}

/// Linear shrink from 1.0 on the first round to 0.6 on the last.
pub fn adaptive_factor(round: u32, iterations: u32) -> f64 {
    let span = iterations.saturating_sub(1).max(1) as f64;
    0.6 + 0.4 * (1.0 - round as f64 / span)
}
