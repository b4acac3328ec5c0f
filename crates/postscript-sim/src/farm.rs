//! "Just farming mallets": short-only runs repeated until every genre passes 80.

use crate::{apply_hunt_step, cumulative, RngSampler, SimError};
use postscript_core::{reshape::weights_from_counts, ValidationError, GENRE_COUNT, READY_THRESHOLD};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Chapters written per farming run.
pub const CHAPTERS_PER_RUN: usize = 6;
/// Possible hunt counts of the first chapter; later chapters need 10.
pub const FIRST_CHAPTER_HUNTS: [u32; 3] = [10, 20, 30];
/// Pages a chapter adds per ten hunts.
pub const PAGES_PER_TEN_HUNTS: u32 = 250;
/// Safety budget for a single cycle.
pub const MAX_RUNS_PER_CYCLE: u32 = 100_000;

/// Inputs of the farming simulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmParams {
    pub cycles: u32,
    /// Mallets the player expects to earn per run.
    pub mallets_per_run: f64,
    /// 50-point cheese hunts per run.
    pub mid: u32,
    /// 125-point cheese hunts per run.
    pub high: u32,
}

impl Default for FarmParams {
    fn default() -> Self {
        FarmParams {
            cycles: 10_000,
            mallets_per_run: 5.0,
            mid: 8,
            high: 2,
        }
    }
}

impl FarmParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cycles == 0 {
            return Err(ValidationError::invalid("cycles", "must be > 0"));
        }
        if !self.mallets_per_run.is_finite() || self.mallets_per_run < 0.0 {
            return Err(ValidationError::invalid("mallets_per_run", "must be finite and >= 0"));
        }
        if self.mid == 0 && self.high == 0 {
            return Err(ValidationError::invalid(
                "cheese",
                "provide at least one cheese so notoriety can advance",
            ));
        }
        Ok(())
    }

    /// Cheese played each run: all 50s first, then the 125s.
    pub fn sequence(&self) -> Vec<u32> {
        let mut seq = vec![50; self.mid as usize];
        seq.extend(std::iter::repeat(125).take(self.high as usize));
        seq
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FarmReport {
    pub cycles: u32,
    pub avg_runs_per_cycle: f64,
    pub avg_hunts_per_cycle: f64,
    pub mallets_per_cycle: f64,
    pub last_cycle_runs: u32,
    pub last_cycle_hunts: u64,
}

impl FarmReport {
    pub fn summary(&self) -> String {
        [
            format!(
                "Average runs per cycle: {:.2} (last cycle took {} runs)",
                self.avg_runs_per_cycle, self.last_cycle_runs
            ),
            format!(
                "Average hunts per cycle: {:.2} (last cycle spent {} hunts)",
                self.avg_hunts_per_cycle, self.last_cycle_hunts
            ),
            format!("Estimated mallets gained per cycle: {:.2}", self.mallets_per_cycle),
        ]
        .join("\n")
    }
}

/// One farming run: write six chapters, then play the cheese on the resulting
/// page weights. Returns the hunts spent.
fn farm_run<R: Rng>(notoriety: &mut [u32], sequence: &[u32], sampler: &mut RngSampler<R>) -> u64 {
    let mut pages = [0u32; GENRE_COUNT];
    let mut hunts = 0u64;
    for chapter in 0..CHAPTERS_PER_RUN {
        let rng = sampler.rng_mut();
        let needed = if chapter == 0 {
            FIRST_CHAPTER_HUNTS[rng.gen_range(0..FIRST_CHAPTER_HUNTS.len())]
        } else {
            FIRST_CHAPTER_HUNTS[0]
        };
        hunts += needed as u64;
        let genre = rng.gen_range(0..GENRE_COUNT);
        pages[genre] += needed / 10 * PAGES_PER_TEN_HUNTS;
    }
    hunts += sequence.len() as u64;
    let cum = cumulative(&weights_from_counts(&pages));
    for cheese in sequence {
        apply_hunt_step(notoriety, *cheese, &cum, sampler);
    }
    hunts
}

/// Average runs and hunts needed to push every genre strictly above 80.
pub fn simulate_farm<R: Rng>(
    params: &FarmParams,
    sampler: &mut RngSampler<R>,
) -> Result<FarmReport, SimError> {
    farm_cycles(params, MAX_RUNS_PER_CYCLE, sampler)
}

/// Fails with [`SimError::CycleStalled`] once a cycle needs more than
/// `max_runs` runs.
fn farm_cycles<R: Rng>(
    params: &FarmParams,
    max_runs: u32,
    sampler: &mut RngSampler<R>,
) -> Result<FarmReport, SimError> {
    params.validate()?;
    let sequence = params.sequence();
    let mut total_runs = 0u64;
    let mut total_hunts = 0u64;
    let mut last_cycle_runs = 0;
    let mut last_cycle_hunts = 0;
    for _ in 0..params.cycles {
        let mut notoriety = [0u32; GENRE_COUNT];
        let mut runs = 0u32;
        let mut hunts = 0u64;
        loop {
            if runs >= max_runs {
                return Err(SimError::CycleStalled(max_runs));
            }
            hunts += farm_run(&mut notoriety, &sequence, sampler);
            runs += 1;
            if notoriety.iter().all(|v| *v > READY_THRESHOLD) {
                break;
            }
        }
        total_runs += runs as u64;
        total_hunts += hunts;
        last_cycle_runs = runs;
        last_cycle_hunts = hunts;
    }
    let cycles = params.cycles as f64;
    let avg_runs = total_runs as f64 / cycles;
    debug!(cycles = params.cycles, avg_runs, "farm simulation finished");
    Ok(FarmReport {
        cycles: params.cycles,
        avg_runs_per_cycle: avg_runs,
        avg_hunts_per_cycle: total_hunts as f64 / cycles,
        mallets_per_cycle: avg_runs * params.mallets_per_run,
        last_cycle_runs,
        last_cycle_hunts,
    })
}
