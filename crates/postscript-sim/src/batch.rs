//! Many-trial statistics for a single chapter setup.

use crate::{cumulative, simulate_sequence, GenreSampler, SimError, TrialOutcome};
use postscript_core::{
    clamp_notoriety, genre_pairs, reshape::weights_from_counts, validate_len, HuntPlan,
    ValidationError, THRESHOLD_BREAKPOINTS,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of trials for the chapter simulator.
pub const SIMULATOR_RUNS: u32 = 30_000;

/// How many genres ended strictly above `threshold`, bucketed per run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdHistogram {
    pub threshold: u32,
    /// `counts[k]` = runs in which exactly `k` genres ended above the threshold.
    pub counts: Vec<u32>,
}

impl ThresholdHistogram {
    fn new(threshold: u32, genres: usize) -> Self {
        ThresholdHistogram {
            threshold,
            counts: vec![0; genres + 1],
        }
    }

    fn record(&mut self, values: &[u32]) {
        let above = values.iter().filter(|v| **v > self.threshold).count();
        self.counts[above] += 1;
    }

    /// Percentage of runs with exactly `k` genres above the threshold.
    pub fn percent(&self, k: usize) -> f64 {
        let runs: u32 = self.counts.iter().sum();
        if runs == 0 {
            return 0.0;
        }
        self.counts.get(k).copied().unwrap_or(0) as f64 / runs as f64 * 100.0
    }

    /// `[%of#ofGenre>80] 1: 0.10%; 2: ...` summary line.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = (1..self.counts.len())
            .map(|k| format!("{}: {:.2}%", k, self.percent(k)))
            .collect();
        format!("[%of#ofGenre>{}] {}", self.threshold, parts.join("; "))
    }
}

/// Result of [`run_batch`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One illustrative run, played before the batch.
    pub sample: TrialOutcome,
    pub runs: u32,
    pub mean_notoriety: Vec<f64>,
    pub ready_runs: u32,
    pub histograms: Vec<ThresholdHistogram>,
}

impl BatchReport {
    pub fn ready_ratio(&self) -> f64 {
        self.ready_runs as f64 / self.runs.max(1) as f64
    }

    /// Multi-line text summary of the batch.
    pub fn summary(&self) -> String {
        let means: Vec<String> = self.mean_notoriety.iter().map(|m| format!("{m:.2}")).collect();
        let mut lines = vec![
            format!("{}-run average: {}", self.runs, genre_pairs(&means)),
            format!(
                "All Genre >80 Percentage: {:.2}% ({}/{})",
                self.ready_ratio() * 100.0,
                self.ready_runs,
                self.runs
            ),
        ];
        lines.extend(self.histograms.iter().map(ThresholdHistogram::summary));
        lines.join("\n")
    }
}

/// Play one sample run and then `runs` independent trials of `plan` with the
/// given page counts, starting from `base` notoriety each time. `base` is
/// capped at [`postscript_core::NOTORIETY_CAP`] first.
pub fn run_batch<S: GenreSampler + ?Sized>(
    base: &[u32],
    plan: &HuntPlan,
    pages: &[u32],
    runs: u32,
    sampler: &mut S,
) -> Result<BatchReport, SimError> {
    plan.validate()?;
    validate_len(pages, base.len())?;
    if runs == 0 {
        return Err(ValidationError::invalid("runs", "must be > 0").into());
    }
    let base = clamp_notoriety(base);
    let sequence = plan.sequence();
    let cum = cumulative(&weights_from_counts(pages));

    let sample = simulate_sequence(&base, &sequence, &cum, &mut *sampler);

    let mut totals = vec![0u64; base.len()];
    let mut ready_runs = 0u32;
    let mut histograms: Vec<ThresholdHistogram> = THRESHOLD_BREAKPOINTS
        .iter()
        .map(|t| ThresholdHistogram::new(*t, base.len()))
        .collect();
    for _ in 0..runs {
        let out = simulate_sequence(&base, &sequence, &cum, &mut *sampler);
        if out.ready {
            ready_runs += 1;
        }
        for (total, v) in totals.iter_mut().zip(&out.notoriety) {
            *total += *v as u64;
        }
        for h in &mut histograms {
            h.record(&out.notoriety);
        }
    }
    let mean_notoriety = totals.iter().map(|t| *t as f64 / runs as f64).collect();
    debug!(runs, ready_runs, "batch finished");
    Ok(BatchReport {
        sample,
        runs,
        mean_notoriety,
        ready_runs,
        histograms,
    })
}
