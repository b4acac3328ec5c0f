//! Two chapter setups played back to back, with optional auto-extension and
//! a pruned variant that drops already-high genres from the second setup.

use crate::{apply_hunt_step, cumulative, is_ready, simulate_sequence, GenreSampler, SimError};
use postscript_core::{
    clamp_notoriety, genre_pairs, reshape::weights_from_counts, validate_len, HuntPlan,
    ValidationError, READY_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of combined runs for the dual simulator.
pub const DUAL_RUNS: u32 = 50_000;
/// Auto-extend margins for setup 1 and setup 2.
pub const SETUP_MARGINS: [u32; 2] = [10, 0];
/// Hunts added by an auto-extension.
pub const EXTRA_HUNTS: u32 = 3;
/// While any top genre is below `HIGH_CHEESE_BASE + margin`, extensions use 125 cheese.
pub const HIGH_CHEESE_BASE: u32 = 33;

/// One half of a dual run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupConfig {
    pub plan: HuntPlan,
    pub pages: Vec<u32>,
    #[serde(default)]
    pub auto_extend: bool,
    /// Added to the ready and high-cheese thresholds of the extension rule.
    pub margin: u32,
}

impl SetupConfig {
    pub fn new(plan: HuntPlan, pages: Vec<u32>, auto_extend: bool, margin: u32) -> Self {
        SetupConfig {
            plan,
            pages,
            auto_extend,
            margin,
        }
    }
}

/// How setup 2 picks its page weights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DualMode {
    /// Setup 2 uses its configured pages.
    #[default]
    Standard,
    /// Genres that finished setup 1 above [`prune_threshold`] get zero pages.
    Pruned,
}

/// Genres strictly above this after setup 1 are pruned from setup 2.
pub fn prune_threshold(second_extended: bool) -> u32 {
    if second_extended {
        93
    } else {
        90
    }
}

/// Zero the page count of every genre whose notoriety is above `threshold`.
pub fn prune_pages(pages: &[u32], notoriety: &[u32], threshold: u32) -> Vec<u32> {
    pages
        .iter()
        .zip(notoriety)
        .map(|(p, n)| if *n > threshold { 0 } else { *p })
        .collect()
}

/// Auto-extension rule derived from a setup's page counts.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ExtensionRule {
    /// Genres sharing the highest page count.
    top: Vec<usize>,
    ready_below: u32,
    high_below: u32,
}

impl ExtensionRule {
    fn from_pages(pages: &[u32], margin: u32) -> Option<Self> {
        let max_pages = pages.iter().copied().max().unwrap_or(0);
        if max_pages == 0 {
            return None;
        }
        let top = pages
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == max_pages)
            .map(|(idx, _)| idx)
            .collect();
        Some(ExtensionRule {
            top,
            ready_below: READY_THRESHOLD + margin,
            high_below: HIGH_CHEESE_BASE + margin,
        })
    }

    fn triggers(&self, values: &[u32]) -> bool {
        self.top.iter().any(|idx| values[*idx] < self.ready_below)
    }

    /// Play the extra hunts: 125 cheese until every top genre reaches the
    /// high-cheese line, then 50 for the rest.
    fn apply<S: GenreSampler + ?Sized>(&self, values: &mut [u32], cum: &[f64], sampler: &mut S) {
        let mut medium = false;
        for _ in 0..EXTRA_HUNTS {
            if !medium && !self.top.iter().any(|idx| values[*idx] < self.high_below) {
                medium = true;
            }
            let cheese = if medium { 50 } else { 125 };
            apply_hunt_step(values, cheese, cum, &mut *sampler);
        }
    }
}

/// Outcome of one setup within a dual run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub notoriety: Vec<u32>,
    pub ready: bool,
    pub extended: bool,
}

/// Both stages of one dual run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualRun {
    pub first: StageOutcome,
    pub second: StageOutcome,
    /// Pages setup 2 actually used (differs from the configuration when pruned).
    pub second_pages: Vec<u32>,
}

/// Batch statistics over many dual runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DualReport {
    pub mode: DualMode,
    pub sample: DualRun,
    pub runs: u32,
    pub mean_notoriety: Vec<f64>,
    pub ready_runs: u32,
    /// Runs in which setup 1 / setup 2 auto-extended.
    pub extensions: [u32; 2],
}

impl DualReport {
    pub fn ready_ratio(&self) -> f64 {
        self.ready_runs as f64 / self.runs.max(1) as f64
    }

    pub fn mean_extensions(&self) -> f64 {
        (self.extensions[0] + self.extensions[1]) as f64 / self.runs.max(1) as f64
    }

    pub fn extension_rate(&self, setup: usize) -> f64 {
        self.extensions[setup] as f64 / self.runs.max(1) as f64 * 100.0
    }

    pub fn summary(&self) -> String {
        let suffix = |extended: bool| if extended { " (auto-extended)" } else { "" };
        let means: Vec<String> = self.mean_notoriety.iter().map(|m| format!("{m:.2}")).collect();
        let label = match self.mode {
            DualMode::Standard => "",
            DualMode::Pruned => " (pruned)",
        };
        [
            format!(
                "First run result: {}{}",
                genre_pairs(&self.sample.first.notoriety),
                suffix(self.sample.first.extended)
            ),
            format!(
                "Second run final result: {}{} [{}]",
                genre_pairs(&self.sample.second.notoriety),
                suffix(self.sample.second.extended),
                if self.sample.second.ready { "All ready!" } else { "Not ready" }
            ),
            format!(
                "{}-run combined average{}: {} | Avg auto-extends/run: {:.2}",
                self.runs,
                label,
                genre_pairs(&means),
                self.mean_extensions()
            ),
            format!(
                "All Genre >80 Percentage: {:.2}% ({}/{})",
                self.ready_ratio() * 100.0,
                self.ready_runs,
                self.runs
            ),
            format!(
                "Auto-extend usage: Setup1 {:.2}% ({}/{}) / Setup2 {:.2}% ({}/{})",
                self.extension_rate(0),
                self.extensions[0],
                self.runs,
                self.extension_rate(1),
                self.extensions[1],
                self.runs
            ),
        ]
        .join("\n")
    }
}

/// Precomputed state for repeatedly playing two setups in sequence.
#[derive(Clone, Debug)]
pub struct DualSimulator {
    base: Vec<u32>,
    setups: [SetupConfig; 2],
    mode: DualMode,
    sequences: [Vec<u32>; 2],
    cumulative: [Vec<f64>; 2],
}

impl DualSimulator {
    /// Validates both setups against `base`, which is capped at
    /// [`postscript_core::NOTORIETY_CAP`].
    pub fn new(
        base: Vec<u32>,
        setups: [SetupConfig; 2],
        mode: DualMode,
    ) -> Result<Self, SimError> {
        let base = clamp_notoriety(&base);
        for setup in &setups {
            setup.plan.validate()?;
            validate_len(&setup.pages, base.len())?;
        }
        let sequences = [setups[0].plan.sequence(), setups[1].plan.sequence()];
        let cumulative = [
            cumulative(&weights_from_counts(&setups[0].pages)),
            cumulative(&weights_from_counts(&setups[1].pages)),
        ];
        Ok(DualSimulator {
            base,
            setups,
            mode,
            sequences,
            cumulative,
        })
    }

    fn stage<S: GenreSampler + ?Sized>(
        &self,
        idx: usize,
        start: &[u32],
        cum: &[f64],
        rule: Option<&ExtensionRule>,
        sampler: &mut S,
    ) -> StageOutcome {
        let mut notoriety =
            simulate_sequence(start, &self.sequences[idx], cum, &mut *sampler).notoriety;
        let mut extended = false;
        if let Some(rule) = rule {
            if rule.triggers(&notoriety) {
                extended = true;
                rule.apply(&mut notoriety, cum, &mut *sampler);
            }
        }
        let ready = is_ready(&notoriety);
        StageOutcome {
            notoriety,
            ready,
            extended,
        }
    }

    fn rule_for(&self, idx: usize, pages: &[u32]) -> Option<ExtensionRule> {
        let setup = &self.setups[idx];
        if !setup.auto_extend {
            return None;
        }
        ExtensionRule::from_pages(pages, setup.margin)
    }

    /// Play setup 1 from the base notoriety, then setup 2 from its result.
    pub fn run_once<S: GenreSampler + ?Sized>(&self, sampler: &mut S) -> DualRun {
        let first_rule = self.rule_for(0, &self.setups[0].pages);
        let first = self.stage(
            0,
            &self.base,
            &self.cumulative[0],
            first_rule.as_ref(),
            &mut *sampler,
        );

        let second_pages = match self.mode {
            DualMode::Standard => self.setups[1].pages.clone(),
            DualMode::Pruned => prune_pages(
                &self.setups[1].pages,
                &first.notoriety,
                prune_threshold(self.setups[1].plan.extend),
            ),
        };
        let second_rule = self.rule_for(1, &second_pages);
        let second = match self.mode {
            DualMode::Standard => self.stage(
                1,
                &first.notoriety,
                &self.cumulative[1],
                second_rule.as_ref(),
                &mut *sampler,
            ),
            DualMode::Pruned => {
                let cum = cumulative(&weights_from_counts(&second_pages));
                self.stage(1, &first.notoriety, &cum, second_rule.as_ref(), &mut *sampler)
            }
        };
        DualRun {
            first,
            second,
            second_pages,
        }
    }

    /// One sample run followed by `runs` combined runs.
    pub fn run<S: GenreSampler + ?Sized>(
        &self,
        runs: u32,
        sampler: &mut S,
    ) -> Result<DualReport, SimError> {
        if runs == 0 {
            return Err(ValidationError::invalid("runs", "must be > 0").into());
        }
        let sample = self.run_once(&mut *sampler);
        let mut totals = vec![0u64; self.base.len()];
        let mut ready_runs = 0;
        let mut extensions = [0u32; 2];
        for _ in 0..runs {
            let run = self.run_once(&mut *sampler);
            if run.first.extended {
                extensions[0] += 1;
            }
            if run.second.extended {
                extensions[1] += 1;
            }
            if run.second.ready {
                ready_runs += 1;
            }
            for (total, v) in totals.iter_mut().zip(&run.second.notoriety) {
                *total += *v as u64;
            }
        }
        debug!(runs, ready_runs, ?extensions, mode = ?self.mode, "dual batch finished");
        Ok(DualReport {
            mode: self.mode,
            sample,
            runs,
            mean_notoriety: totals.iter().map(|t| *t as f64 / runs as f64).collect(),
            ready_runs,
            extensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSampler;
    use crate::RngSampler;

    fn setup(pages: Vec<u32>, auto_extend: bool, margin: u32) -> SetupConfig {
        SetupConfig::new(HuntPlan::default(), pages, auto_extend, margin)
    }

    #[test]
    fn pruning_zeroes_high_genres() {
        assert_eq!(
            prune_pages(&[5, 5, 5, 5, 5], &[91, 90, 0, 200, 89], 90),
            vec![0, 5, 5, 0, 5]
        );
        assert_eq!(prune_threshold(false), 90);
        assert_eq!(prune_threshold(true), 93);
    }

    #[test]
    fn rule_targets_max_page_genres() {
        let rule = ExtensionRule::from_pages(&[3, 7, 7, 0, 1], 10).unwrap();
        assert_eq!(rule.top, vec![1, 2]);
        assert_eq!(rule.ready_below, 90);
        assert_eq!(rule.high_below, 43);
        assert!(rule.triggers(&[0, 95, 89, 0, 0]));
        assert!(!rule.triggers(&[0, 95, 90, 0, 0]));
        assert!(ExtensionRule::from_pages(&[0; 5], 0).is_none());
    }

    #[test]
    fn extension_switches_to_medium_cheese() {
        let rule = ExtensionRule::from_pages(&[1, 0, 0, 0, 0], 0).unwrap();
        let mut values = vec![0, 10, 10, 10, 10];
        let mut sampler = ScriptedSampler::new(vec![0]);
        rule.apply(&mut values, &[1.0; 5], &mut sampler);
        // 0 -> 125 (below 33), then 50 twice once the top genre passed 33.
        assert_eq!(values, vec![200, 7, 7, 7, 7]);

        let mut values = vec![20, 10, 10, 10, 10];
        let rule = ExtensionRule::from_pages(&[1, 0, 0, 0, 0], 0).unwrap();
        rule.apply(&mut values, &[1.0; 5], &mut ScriptedSampler::new(vec![1]));
        // Top genre never picked: it stays below 33, so all three are 125.
        assert_eq!(values, vec![17, 200, 7, 7, 7]);
    }

    #[test]
    fn second_stage_starts_from_first() {
        let sim = DualSimulator::new(
            vec![0; 5],
            [setup(vec![1; 5], false, 10), setup(vec![1; 5], false, 0)],
            DualMode::Standard,
        )
        .unwrap();
        let run = sim.run_once(&mut ScriptedSampler::new(vec![0, 1, 2, 3, 4]));
        // Genres at zero do not decay, so earlier genres lose a little more.
        assert_eq!(run.first.notoriety, vec![92, 93, 94, 95, 96]);
        assert_eq!(run.second.notoriety, vec![184, 185, 186, 187, 188]);
        assert!(run.second.ready);
        assert!(!run.first.extended);
    }

    #[test]
    fn auto_extend_fires_when_top_genre_lags() {
        let sim = DualSimulator::new(
            vec![0; 5],
            [
                setup(vec![10, 0, 0, 0, 0], true, 10),
                setup(vec![1; 5], false, 0),
            ],
            DualMode::Standard,
        )
        .unwrap();
        // Picks never hit genre 0 in the first chapter hunts.
        let mut sampler = ScriptedSampler::new(vec![1]);
        let run = sim.run_once(&mut sampler);
        assert!(run.first.extended);
        assert_eq!(run.first.notoriety[1], 200);
    }

    #[test]
    fn pruned_mode_drops_ready_genres() {
        let sim = DualSimulator::new(
            vec![200, 200, 0, 0, 0],
            [setup(vec![0, 0, 1, 1, 1], false, 10), setup(vec![5; 5], true, 0)],
            DualMode::Pruned,
        )
        .unwrap();
        // Genres 0 and 1 only decay during setup 1, so they stay above 90.
        let run = sim.run_once(&mut RngSampler::seeded(5));
        assert_eq!(run.second_pages[0], 0);
        assert_eq!(run.second_pages[1], 0);
        assert!(run.first.notoriety[0] > 90);
    }

    #[test]
    fn rejects_invalid_setups() {
        let mut bad = setup(vec![1; 5], false, 0);
        bad.plan.extend = true;
        assert!(DualSimulator::new(
            vec![0; 5],
            [setup(vec![1; 5], false, 10), bad],
            DualMode::Standard
        )
        .is_err());
        assert!(DualSimulator::new(
            vec![0; 5],
            [setup(vec![1; 4], false, 10), setup(vec![1; 5], false, 0)],
            DualMode::Standard
        )
        .is_err());
    }

    #[test]
    fn report_counts_extensions() {
        let sim = DualSimulator::new(
            vec![0; 5],
            [
                setup(vec![10, 0, 0, 0, 0], true, 10),
                setup(vec![0, 10, 0, 0, 0], true, 0),
            ],
            DualMode::Standard,
        )
        .unwrap();
        let report = sim.run(200, &mut RngSampler::seeded(11)).unwrap();
        assert_eq!(report.runs, 200);
        assert!(report.extensions[0] <= 200 && report.extensions[1] <= 200);
        assert!(report.mean_extensions() <= 2.0);
        assert!(report.summary().contains("Auto-extend usage: Setup1"));
        assert!(sim.run(0, &mut RngSampler::seeded(11)).is_err());
    }

    #[test]
    fn base_above_cap_is_clamped() {
        let setups = [setup(vec![1; 5], true, 10), setup(vec![1; 5], true, 0)];
        for mode in [DualMode::Standard, DualMode::Pruned] {
            let sim = DualSimulator::new(vec![300; 5], setups.clone(), mode).unwrap();
            let report = sim.run(50, &mut RngSampler::seeded(1)).unwrap();
            assert!(report.mean_notoriety.iter().all(|m| *m <= 200.0));
            assert!(report.sample.first.notoriety.iter().all(|v| *v <= 200));
        }
        let sim = DualSimulator::new(vec![u32::MAX; 5], setups, DualMode::Standard).unwrap();
        let run = sim.run_once(&mut RngSampler::seeded(2));
        assert!(run.second.notoriety.iter().all(|v| *v <= 200));
    }
}
