//! One function per sub-command. Each reads its stored section, applies the
//! flag overrides, runs, writes the effective parameters back and returns the
//! text to print.

use crate::args::{
    Command, DualArgs, FarmArgs, FixStartArgs, OptimizeArgs, PlanArgs, RerollArgs, RunOptions,
    ScaleArgs, SimulateArgs,
};
use anyhow::{Context, Result};
use postscript_core::{
    clamp_notoriety, genre_pairs,
    reshape::{fix_start, scale_distribution},
    Allocation, Genre, HuntPlan, GENRE_COUNT,
};
use postscript_opt::{optimize_seeded, ReadinessEvaluator};
use postscript_sim::{
    dual::{DualMode, DualSimulator, SetupConfig, SETUP_MARGINS},
    farm::simulate_farm,
    reroll::simulate_rerolls,
    run_batch, RngSampler,
};
use serde::Serialize;
use settings::{DualSettings, Settings};
use tracing::info;

/// Run `command` against `settings` and return the text to print.
pub fn execute(command: &Command, opts: RunOptions, settings: &mut Settings) -> Result<String> {
    match command {
        Command::Optimize(args) => optimize(args, opts, settings),
        Command::Simulate(args) => simulate(args, opts, settings),
        Command::Dual(args) => dual(args, opts, settings, DualMode::Standard),
        Command::DualPruned(args) => dual(args, opts, settings, DualMode::Pruned),
        Command::Farm(args) => farm(args, opts, settings),
        Command::Reroll(args) => reroll(args, opts, settings),
        Command::Scale(args) => scale(args, opts, settings),
        Command::FixStart(args) => fix_start_cmd(args, opts, settings),
        Command::Settings => show_settings(settings),
    }
}

fn render<T: Serialize>(
    opts: RunOptions,
    report: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    if opts.json {
        Ok(serde_json::to_string_pretty(report)?)
    } else {
        Ok(text(report))
    }
}

fn plan_from(args: &PlanArgs, suffix: &str, stored: HuntPlan) -> Result<HuntPlan> {
    let mut plan = stored;
    if let Some(cheese) = args.cheese {
        plan.cheese = cheese;
    }
    if let Some(extend) = args.extend {
        plan.extend = extend;
    }
    plan.validate()
        .with_context(|| format!("cheese{suffix} must add up to {} hunts", plan.target_hunts()))?;
    Ok(plan)
}

fn ready_label(ready: bool) -> &'static str {
    if ready {
        "[All ready!]"
    } else {
        "[Not ready]"
    }
}

fn optimize(args: &OptimizeArgs, opts: RunOptions, settings: &mut Settings) -> Result<String> {
    let s = &mut settings.optimizer;
    if let Some(v) = &args.notoriety {
        s.notoriety = clamp_notoriety(&v.0);
    }
    if let Some(v) = &args.pages {
        s.pages = v.0.clone();
    }
    s.plan = plan_from(&args.plan, "", s.plan)?;
    let p = &mut s.params;
    if let Some(v) = args.range {
        p.adjustment_range = v;
    }
    if let Some(v) = args.iterations {
        p.iterations = v;
    }
    if let Some(v) = args.candidates {
        p.candidates_per_iteration = v;
    }
    if let Some(v) = args.trials {
        p.trials_per_candidate = v;
    }
    if let Some(strategy) = args.strategy {
        p.strategy = strategy;
    }

    let seed = opts.seed;
    info!(seed, "optimize");
    let mut pages = s.pages.clone();
    if pages.iter().all(|c| *c == 0) {
        pages = vec![1; GENRE_COUNT];
    }
    let initial = Allocation::from_counts(&pages)?;
    let mut evaluator = ReadinessEvaluator::new(&s.notoriety, &s.plan, RngSampler::seeded(seed))?;
    let outcome = optimize_seeded(&initial, &s.params, &mut evaluator, seed.wrapping_add(1))?;
    s.pages = outcome.best.allocation.rounded();
    render(opts, &outcome, |o| {
        format!(
            "Best distribution after {} iterations: {} | \
             Ready probability ≈ {:.2}% (start {:.2}%, {} improvements)",
            o.rounds,
            genre_pairs(&o.best.allocation.rounded()),
            o.best.score * 100.0,
            o.initial_score * 100.0,
            o.improvements
        )
    })
}

fn simulate(args: &SimulateArgs, opts: RunOptions, settings: &mut Settings) -> Result<String> {
    let s = &mut settings.simulator;
    if let Some(v) = &args.notoriety {
        s.notoriety = clamp_notoriety(&v.0);
    }
    if let Some(v) = &args.pages {
        s.pages = v.0.clone();
    }
    if let Some(v) = args.runs {
        s.runs = v;
    }
    s.plan = plan_from(&args.plan, "", s.plan)?;
    let seed = opts.seed;
    info!(seed, runs = s.runs, "simulate");
    let mut sampler = RngSampler::seeded(seed);
    let report = run_batch(&s.notoriety, &s.plan, &s.pages, s.runs, &mut sampler)?;
    render(opts, &report, |r| {
        format!(
            "Single run: {} {}\n{}",
            genre_pairs(&r.sample.notoriety),
            ready_label(r.sample.ready),
            r.summary()
        )
    })
}

fn apply_dual_flags(args: &DualArgs, s: &mut DualSettings) -> Result<()> {
    if let Some(v) = &args.notoriety {
        s.notoriety = clamp_notoriety(&v.0);
    }
    if let Some(v) = args.runs {
        s.runs = v;
    }
    for (idx, setup) in s.setups.iter_mut().enumerate() {
        let flags = args.setup(idx);
        if let Some(v) = flags.pages {
            setup.pages = v.0;
        }
        if let Some(v) = flags.auto_extend {
            setup.auto_extend = v;
        }
        setup.plan = plan_from(&flags.plan, &(idx + 1).to_string(), setup.plan)?;
    }
    Ok(())
}

fn dual(
    args: &DualArgs,
    opts: RunOptions,
    settings: &mut Settings,
    mode: DualMode,
) -> Result<String> {
    let s = match mode {
        DualMode::Standard => &mut settings.dual,
        DualMode::Pruned => &mut settings.dual_pruned,
    };
    apply_dual_flags(args, s)?;
    let setups = [0, 1].map(|idx| {
        let setup = &s.setups[idx];
        SetupConfig::new(setup.plan, setup.pages.clone(), setup.auto_extend, SETUP_MARGINS[idx])
    });
    let seed = opts.seed;
    info!(seed, runs = s.runs, ?mode, "dual");
    let simulator = DualSimulator::new(s.notoriety.clone(), setups, mode)?;
    let report = simulator.run(s.runs, &mut RngSampler::seeded(seed))?;
    render(opts, &report, |r| r.summary())
}

fn farm(args: &FarmArgs, opts: RunOptions, settings: &mut Settings) -> Result<String> {
    let p = &mut settings.farm;
    if let Some(v) = args.cycles {
        p.cycles = v;
    }
    if let Some(v) = args.mallets {
        p.mallets_per_run = v;
    }
    if let Some(v) = args.mid {
        p.mid = v;
    }
    if let Some(v) = args.high {
        p.high = v;
    }
    let seed = opts.seed;
    info!(seed, cycles = p.cycles, "farm");
    let report = simulate_farm(p, &mut RngSampler::seeded(seed))?;
    render(opts, &report, |r| r.summary())
}

fn reroll(args: &RerollArgs, opts: RunOptions, settings: &mut Settings) -> Result<String> {
    let s = &mut settings.reroll;
    if let Some(v) = args.genres {
        s.genres = v;
    }
    if let Some(v) = args.iterations {
        s.iterations = v;
    }
    let seed = opts.seed;
    info!(seed, genres = s.genres, "reroll");
    let mut sampler = RngSampler::seeded(seed);
    let report = simulate_rerolls(s.genres, s.iterations, sampler.rng_mut())?;
    render(opts, &report, |r| r.summary())
}

fn distribution_line(label: &str, pages: &[f64]) -> String {
    let total: f64 = pages.iter().sum();
    let parts: Vec<String> = Genre::ALL
        .iter()
        .zip(pages)
        .map(|(g, p)| {
            let pct = if total > 0.0 { p / total * 100.0 } else { 0.0 };
            format!("{}: {} ({pct:.1}%)", g.name(), p.round() as u64)
        })
        .collect();
    format!("{label} ({} pages): {}", total.round() as u64, parts.join("; "))
}

fn as_f64(counts: &[u32]) -> Vec<f64> {
    counts.iter().map(|c| *c as f64).collect()
}

fn scale(args: &ScaleArgs, opts: RunOptions, settings: &mut Settings) -> Result<String> {
    let s = &mut settings.scaler;
    if let Some(v) = &args.pages {
        s.pages = v.0.clone();
    }
    if let Some(v) = args.percent {
        s.percent = v;
    }
    let scaled = scale_distribution(&s.pages, s.percent)?;
    #[derive(Serialize)]
    struct Scaled<'a> {
        original: &'a [u32],
        percent: f64,
        scaled: &'a [f64],
    }
    let report = Scaled {
        original: &s.pages,
        percent: s.percent,
        scaled: &scaled,
    };
    render(opts, &report, |r| {
        format!(
            "{}\n{}",
            distribution_line("Original distribution", &as_f64(r.original)),
            distribution_line(&format!("Scaled to {}%", r.percent), r.scaled)
        )
    })
}

fn fix_start_cmd(args: &FixStartArgs, opts: RunOptions, settings: &mut Settings) -> Result<String> {
    let s = &mut settings.fixer;
    if let Some(v) = &args.pages {
        s.pages = v.0.clone();
    }
    if let Some(genre) = args.genre {
        s.genre = genre;
    }
    if let Some(length) = args.length {
        s.length = length;
    }
    if let Some(v) = args.share {
        s.share_percent = v;
    }
    let fix = fix_start(&s.pages, s.genre, s.length, s.share_percent)?;
    let label = format!("Adjusted preview ({} +{} pages)", s.genre.name(), s.length.page_boost());
    render(opts, &fix, |f| {
        format!(
            "{}\n{}",
            distribution_line("Original distribution", &as_f64(&s.pages)),
            distribution_line(&label, &f.pages)
        )
    })
}

fn show_settings(settings: &Settings) -> Result<String> {
    Ok(serde_json::to_string_pretty(settings)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Cli;
    use clap::Parser;

    fn run(argv: &[&str], settings: &mut Settings) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("postscript").chain(argv.iter().copied()))?;
        execute(&cli.command, cli.run_options(), settings)
    }

    fn means(json: &str) -> Vec<f64> {
        let report: serde_json::Value = serde_json::from_str(json).unwrap();
        report["mean_notoriety"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn optimize_stores_best_pages() {
        let mut settings = Settings::default();
        let out = run(
            &[
                "optimize",
                "--notoriety",
                "60,60,60,60,60",
                "--iterations",
                "2",
                "--candidates",
                "3",
                "--trials",
                "50",
                "--seed",
                "1",
            ],
            &mut settings,
        )
        .unwrap();
        assert!(out.starts_with("Best distribution after 2 iterations"));
        assert!(out.contains(" | Ready probability"));
        assert_eq!(settings.optimizer.notoriety, vec![60; 5]);
        assert_eq!(settings.optimizer.params.iterations, 2);
        let total: u32 = settings.optimizer.pages.iter().sum();
        assert!((2_497..=2_503).contains(&total));
    }

    #[test]
    fn simulate_is_seeded() {
        let argv = ["simulate", "--pages", "1,1,1,1,1", "--runs", "200", "--seed", "3", "--json"];
        let a = run(&argv, &mut Settings::default()).unwrap();
        let b = run(&argv, &mut Settings::default()).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("\"ready_runs\""));
    }

    #[test]
    fn stored_notoriety_above_cap_is_clamped() {
        let mut settings = Settings::default();
        settings.simulator.notoriety = vec![300; 5];
        let argv = ["simulate", "--runs", "50", "--seed", "1", "--json"];
        let out = run(&argv, &mut settings).unwrap();
        assert!(means(&out).iter().all(|m| *m <= 200.0));

        settings.dual.notoriety = vec![u32::MAX; 5];
        let out = run(&["dual", "--runs", "20", "--seed", "1", "--json"], &mut settings).unwrap();
        assert!(means(&out).iter().all(|m| *m <= 200.0));
    }

    #[test]
    fn bad_cheese_is_rejected() {
        let mut settings = Settings::default();
        let err = run(&["simulate", "--cheese", "1,1,1"], &mut settings).unwrap_err();
        assert!(format!("{err:#}").contains("10 hunts"));
        let err = run(&["dual", "--cheese2", "1,1,1"], &mut settings).unwrap_err();
        assert!(format!("{err:#}").contains("cheese2 must add up to 10 hunts"));
    }

    #[test]
    fn dual_pruned_uses_its_own_section() {
        let mut settings = Settings::default();
        run(
            &[
                "dual-pruned",
                "--runs",
                "20",
                "--auto-extend2",
                "true",
                "--pages1",
                "1,1,1,1,1",
                "--seed",
                "2",
            ],
            &mut settings,
        )
        .unwrap();
        assert!(settings.dual_pruned.setups[1].auto_extend);
        assert_eq!(settings.dual_pruned.runs, 20);
        assert_eq!(settings.dual, DualSettings::default());
    }

    #[test]
    fn scale_and_fix_start() {
        let mut settings = Settings::default();
        let argv = ["scale", "--pages", "100,300,600,0,0", "--percent", "50"];
        let out = run(&argv, &mut settings).unwrap();
        assert!(out.contains("Scaled to 50% (500 pages)"));
        let out = run(
            &["fix-start", "--pages", "500,500,500,500,0", "--genre", "suspense", "--length", "30"],
            &mut settings,
        )
        .unwrap();
        assert!(out.contains("Suspense: "));
        assert_eq!(settings.fixer.genre, Genre::Suspense);
        assert!(run(&["fix-start", "--length", "15"], &mut settings).is_err());
    }

    #[test]
    fn farm_and_reroll_validate() {
        let mut settings = Settings::default();
        assert!(run(&["farm", "--mid", "0", "--high", "0"], &mut settings).is_err());
        let argv = ["reroll", "--genres", "1", "--iterations", "10", "--seed", "0"];
        let out = run(&argv, &mut settings).unwrap();
        assert!(out.contains("five areas: 0.00"));
        assert!(run(&["reroll", "--genres", "0"], &mut settings).is_err());
    }

    #[test]
    fn settings_command_prints_json() {
        let mut settings = Settings::default();
        let out = run(&["settings"], &mut settings).unwrap();
        let parsed: Settings = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, settings);
    }
}
