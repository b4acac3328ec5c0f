//! Command-line surface: `postscript [--settings PATH] [--seed N] <command> [flags]`.

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use postscript_core::{
    reshape::{parse_counts, ChapterLength},
    CheeseCounts, Genre, GENRE_COUNT,
};
use postscript_opt::Strategy;
use std::path::PathBuf;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    " built ",
    env!("BUILD_DATE"),
    ")"
);

/// One whole number per genre, any separator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenreCounts(pub Vec<u32>);

fn genre_counts(text: &str) -> Result<GenreCounts, String> {
    parse_counts(text, GENRE_COUNT)
        .map(GenreCounts)
        .map_err(|e| e.to_string())
}

fn cheese_counts(text: &str) -> Result<CheeseCounts, String> {
    let counts = parse_counts(text, 3).map_err(|e| e.to_string())?;
    CheeseCounts::from_slice(&counts).map_err(|e| e.to_string())
}

fn strategy(name: &str) -> Result<Strategy, String> {
    Strategy::parse(name).ok_or_else(|| "expected hill-climb or adaptive".to_string())
}

fn genre(name: &str) -> Result<Genre, String> {
    Genre::parse(name).ok_or_else(|| {
        let names: Vec<&str> = Genre::ALL.iter().map(|g| g.name()).collect();
        format!("expected one of {}", names.join(", "))
    })
}

fn chapter_length(text: &str) -> Result<ChapterLength, String> {
    let hunts: u32 = text.trim().parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
    ChapterLength::from_hunts(hunts)
        .ok_or_else(|| format!("chapter length must be 10, 20 or 30 hunts, got {hunts}"))
}

/// Postscript planner: notoriety simulators and page weight optimizer
#[derive(Debug, Parser)]
#[command(name = "postscript")]
#[command(version = VERSION)]
#[command(about = "Simulators and a page weight optimizer for Postscript chapters")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Settings file (default $POSTSCRIPT_SETTINGS or ./saves/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Seed for reproducible random streams
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Do not store the effective parameters
    #[arg(long, global = true)]
    pub no_save: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags every command reads once parsing is done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub seed: u64,
    pub json: bool,
}

impl Cli {
    /// `--seed`, or a fresh random one.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            seed: self.seed.unwrap_or_else(rand::random),
            json: self.json,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Dial page weights to maximise the all-ready probability
    Optimize(OptimizeArgs),
    /// Batch statistics for one chapter setup
    Simulate(SimulateArgs),
    /// Two setups back to back
    Dual(DualArgs),
    /// Two setups, dropping ready genres before the second
    DualPruned(DualArgs),
    /// Mallet farming cycles
    Farm(FarmArgs),
    /// Mallet cost of rerolling area options
    Reroll(RerollArgs),
    /// Scale a page distribution by a percentage
    Scale(ScaleArgs),
    /// Patch a bad start with a contingency chapter
    FixStart(FixStartArgs),
    /// Print the stored settings
    Settings,
}

impl Command {
    /// Whether running the command updates the stored settings.
    pub fn stores_settings(&self) -> bool {
        !matches!(self, Command::Settings)
    }
}

/// Cheese plan overrides for one chapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Args)]
pub struct PlanArgs {
    /// `low,mid,high` cheese counts
    #[arg(long, value_parser = cheese_counts)]
    pub cheese: Option<CheeseCounts>,

    /// Whether the chapter is extended (true/false, yes/no)
    #[arg(long, value_parser = BoolishValueParser::new())]
    pub extend: Option<bool>,
}

#[derive(Clone, Debug, Args)]
pub struct OptimizeArgs {
    /// Starting notoriety per genre
    #[arg(long, value_parser = genre_counts)]
    pub notoriety: Option<GenreCounts>,

    /// Starting page counts per genre
    #[arg(long, value_parser = genre_counts)]
    pub pages: Option<GenreCounts>,

    #[command(flatten)]
    pub plan: PlanArgs,

    /// Perturbation range in pages
    #[arg(long)]
    pub range: Option<f64>,

    #[arg(long)]
    pub iterations: Option<u32>,

    /// Candidates scored per iteration
    #[arg(long)]
    pub candidates: Option<u32>,

    /// Trials per candidate
    #[arg(long)]
    pub trials: Option<u32>,

    /// hill-climb or adaptive
    #[arg(long, value_parser = strategy)]
    pub strategy: Option<Strategy>,
}

#[derive(Clone, Debug, Args)]
pub struct SimulateArgs {
    #[arg(long, value_parser = genre_counts)]
    pub notoriety: Option<GenreCounts>,

    #[arg(long, value_parser = genre_counts)]
    pub pages: Option<GenreCounts>,

    #[command(flatten)]
    pub plan: PlanArgs,

    #[arg(long)]
    pub runs: Option<u32>,
}

/// Flags of one dual setup, gathered from the numbered flags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SetupArgs {
    pub pages: Option<GenreCounts>,
    pub plan: PlanArgs,
    pub auto_extend: Option<bool>,
}

#[derive(Clone, Debug, Args)]
pub struct DualArgs {
    #[arg(long, value_parser = genre_counts)]
    pub notoriety: Option<GenreCounts>,

    #[arg(long)]
    pub runs: Option<u32>,

    /// Page counts of setup 1
    #[arg(long, value_parser = genre_counts)]
    pub pages1: Option<GenreCounts>,

    /// Page counts of setup 2
    #[arg(long, value_parser = genre_counts)]
    pub pages2: Option<GenreCounts>,

    #[arg(long, value_parser = cheese_counts)]
    pub cheese1: Option<CheeseCounts>,

    #[arg(long, value_parser = cheese_counts)]
    pub cheese2: Option<CheeseCounts>,

    #[arg(long, value_parser = BoolishValueParser::new())]
    pub extend1: Option<bool>,

    #[arg(long, value_parser = BoolishValueParser::new())]
    pub extend2: Option<bool>,

    /// Let setup 1 add hunts while its top genres lag
    #[arg(long, value_parser = BoolishValueParser::new())]
    pub auto_extend1: Option<bool>,

    /// Let setup 2 add hunts while its top genres lag
    #[arg(long, value_parser = BoolishValueParser::new())]
    pub auto_extend2: Option<bool>,
}

impl DualArgs {
    /// Flags of setup `idx` (0 or 1).
    pub fn setup(&self, idx: usize) -> SetupArgs {
        if idx == 0 {
            SetupArgs {
                pages: self.pages1.clone(),
                plan: PlanArgs {
                    cheese: self.cheese1,
                    extend: self.extend1,
                },
                auto_extend: self.auto_extend1,
            }
        } else {
            SetupArgs {
                pages: self.pages2.clone(),
                plan: PlanArgs {
                    cheese: self.cheese2,
                    extend: self.extend2,
                },
                auto_extend: self.auto_extend2,
            }
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct FarmArgs {
    #[arg(long)]
    pub cycles: Option<u32>,

    /// Mallets earned per run
    #[arg(long)]
    pub mallets: Option<f64>,

    /// 50-point cheese hunts per run
    #[arg(long)]
    pub mid: Option<u32>,

    /// 125-point cheese hunts per run
    #[arg(long)]
    pub high: Option<u32>,
}

#[derive(Clone, Debug, Args)]
pub struct RerollArgs {
    /// Genres in the option pool
    #[arg(long)]
    pub genres: Option<usize>,

    #[arg(long)]
    pub iterations: Option<u32>,
}

#[derive(Clone, Debug, Args)]
pub struct ScaleArgs {
    #[arg(long, value_parser = genre_counts)]
    pub pages: Option<GenreCounts>,

    /// Target size as a percentage of the current total
    #[arg(long)]
    pub percent: Option<f64>,
}

#[derive(Clone, Debug, Args)]
pub struct FixStartArgs {
    #[arg(long, value_parser = genre_counts)]
    pub pages: Option<GenreCounts>,

    /// Genre of the contingency chapter
    #[arg(long, value_parser = genre)]
    pub genre: Option<Genre>,

    /// Contingency chapter length in hunts (10, 20 or 30)
    #[arg(long, value_parser = chapter_length)]
    pub length: Option<ChapterLength>,

    /// Share of the distribution the patched genre should reach, in percent
    #[arg(long)]
    pub share: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(argv: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("postscript").chain(argv.iter().copied()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_command_flags_and_globals() {
        let cli = parse(&[
            "optimize",
            "--pages",
            "500,500,500,500,500",
            "--no-save",
            "--seed",
            "7",
            "--extend",
            "yes",
            "--strategy",
            "hill-climb",
        ])
        .unwrap();
        assert!(cli.no_save);
        assert!(!cli.json);
        assert_eq!(cli.run_options().seed, 7);
        let Command::Optimize(args) = cli.command else {
            panic!("expected optimize");
        };
        assert_eq!(args.pages, Some(GenreCounts(vec![500; 5])));
        assert_eq!(args.plan.extend, Some(true));
        assert_eq!(args.strategy, Some(Strategy::HillClimb));
        assert_eq!(args.iterations, None);
    }

    #[test]
    fn empty_invocation_shows_help() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand);
        assert_eq!(parse(&["--version"]).unwrap_err().kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn reports_bad_input() {
        assert!(parse(&["launch"]).is_err());
        assert!(parse(&["farm", "--cycles"]).is_err());
        assert!(parse(&["farm", "cycles"]).is_err());
        assert!(parse(&["farm", "--cycles", "many"]).is_err());
        assert!(parse(&["simulate", "--pages", "1,2"]).is_err());
        assert!(parse(&["simulate", "--extend", "maybe"]).is_err());
        assert!(parse(&["simulate", "--pages", "99999999999,1,1,1,1"]).is_err());
        assert!(parse(&["fix-start", "--length", "15"]).is_err());
        assert!(parse(&["fix-start", "--genre", "poetry"]).is_err());
        assert!(parse(&["optimize", "--strategy", "random"]).is_err());
    }

    #[test]
    fn dual_flags_split_per_setup() {
        let cli = parse(&[
            "dual-pruned",
            "--cheese1",
            "0,8,2",
            "--auto-extend2",
            "on",
            "--pages2",
            "1 1 1 1 1",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(cli.command.stores_settings());
        let Command::DualPruned(args) = cli.command else {
            panic!("expected dual-pruned");
        };
        let first = args.setup(0);
        assert_eq!(first.plan.cheese, Some(CheeseCounts { low: 0, mid: 8, high: 2 }));
        assert_eq!(first.pages, None);
        let second = args.setup(1);
        assert_eq!(second.auto_extend, Some(true));
        assert_eq!(second.pages, Some(GenreCounts(vec![1; 5])));
        assert_eq!(second.plan, PlanArgs::default());
    }

    #[test]
    fn settings_command_is_read_only() {
        let cli = parse(&["settings", "--settings", "other.yaml"]).unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("other.yaml")));
        assert!(!cli.command.stores_settings());
    }
}
