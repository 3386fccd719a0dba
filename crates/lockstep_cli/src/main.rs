//! Lockstep CLI: runs and inspects the built-in demo circuits.
//!
//! Provides `lockstep list` to enumerate demos, `lockstep check` to build a
//! demo and print its schedule, and `lockstep run` to simulate one.

#![warn(missing_docs)]

mod check;
mod demos;
mod logging;
mod project;
mod run;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Lockstep, a deterministic cycle-based circuit simulator.
#[derive(Parser, Debug)]
#[command(name = "lockstep", version, about = "Lockstep cycle simulator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `lockstep.toml` file. Defaults to `./lockstep.toml` if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the built-in demo designs.
    List,
    /// Build a demo and print its schedule without running it.
    Check(CheckArgs),
    /// Simulate a demo and print the run report.
    Run(RunArgs),
}

/// Arguments for `lockstep check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Demo name (see `lockstep list`).
    pub demo: String,
}

/// Arguments for `lockstep run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Demo name (see `lockstep list`).
    pub demo: String,

    /// Cycle budget, overriding `simulation.max_cycles`.
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Evaluate schedule levels in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Shuffle processes within each level using this seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the trace here; `.json` selects JSON, anything else VCD.
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// Report format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Launch the interactive debugger instead of running to completion.
    #[arg(short, long)]
    pub interactive: bool,
}

/// Run report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a config file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let settings = match project::load_settings(&global) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    logging::init(&global, &settings.log.level);

    let result = match cli.command {
        Command::List => demos::list(&global),
        Command::Check(ref args) => check::run(args, &global, &settings),
        Command::Run(ref args) => run::run(args, &global, &settings),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_list() {
        let cli = Cli::parse_from(["lockstep", "list"]);
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn parse_check() {
        let cli = Cli::parse_from(["lockstep", "check", "pipeline"]);
        match cli.command {
            Command::Check(ref args) => assert_eq!(args.demo, "pipeline"),
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn parse_run_default() {
        let cli = Cli::parse_from(["lockstep", "run", "incrementer"]);
        match cli.command {
            Command::Run(ref args) => {
                assert_eq!(args.demo, "incrementer");
                assert!(args.cycles.is_none());
                assert!(!args.parallel);
                assert!(args.seed.is_none());
                assert!(args.trace.is_none());
                assert_eq!(args.format, ReportFormat::Text);
                assert!(!args.interactive);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_run_with_args() {
        let cli = Cli::parse_from([
            "lockstep",
            "run",
            "stuck",
            "--cycles",
            "50",
            "--parallel",
            "--seed",
            "3",
            "--trace",
            "out/stuck.vcd",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Run(ref args) => {
                assert_eq!(args.cycles, Some(50));
                assert!(args.parallel);
                assert_eq!(args.seed, Some(3));
                assert_eq!(args.trace, Some(PathBuf::from("out/stuck.vcd")));
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["lockstep", "--quiet", "--config", "sim.toml", "list"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("sim.toml")));
    }

    #[test]
    fn parse_verbose_after_subcommand() {
        let cli = Cli::parse_from(["lockstep", "run", "stimulus", "-v", "-i"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Run(ref args) => assert!(args.interactive),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn missing_demo_is_rejected() {
        assert!(Cli::try_parse_from(["lockstep", "run"]).is_err());
    }
}
