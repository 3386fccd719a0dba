//! `lockstep run`: simulate a demo and report the outcome.
//!
//! Settings come from `lockstep.toml` first; `--cycles`, `--parallel`,
//! `--seed`, and `--trace` override them. The report goes to stdout as text
//! or JSON, and the exit code is 0 only for a successful run.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use lockstep_config::{sim_config, LockstepConfig, TraceFormat};
use lockstep_sim::{simulate, write_vcd, InteractiveSim, RunReport, SimConfig, TieBreak, Trace};
use tracing::{debug, info};

use crate::check::effective_schemas;
use crate::demos;
use crate::{GlobalArgs, ReportFormat, RunArgs};

/// Where the trace of a run goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutput {
    /// Not written.
    None,
    /// VCD waveform.
    Vcd(PathBuf),
    /// Serialized trace as JSON.
    Json(PathBuf),
}

/// Runs the `lockstep run` command.
pub fn run(
    args: &RunArgs,
    global: &GlobalArgs,
    settings: &LockstepConfig,
) -> Result<i32, Box<dyn std::error::Error>> {
    let demo = demos::find(&args.demo)?;
    let schemas = effective_schemas(settings)?;
    let output = trace_output(args, settings);
    let config = run_config(args, settings, &output)?;
    let builder = (demo.build)(&schemas)?;
    info!(
        demo = demo.name,
        max_cycles = config.max_cycles,
        parallel = config.parallel,
        tie_break = %config.tie_break,
        interactive = args.interactive,
        "starting run"
    );

    if !global.quiet {
        eprintln!("   Simulating {} (max {} cycles)", demo.name, config.max_cycles);
    }

    let report = if args.interactive {
        let mut debugger = InteractiveSim::new(builder.build(&config)?);
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        debugger.run_repl(&mut stdin.lock(), &mut stdout)?;
        let report = debugger.into_simulation().into_report();
        if let (TraceOutput::Vcd(path), Some(trace)) = (&output, &report.trace) {
            write_vcd(trace, path, config.clock)?;
        }
        report
    } else {
        // simulate() writes the VCD itself when waveform_path is set
        simulate(builder, &config)?
    };

    if let (TraceOutput::Json(path), Some(trace)) = (&output, &report.trace) {
        write_json_trace(trace, path)?;
        debug!(path = %path.display(), "json trace written");
    }
    info!(demo = demo.name, status = %report.status, cycles = report.cycles, "run finished");
    if !global.quiet {
        match &output {
            TraceOutput::Vcd(path) | TraceOutput::Json(path) => {
                eprintln!("      Trace {}", path.display());
            }
            TraceOutput::None => {}
        }
    }

    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                print!("{}", render_text(&report));
            }
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(if report.status.is_success() { 0 } else { 1 })
}

/// Resolves the trace destination: `--trace` wins over `[trace]`.
pub fn trace_output(args: &RunArgs, settings: &LockstepConfig) -> TraceOutput {
    if let Some(path) = &args.trace {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        return if is_json {
            TraceOutput::Json(path.clone())
        } else {
            TraceOutput::Vcd(path.clone())
        };
    }
    match (&settings.trace.path, settings.trace.enabled) {
        (Some(path), true) => match settings.trace.format {
            TraceFormat::Vcd => TraceOutput::Vcd(path.clone()),
            TraceFormat::Json => TraceOutput::Json(path.clone()),
        },
        _ => TraceOutput::None,
    }
}

/// Derives the simulator configuration from settings and flags.
pub fn run_config(
    args: &RunArgs,
    settings: &LockstepConfig,
    output: &TraceOutput,
) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut config = sim_config(settings)?;
    if let Some(cycles) = args.cycles {
        if cycles == 0 {
            return Err("--cycles must be positive".into());
        }
        config.max_cycles = cycles;
    }
    if args.parallel {
        config.parallel = true;
    }
    if let Some(seed) = args.seed {
        config.tie_break = TieBreak::Seeded(seed);
    }
    config.record_trace = *output != TraceOutput::None;
    config.waveform_path = match output {
        TraceOutput::Vcd(path) => Some(path.clone()),
        _ => None,
    };
    Ok(config)
}

fn write_json_trace(trace: &Trace, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, trace)?;
    Ok(())
}

/// Human-readable report.
pub fn render_text(report: &RunReport) -> String {
    format!(
        "status: {}\ncycles: {}\ndigest: {}\n",
        report.status, report.cycles, report.digest
    )
}
