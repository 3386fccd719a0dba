//! Deterministic cycle-based simulation kernel.
//!
//! A design is a set of busses (named groups of typed signals) and processes
//! that read and write them. Reactive processes are combinational logic
//! evaluated every cycle in dependency order; driven processes are
//! resumable testbench-style state machines that run one segment per cycle.
//! Every process reads the state committed by the previous cycle and stages
//! its writes, which are committed atomically when the cycle ends.
//!
//! # Architecture
//!
//! - `store` holds committed values and the pending writes of the cycle.
//! - `graph` derives producer/consumer edges and the reactive schedule.
//! - `scheduler` runs one cycle: evaluate by level, resume driven, commit.
//! - `driver` repeats cycles and decides the outcome of a run.
//! - `trace` and `waveform` record committed values and export VCD.
//! - `interactive` is a step/inspect debugger over a running simulation.
//!
//! # Usage
//!
//! ```ignore
//! use lockstep_sim::{simulate, SimConfig, SimulationBuilder};
//!
//! let mut builder = SimulationBuilder::new();
//! // add busses and processes ...
//! let report = simulate(builder, &SimConfig::default())?;
//! println!("{} after {} cycles", report.status, report.cycles);
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod driver;
pub mod error;
pub mod graph;
pub mod interactive;
pub mod process;
pub mod scheduler;
pub mod store;
pub mod trace;
pub mod waveform;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use lockstep_common::Frequency;
use tracing::info;

pub use builder::SimulationBuilder;
pub use driver::{CancelToken, RunReport, RunStatus, Simulation, StepResult};
pub use error::SimError;
pub use graph::{build_schedule, DependencyGraph, Schedule, TieBreak};
pub use interactive::{parse_command, CommandResult, InteractiveSim, SimCommand};
pub use process::{driven_fn, reactive_fn, Driven, ProcessIo, Reactive, Script, Step, WriteBuffer};
pub use scheduler::{CycleError, Phase, Scheduler};
pub use store::{SignalStore, Snapshot, StoreError};
pub use trace::{CycleRecord, Trace, TraceSignal};
pub use waveform::{VcdRecorder, WaveformRecorder};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Cycle budget. A run with driven processes that are still suspended
    /// when it runs out ends in deadlock.
    pub max_cycles: u64,
    /// Evaluate each schedule level on the rayon pool.
    pub parallel: bool,
    /// Ordering of processes within a level.
    pub tie_break: TieBreak,
    /// Keep the committed history in the report.
    pub record_trace: bool,
    /// Write a VCD of the run here. Implies tracing.
    pub waveform_path: Option<PathBuf>,
    /// Clock used to stamp cycles in waveform output.
    pub clock: Frequency,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_cycles: 1000,
            parallel: false,
            tie_break: TieBreak::Declaration,
            record_trace: false,
            waveform_path: None,
            clock: Frequency::default(),
        }
    }
}

/// Builds and runs a simulation to completion.
///
/// Structural errors are returned as `Err`; failures during the run are
/// reported through [`RunReport::status`]. When `config.waveform_path` is
/// set the trace is written there as VCD.
pub fn simulate(builder: SimulationBuilder, config: &SimConfig) -> Result<RunReport, SimError> {
    let report = builder.build(config)?.run();
    if let (Some(path), Some(trace)) = (&config.waveform_path, &report.trace) {
        write_vcd(trace, path, config.clock)?;
    }
    Ok(report)
}

/// Writes `trace` to `path` as VCD, one clock period per cycle.
pub fn write_vcd(trace: &Trace, path: &Path, clock: Frequency) -> Result<(), SimError> {
    let file = File::create(path)?;
    let mut recorder = VcdRecorder::new(BufWriter::new(file));
    trace.replay(&mut recorder, clock.period_ps())?;
    info!(path = %path.display(), cycles = trace.cycles().len(), "waveform written");
    Ok(())
}
