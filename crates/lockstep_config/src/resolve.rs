//! Turning a parsed configuration into simulator inputs.

use crate::error::ConfigError;
use crate::types::{LockstepConfig, TraceFormat};
use lockstep_common::Frequency;
use lockstep_ir::{BusSchema, SchemaSet};
use lockstep_sim::SimConfig;

/// Builds a validated [`SchemaSet`] from the `[buses]` tables.
///
/// The table key is the bus kind. Callers overlay the result on their
/// built-in schemas, so a kind defined here replaces the built-in one.
pub fn resolve_schemas(config: &LockstepConfig) -> Result<SchemaSet, ConfigError> {
    let set: SchemaSet = config
        .buses
        .iter()
        .map(|(kind, table)| BusSchema {
            kind: kind.clone(),
            signals: table.signals.clone(),
        })
        .collect();
    set.validate()?;
    Ok(set)
}

/// Derives the simulator configuration.
///
/// A VCD trace sets `waveform_path`; a JSON trace only turns on recording,
/// since writing it is up to the caller.
pub fn sim_config(config: &LockstepConfig) -> Result<SimConfig, ConfigError> {
    let sim = &config.simulation;
    let clock: Frequency = sim
        .clock
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("simulation.clock: {e}")))?;
    let trace = &config.trace;
    let waveform_path = match trace.format {
        TraceFormat::Vcd if trace.enabled => trace.path.clone(),
        _ => None,
    };

    Ok(SimConfig {
        max_cycles: sim.max_cycles,
        parallel: sim.parallel,
        tie_break: sim.tie_break,
        record_trace: trace.enabled,
        waveform_path,
        clock,
    })
}
