//! Conformance test helpers for the Lockstep simulation kernel.
//!
//! Provides reference designs and run helpers shared by the integration
//! suites under `tests/`, so each suite asserts on behaviour instead of
//! rebuilding the same circuits.

#![warn(missing_docs)]

use std::sync::{Arc, Mutex};

use lockstep_common::{SignalType, Value};
use lockstep_config::{load_config_from_str, sim_config};
use lockstep_ir::{BusSchema, Ports, SignalId};
use lockstep_sim::{
    driven_fn, reactive_fn, RunReport, Script, SimConfig, SimulationBuilder, Step,
};

/// A config that records the trace and stops after `max_cycles`.
pub fn test_config(max_cycles: u64) -> SimConfig {
    SimConfig {
        max_cycles,
        record_trace: true,
        ..SimConfig::default()
    }
}

/// Builds a [`SimConfig`] from `lockstep.toml` text, with tracing on.
pub fn config_from_toml(toml: &str) -> SimConfig {
    let settings = load_config_from_str(toml).unwrap();
    let mut config = sim_config(&settings).unwrap();
    config.record_trace = true;
    config
}

/// Builds and runs a design; panics if it does not build.
pub fn run(builder: SimulationBuilder, config: &SimConfig) -> RunReport {
    match builder.build(config) {
        Ok(sim) => sim.run(),
        Err(err) => panic!("design failed to build: {err}"),
    }
}

/// `Input{Valid: bool = false, NextValue: i32}`.
pub fn input_schema() -> BusSchema {
    BusSchema::new("Input")
        .signal("Valid", SignalType::Bool, Some(Value::Bool(false)))
        .signal("NextValue", SignalType::Signed { width: 32 }, None)
}

/// `Output{Valid: bool = false, IncrementedValue: i32}`.
pub fn output_schema() -> BusSchema {
    BusSchema::new("Output")
        .signal("Valid", SignalType::Bool, Some(Value::Bool(false)))
        .signal("IncrementedValue", SignalType::Signed { width: 32 }, None)
}

/// A single 16-bit word starting at 0.
pub fn word_schema() -> BusSchema {
    BusSchema::new("Word").signal("Value", SignalType::Unsigned { width: 16 }, Some(Value::Unsigned(0)))
}

/// The incrementer circuit with its signal handles.
pub struct Incrementer {
    /// Ready-to-build design.
    pub builder: SimulationBuilder,
    /// `Input.Valid`.
    pub in_valid: SignalId,
    /// `Input.NextValue`.
    pub next: SignalId,
    /// `Output.Valid`.
    pub out_valid: SignalId,
    /// `Output.IncrementedValue`.
    pub incremented: SignalId,
}

/// The incrementer, driven by a testbench that writes one `(Valid,
/// NextValue)` pair per cycle, then idles one cycle and finishes.
///
/// `NextValue` is only written when the pair is valid.
pub fn incrementer(drive: &[(bool, i64)]) -> Incrementer {
    let mut b = SimulationBuilder::new();
    let input = b.add_bus("Input", &input_schema()).unwrap();
    let output = b.add_bus("Output", &output_schema()).unwrap();
    let in_valid = b.signal(input, "Valid").unwrap();
    let next = b.signal(input, "NextValue").unwrap();
    let out_valid = b.signal(output, "Valid").unwrap();
    let incremented = b.signal(output, "IncrementedValue").unwrap();

    b.add_reactive(
        "incrementer",
        Ports::new().reads(input).writes(output),
        reactive_fn(move |io| {
            if io.read_bool(in_valid)? {
                let n = io.read_i64(next)?;
                io.write(out_valid, true)?;
                io.write(incremented, n + 1)
            } else {
                io.write(out_valid, false)
            }
        }),
    )
    .unwrap();

    let mut script = Script::new();
    for &(valid, value) in drive {
        script = script.step(move |io| {
            io.write(in_valid, valid)?;
            if valid {
                io.write(next, value)?;
            }
            Ok(())
        });
    }
    b.add_driven("testbench", Ports::new().writes(input), script.idle(1))
        .unwrap();

    Incrementer {
        builder: b,
        in_valid,
        next,
        out_valid,
        incremented,
    }
}

/// A driven counter paired with a reactive `+1`.
pub struct Echo {
    /// Ready-to-build design.
    pub builder: SimulationBuilder,
    /// `Stimulus.Value`, written by the counter.
    pub stimulus: SignalId,
    /// `Result.Value`, written by `plus_one`.
    pub result: SignalId,
    /// Every initialized input value `plus_one` evaluated, in cycle order.
    pub observed: Arc<Mutex<Vec<u64>>>,
}

/// The counter writes `0..count`, one value per cycle, suspending after
/// each, and finishes on the following resume.
pub fn counter_echo(count: u64) -> Echo {
    let schema = BusSchema::new("Counter").signal("Value", SignalType::Unsigned { width: 32 }, None);
    let mut b = SimulationBuilder::new();
    let stim = b.add_bus("Stimulus", &schema).unwrap();
    let res = b.add_bus("Result", &schema).unwrap();
    let stimulus = b.signal(stim, "Value").unwrap();
    let result = b.signal(res, "Value").unwrap();
    let observed = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&observed);
    b.add_reactive(
        "plus_one",
        Ports::new().reads(stim).writes(res),
        reactive_fn(move |io| {
            if !io.is_initialized(stimulus) {
                return Ok(());
            }
            let v = io.read_u64(stimulus)?;
            seen.lock().unwrap().push(v);
            io.write(result, v + 1)
        }),
    )
    .unwrap();

    let mut n = 0;
    b.add_driven(
        "counter",
        Ports::new().writes(stim),
        driven_fn(move |io| {
            if n == count {
                return Ok(Step::Finished);
            }
            io.write(stimulus, n)?;
            n += 1;
            Ok(Step::Suspend)
        }),
    )
    .unwrap();

    Echo {
        builder: b,
        stimulus,
        result,
        observed,
    }
}

/// A wide, multi-level design for reordering checks.
///
/// An LFSR testbench drives `Seed` for `cycles` cycles. `width` reactive
/// `mixN` processes share level 0, a `fold` process sums their lanes, and
/// `acc` accumulates the sum through its own register feedback.
pub fn mesh(width: usize, cycles: u64) -> SimulationBuilder {
    let word = word_schema();
    let mut b = SimulationBuilder::new();
    let seed_bus = b.add_bus("Seed", &word).unwrap();
    let seed = b.signal(seed_bus, "Value").unwrap();

    let mut lanes = Vec::new();
    let mut fold_ports = Ports::new();
    for i in 0..width {
        let bus = b.add_bus(&format!("Lane{i}"), &word).unwrap();
        let lane = b.signal(bus, "Value").unwrap();
        let k = i as u64 + 1;
        b.add_reactive(
            &format!("mix{i}"),
            Ports::new().reads(seed_bus).writes(bus),
            reactive_fn(move |io| {
                let s = io.read_u64(seed)?;
                io.write(lane, (s * k + (s >> k)) & 0xFFFF)
            }),
        )
        .unwrap();
        fold_ports = fold_ports.reads(bus);
        lanes.push(lane);
    }

    let sum_bus = b.add_bus("Sum", &word).unwrap();
    let sum = b.signal(sum_bus, "Value").unwrap();
    b.add_reactive(
        "fold",
        fold_ports.writes(sum_bus),
        reactive_fn(move |io| {
            let mut total = 0u64;
            for &lane in &lanes {
                total = (total + io.read_u64(lane)?) & 0xFFFF;
            }
            io.write(sum, total)
        }),
    )
    .unwrap();

    let acc_bus = b.add_bus("Acc", &word).unwrap();
    let acc = b.signal(acc_bus, "Value").unwrap();
    b.add_reactive(
        "acc",
        Ports::new().reads(sum_bus).reads(acc_bus).writes(acc_bus),
        reactive_fn(move |io| {
            let next = (io.read_u64(acc)? + io.read_u64(sum)?) & 0xFFFF;
            io.write(acc, next)
        }),
    )
    .unwrap();

    let mut state: u64 = 0xACE1;
    let mut cycle = 0;
    b.add_driven(
        "lfsr",
        Ports::new().writes(seed_bus),
        driven_fn(move |io| {
            let bit = (state ^ (state >> 2) ^ (state >> 3) ^ (state >> 5)) & 1;
            state = (state >> 1) | (bit << 15);
            io.write(seed, state)?;
            cycle += 1;
            Ok(if cycle == cycles {
                Step::Finished
            } else {
                Step::Suspend
            })
        }),
    )
    .unwrap();
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_toml_reads_simulation_section() {
        let config = config_from_toml("[simulation]\nmax_cycles = 9\ntie_break = \"reverse\"\n");
        assert_eq!(config.max_cycles, 9);
        assert!(config.record_trace);
    }

    #[test]
    fn mesh_has_expected_levels() {
        let sim = mesh(4, 8).build(&SimConfig::default()).unwrap();
        let levels = sim.schedule().levels();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].len(), 4);
        assert_eq!(levels[1].len(), 1);
        assert_eq!(levels[2].len(), 1);
    }
}
