//! Built-in demo designs and `lockstep list`.
//!
//! Each demo instantiates busses from a [`SchemaSet`], so a `[buses]` table
//! in `lockstep.toml` can reshape them (for example, widen a data signal).

use lockstep_common::{SignalType, Value};
use lockstep_ir::{BusSchema, Ports, SchemaSet};
use lockstep_sim::{driven_fn, reactive_fn, Script, SimError, SimulationBuilder, Step};

use crate::GlobalArgs;

/// A named, buildable demo.
pub struct Demo {
    /// Name used on the command line.
    pub name: &'static str,
    /// One-line summary for `lockstep list`.
    pub summary: &'static str,
    /// Instantiates the demo's busses and processes.
    pub build: fn(&SchemaSet) -> Result<SimulationBuilder, SimError>,
}

/// Every built-in demo, in listing order.
pub const DEMOS: &[Demo] = &[
    Demo {
        name: "incrementer",
        summary: "one reactive incrementer driven for two cycles",
        build: incrementer,
    },
    Demo {
        name: "stimulus",
        summary: "a driven counter 0..9 feeding a reactive +1",
        build: stimulus,
    },
    Demo {
        name: "pipeline",
        summary: "three-stage adder chain checked by a testbench",
        build: pipeline,
    },
    Demo {
        name: "stuck",
        summary: "a testbench that never finishes; ends in deadlock",
        build: stuck,
    },
];

/// Looks up a demo by name.
pub fn find(name: &str) -> Result<&'static Demo, String> {
    DEMOS.iter().find(|d| d.name == name).ok_or_else(|| {
        let names: Vec<&str> = DEMOS.iter().map(|d| d.name).collect();
        format!("unknown demo '{name}' (available: {})", names.join(", "))
    })
}

/// Bus kinds the demos instantiate.
pub fn builtin_schemas() -> SchemaSet {
    let i32_ty = SignalType::Signed { width: 32 };
    [
        BusSchema::new("Input")
            .signal("Valid", SignalType::Bool, Some(Value::Bool(false)))
            .signal("NextValue", i32_ty, None),
        BusSchema::new("Output")
            .signal("Valid", SignalType::Bool, Some(Value::Bool(false)))
            .signal("IncrementedValue", i32_ty, None),
        BusSchema::new("Counter").signal("Value", SignalType::Unsigned { width: 32 }, None),
        BusSchema::new("Word")
            .signal("Valid", SignalType::Bool, Some(Value::Bool(false)))
            .signal("Data", i32_ty, Some(Value::Signed(0))),
    ]
    .into_iter()
    .collect()
}

/// Prints the demo list.
pub fn list(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    if !global.quiet {
        for demo in DEMOS {
            println!("{:<12} {}", demo.name, demo.summary);
        }
    }
    Ok(0)
}

/// Forwards `NextValue + 1` while `Valid`; drops `Valid` otherwise and
/// leaves the last result latched.
fn incrementer(schemas: &SchemaSet) -> Result<SimulationBuilder, SimError> {
    let mut b = SimulationBuilder::new();
    let input = b.add_bus("Input", schemas.get("Input")?)?;
    let output = b.add_bus("Output", schemas.get("Output")?)?;
    let in_valid = b.signal(input, "Valid")?;
    let next = b.signal(input, "NextValue")?;
    let out_valid = b.signal(output, "Valid")?;
    let incremented = b.signal(output, "IncrementedValue")?;

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
    )?;

    let script = Script::new()
        .step(move |io| {
            io.write(in_valid, true)?;
            io.write(next, 5)
        })
        .step(move |io| io.write(in_valid, false))
        .idle(1);
    b.add_driven("testbench", Ports::new().writes(input), script)?;
    Ok(b)
}

/// A driven counter writes 0..9, one value per cycle; `plus_one` mirrors
/// each value plus one and the counter checks the echo.
fn stimulus(schemas: &SchemaSet) -> Result<SimulationBuilder, SimError> {
    const COUNT: u64 = 10;

    let mut b = SimulationBuilder::new();
    let counter = schemas.get("Counter")?;
    let stim = b.add_bus("Stimulus", counter)?;
    let result = b.add_bus("Result", counter)?;
    let stim_value = b.signal(stim, "Value")?;
    let result_value = b.signal(result, "Value")?;

    b.add_reactive(
        "plus_one",
        Ports::new().reads(stim).writes(result),
        reactive_fn(move |io| {
            if !io.is_initialized(stim_value) {
                return Ok(());
            }
            let v = io.read_u64(stim_value)?;
            io.write(result_value, v + 1)
        }),
    )?;

    let mut n = 0u64;
    b.add_driven(
        "counter",
        Ports::new().writes(stim).reads(result),
        driven_fn(move |io| {
            // plus_one saw n - 2 during the previous cycle
            if n >= 2 {
                let echoed = io.read_u64(result_value)?;
                if echoed != n - 1 {
                    return Err(SimError::fault(format!(
                        "cycle {}: expected Result.Value = {}, got {echoed}",
                        io.cycle(),
                        n - 1
                    )));
                }
            }
            if n == COUNT {
                return Ok(Step::Finished);
            }
            io.write(stim_value, n)?;
            n += 1;
            Ok(Step::Suspend)
        }),
    )?;
    Ok(b)
}

/// `src -> add1 -> s1 -> add2 -> s2 -> add3 -> s3`; the testbench feeds
/// eight words and checks each arrives four cycles later, increased by 6.
fn pipeline(schemas: &SchemaSet) -> Result<SimulationBuilder, SimError> {
    const WORDS: u64 = 8;
    const LATENCY: u64 = 4;

    let mut b = SimulationBuilder::new();
    let word = schemas.get("Word")?;
    let names = ["src", "s1", "s2", "s3"];
    let mut buses = Vec::new();
    for name in names {
        let bus = b.add_bus(name, word)?;
        buses.push((bus, b.signal(bus, "Valid")?, b.signal(bus, "Data")?));
    }

    for stage in 0..3 {
        let (from, from_valid, from_data) = buses[stage];
        let (to, to_valid, to_data) = buses[stage + 1];
        let add = stage as i64 + 1;
        b.add_reactive(
            &format!("add{add}"),
            Ports::new().reads(from).writes(to),
            reactive_fn(move |io| {
                if io.read_bool(from_valid)? {
                    let d = io.read_i64(from_data)?;
                    io.write(to_valid, true)?;
                    io.write(to_data, d + add)
                } else {
                    io.write(to_valid, false)
                }
            }),
        )?;
    }

    let (src, src_valid, src_data) = buses[0];
    let (sink, sink_valid, sink_data) = buses[3];
    b.add_driven(
        "checker",
        Ports::new().writes(src).reads(sink),
        driven_fn(move |io| {
            let cycle = io.cycle();
            if cycle < WORDS {
                io.write(src_valid, true)?;
                io.write(src_data, cycle as i64 * 10)?;
            } else {
                io.write(src_valid, false)?;
            }
            if cycle >= LATENCY {
                let expected = (cycle - LATENCY) as i64 * 10 + 6;
                let valid = io.read_bool(sink_valid)?;
                let data = io.read_i64(sink_data)?;
                if !valid || data != expected {
                    return Err(SimError::fault(format!(
                        "cycle {cycle}: expected s3 = {expected}, got valid={valid} data={data}"
                    )));
                }
                if cycle == WORDS - 1 + LATENCY {
                    return Ok(Step::Finished);
                }
            }
            Ok(Step::Suspend)
        }),
    )?;
    Ok(b)
}

/// A testbench that keeps counting and never finishes.
fn stuck(schemas: &SchemaSet) -> Result<SimulationBuilder, SimError> {
    let mut b = SimulationBuilder::new();
    let ticks = b.add_bus("Ticks", schemas.get("Counter")?)?;
    let value = b.signal(ticks, "Value")?;
    b.add_driven(
        "stuck",
        Ports::new().writes(ticks),
        driven_fn(move |io| {
            let tick = io.cycle() % (1 << 32);
            io.write(value, tick)?;
            Ok(Step::Suspend)
        }),
    )?;
    Ok(b)
}
