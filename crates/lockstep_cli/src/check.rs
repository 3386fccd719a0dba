//! `lockstep check`: build a demo and print its schedule.

use lockstep_config::{resolve_schemas, sim_config, LockstepConfig};
use lockstep_ir::SchemaSet;
use lockstep_sim::Simulation;

use crate::demos::{self, builtin_schemas};
use crate::{CheckArgs, GlobalArgs};

/// Runs the `lockstep check` command.
///
/// Building validates schemas, port declarations, writer ownership, and
/// reactive loops; any failure is returned as an error (exit code 1).
pub fn run(
    args: &CheckArgs,
    global: &GlobalArgs,
    settings: &LockstepConfig,
) -> Result<i32, Box<dyn std::error::Error>> {
    let demo = demos::find(&args.demo)?;
    let schemas = effective_schemas(settings)?;
    let config = sim_config(settings)?;
    let sim = (demo.build)(&schemas)?.build(&config)?;

    if !global.quiet {
        eprintln!("    Checked {}", demo.name);
        print!("{}", render_schedule(&sim));
    }
    Ok(0)
}

/// Built-in schemas overlaid with the config's `[buses]`.
pub fn effective_schemas(settings: &LockstepConfig) -> Result<SchemaSet, Box<dyn std::error::Error>> {
    let mut schemas = builtin_schemas();
    schemas.overlay(&resolve_schemas(settings)?);
    Ok(schemas)
}

/// Levels, driven processes, and dependency edges, one item per line.
pub fn render_schedule(sim: &Simulation) -> String {
    let design = sim.design();
    let schedule = sim.schedule();
    let mut out = String::new();
    for (n, level) in schedule.levels().iter().enumerate() {
        let names: Vec<&str> = level.iter().map(|&p| design.process_name(p)).collect();
        out.push_str(&format!("level {n}: {}\n", names.join(", ")));
    }
    let driven: Vec<&str> = schedule
        .driven()
        .iter()
        .map(|&p| design.process_name(p))
        .collect();
    out.push_str(&format!("driven: {}\n", driven.join(", ")));
    for &(from, to) in schedule.edges() {
        out.push_str(&format!(
            "edge: {} -> {}\n",
            design.process_name(from),
            design.process_name(to)
        ));
    }
    out
}
