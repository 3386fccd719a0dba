//! Reads before the first commit fail unless the signal declares an
//! initial value.

use lockstep_common::{SignalType, Value};
use lockstep_conformance::{run, test_config};
use lockstep_ir::{BusSchema, Ports};
use lockstep_sim::{reactive_fn, RunStatus, Script, SimError, SimulationBuilder};

fn raw() -> BusSchema {
    BusSchema::new("Raw").signal("N", SignalType::Unsigned { width: 8 }, None)
}

fn preset() -> BusSchema {
    BusSchema::new("Preset").signal("N", SignalType::Unsigned { width: 8 }, Some(Value::Unsigned(7)))
}

/// `reader` copies `src.N` into `dst.N` every cycle.
fn copier(src_schema: &BusSchema, drive: bool) -> SimulationBuilder {
    let mut b = SimulationBuilder::new();
    let src = b.add_bus("src", src_schema).unwrap();
    let dst = b.add_bus("dst", &raw()).unwrap();
    let s = b.signal(src, "N").unwrap();
    let d = b.signal(dst, "N").unwrap();
    b.add_reactive(
        "reader",
        Ports::new().reads(src).writes(dst),
        reactive_fn(move |io| {
            let v = io.read(s)?;
            io.write(d, v)
        }),
    )
    .unwrap();
    if drive {
        let script = Script::new().step(move |io| io.write(s, 1u8)).idle(2);
        b.add_driven("tb", Ports::new().writes(src), script).unwrap();
    }
    b
}

#[test]
fn uninitialized_read_names_process_and_signal() {
    let report = run(copier(&raw(), false), &test_config(10));
    match report.status {
        RunStatus::Error {
            process,
            cycle,
            cause: SimError::UninitializedRead { signal },
        } => {
            assert_eq!(process, "reader");
            assert_eq!(cycle, 0);
            assert_eq!(signal, "src.N");
        }
        other => panic!("expected uninitialized read, got {other}"),
    }
    assert_eq!(report.cycles, 0);
}

#[test]
fn declared_initial_value_is_readable_at_cycle_zero() {
    let report = run(copier(&preset(), false), &test_config(3));
    assert!(report.status.is_success(), "{}", report.status);
    let trace = report.trace.unwrap();
    assert_eq!(trace.cycles().len(), 3);
}

#[test]
fn first_write_is_not_visible_in_the_same_cycle() {
    // tb's cycle 0 write commits after reader already ran against the
    // empty initial state.
    let report = run(copier(&raw(), true), &test_config(10));
    assert!(
        matches!(
            report.status,
            RunStatus::Error {
                cycle: 0,
                cause: SimError::UninitializedRead { .. },
                ..
            }
        ),
        "{}",
        report.status
    );
}

#[test]
fn initial_value_is_replaced_by_first_commit() {
    let b = copier(&preset(), true);
    let dst = b.design().find_signal("dst.N").unwrap();
    let report = run(b, &test_config(10));
    assert!(report.status.is_success(), "{}", report.status);
    let trace = report.trace.unwrap();
    assert_eq!(
        trace.series(dst),
        vec![
            Some(Value::Unsigned(7)),
            Some(Value::Unsigned(1)),
            Some(Value::Unsigned(1)),
        ]
    );
}
