//! Assembling a [`Simulation`] from busses and process behaviours.

use lockstep_ir::{BusId, BusSchema, Design, Ports, ProcessId, ProcessKind, SignalId};
use tracing::{info, instrument};

use crate::driver::Simulation;
use crate::error::SimError;
use crate::graph::build_schedule;
use crate::process::{Driven, Reactive};
use crate::scheduler::Scheduler;
use crate::store::{SignalStore, StoreError};
use crate::SimConfig;

/// Collects the design and the behaviour of each process.
///
/// Nothing is checked across processes until [`build`](Self::build), which
/// derives the schedule and rejects conflicting writers and reactive loops.
#[derive(Default)]
pub struct SimulationBuilder {
    design: Design,
    reactive: Vec<(ProcessId, Box<dyn Reactive>)>,
    driven: Vec<(ProcessId, Box<dyn Driven>)>,
}

impl SimulationBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates a bus.
    pub fn add_bus(&mut self, name: &str, schema: &BusSchema) -> Result<BusId, SimError> {
        Ok(self.design.add_bus(name, schema)?)
    }

    /// Looks up a signal of `bus` by name.
    pub fn signal(&self, bus: BusId, name: &str) -> Result<SignalId, SimError> {
        Ok(self.design.signal(bus, name)?)
    }

    /// Registers combinational logic.
    pub fn add_reactive(
        &mut self,
        name: &str,
        ports: Ports,
        process: impl Reactive + 'static,
    ) -> Result<ProcessId, SimError> {
        let id = self.design.add_process(name, ProcessKind::Reactive, &ports)?;
        self.reactive.push((id, Box::new(process)));
        Ok(id)
    }

    /// Registers a driven process.
    pub fn add_driven(
        &mut self,
        name: &str,
        ports: Ports,
        process: impl Driven + 'static,
    ) -> Result<ProcessId, SimError> {
        let id = self.design.add_process(name, ProcessKind::Driven, &ports)?;
        self.driven.push((id, Box::new(process)));
        Ok(id)
    }

    /// The design assembled so far.
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// Validates the design and produces a runnable simulation.
    #[instrument(skip_all, fields(buses = self.design.buses().len(), processes = self.design.processes().len()))]
    pub fn build(self, config: &SimConfig) -> Result<Simulation, SimError> {
        let schedule = build_schedule(&self.design, config.tie_break)?;

        let mut store = SignalStore::new();
        for (id, decl) in self.design.signals().iter() {
            store
                .declare(id, decl.ty, decl.init)
                .map_err(|err| match err {
                    StoreError::Type { signal, source } => SimError::TypeMismatch {
                        signal: self.design.signal_path(signal),
                        source,
                    },
                    _ => SimError::UnknownSignal(self.design.signal_path(id)),
                })?;
        }

        info!(
            signals = store.len(),
            reactive = schedule.reactive_count(),
            levels = schedule.levels().len(),
            driven = schedule.driven().len(),
            tie_break = %schedule.tie_break(),
            "simulation built"
        );
        let scheduler = Scheduler::new(schedule, self.reactive, self.driven, config.parallel);
        Ok(Simulation::new(self.design, store, scheduler, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{reactive_fn, Script};
    use lockstep_common::{SignalType, Value};

    fn wire() -> BusSchema {
        BusSchema::new("Wire").signal("V", SignalType::Bool, Some(Value::Bool(false)))
    }

    #[test]
    fn build_declares_every_signal() {
        let mut b = SimulationBuilder::new();
        let x = b.add_bus("x", &wire()).unwrap();
        b.add_bus("y", &BusSchema::new("Raw").signal("N", SignalType::Unsigned { width: 4 }, None))
            .unwrap();
        b.add_driven("tb", Ports::new().writes(x), Script::new()).unwrap();
        let sim = b.build(&SimConfig::default()).unwrap();
        assert_eq!(sim.store().len(), 2);
        assert_eq!(sim.value("x.V").unwrap(), Some(Value::Bool(false)));
        assert_eq!(sim.value("y.N").unwrap(), None);
        assert_eq!(sim.cycles_completed(), 0);
    }

    #[test]
    fn bus_with_bad_width_rejected() {
        let mut b = SimulationBuilder::new();
        let zero = BusSchema::new("Bad").signal("V", SignalType::Signed { width: 0 }, Some(Value::Signed(0)));
        assert!(matches!(
            b.add_bus("z", &zero),
            Err(SimError::Schema(lockstep_ir::SchemaError::InvalidWidth { .. }))
        ));
        let wide = BusSchema::new("Bad").signal("V", SignalType::Unsigned { width: 99 }, None);
        assert!(b.add_bus("w", &wide).is_err());
        assert!(b.design().find_bus("w").is_none());
    }

    #[test]
    fn two_writers_rejected_at_build() {
        let mut b = SimulationBuilder::new();
        let x = b.add_bus("x", &wire()).unwrap();
        b.add_reactive("a", Ports::new().writes(x), reactive_fn(|_| Ok(())))
            .unwrap();
        b.add_driven("b", Ports::new().writes(x), Script::new()).unwrap();
        let err = b.build(&SimConfig::default()).err().unwrap();
        assert!(matches!(err, SimError::ConflictingWrite { .. }));
    }

    #[test]
    fn duplicate_names_rejected_immediately() {
        let mut b = SimulationBuilder::new();
        b.add_bus("x", &wire()).unwrap();
        assert!(matches!(
            b.add_bus("x", &wire()),
            Err(SimError::DuplicateBus(_))
        ));
        b.add_driven("tb", Ports::new(), Script::new()).unwrap();
        assert!(matches!(
            b.add_reactive("tb", Ports::new(), reactive_fn(|_| Ok(()))),
            Err(SimError::DuplicateProcess(_))
        ));
    }
}
