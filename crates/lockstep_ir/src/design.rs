//! The design container: every bus, signal, and process of one simulation.

use crate::arena::Arena;
use crate::bus::{Bus, SignalDecl};
use crate::error::DesignError;
use crate::ids::{BusId, ProcessId, SignalId};
use crate::process::{Access, Ports, ProcessDecl, ProcessKind};
use crate::schema::BusSchema;
use lockstep_common::{Ident, Interner};
use std::collections::{BTreeSet, HashMap};

/// Static structure of a simulated circuit.
///
/// Busses are instantiated first and own their signal declarations; processes
/// are registered afterwards against the resulting [`SignalId`]s. Nothing is
/// ever removed, so every handed-out ID stays valid.
#[derive(Debug, Default)]
pub struct Design {
    interner: Interner,
    buses: Arena<BusId, Bus>,
    signals: Arena<SignalId, SignalDecl>,
    processes: Arena<ProcessId, ProcessDecl>,
    bus_names: HashMap<Ident, BusId>,
    process_names: HashMap<Ident, ProcessId>,
}

impl Design {
    /// Creates an empty design.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates a bus named `name` from `schema`.
    ///
    /// The schema is validated and initial values are coerced to their
    /// declared types before any signal is allocated.
    pub fn add_bus(&mut self, name: &str, schema: &BusSchema) -> Result<BusId, DesignError> {
        schema.validate()?;
        let ident = self.interner.get_or_intern(name);
        if self.bus_names.contains_key(&ident) {
            return Err(DesignError::DuplicateBus(name.to_string()));
        }

        let bus_id = BusId::from_raw(self.buses.len() as u32);
        let mut signals = Vec::with_capacity(schema.signals.len());
        for spec in &schema.signals {
            // validate() already checked that every init coerces
            let init = spec.init.and_then(|v| spec.ty.coerce(v).ok());
            signals.push(self.signals.alloc(SignalDecl {
                bus: bus_id,
                name: self.interner.get_or_intern(&spec.name),
                ty: spec.ty,
                init,
            }));
        }

        let id = self.buses.alloc(Bus {
            name: ident,
            kind: schema.kind.clone(),
            signals,
        });
        self.bus_names.insert(ident, id);
        Ok(id)
    }

    /// Registers a process, resolving whole-bus ports to signal sets.
    pub fn add_process(
        &mut self,
        name: &str,
        kind: ProcessKind,
        ports: &Ports,
    ) -> Result<ProcessId, DesignError> {
        let ident = self.interner.get_or_intern(name);
        if self.process_names.contains_key(&ident) {
            return Err(DesignError::DuplicateProcess(name.to_string()));
        }
        let inputs = self.resolve(name, ports.read_accesses())?;
        let outputs = self.resolve(name, ports.write_accesses())?;

        let id = self.processes.alloc(ProcessDecl {
            name: ident,
            kind,
            inputs,
            outputs,
        });
        self.process_names.insert(ident, id);
        Ok(id)
    }

    fn resolve(&self, process: &str, accesses: &[Access]) -> Result<BTreeSet<SignalId>, DesignError> {
        let mut set = BTreeSet::new();
        for access in accesses {
            match *access {
                Access::Bus(bus) => {
                    let bus = self.buses.try_get(bus).ok_or_else(|| DesignError::UnknownBus {
                        process: process.to_string(),
                        bus: bus.to_string(),
                    })?;
                    set.extend(bus.signals.iter().copied());
                }
                Access::Signal(signal) => {
                    if !self.signals.contains(signal) {
                        return Err(DesignError::UnknownSignal(signal.to_string()));
                    }
                    set.insert(signal);
                }
            }
        }
        Ok(set)
    }

    /// Looks up a signal of `bus` by name.
    pub fn signal(&self, bus: BusId, name: &str) -> Result<SignalId, DesignError> {
        let unknown = || DesignError::UnknownSignal(format!("{bus}.{name}"));
        let bus = self.buses.try_get(bus).ok_or_else(unknown)?;
        let ident = self.interner.get(name).ok_or_else(unknown)?;
        bus.signals
            .iter()
            .copied()
            .find(|&s| self.signals[s].name == ident)
            .ok_or_else(|| {
                DesignError::UnknownSignal(format!("{}.{name}", self.interner.resolve(bus.name)))
            })
    }

    /// Looks up a signal by its `"Bus.Signal"` path.
    pub fn find_signal(&self, path: &str) -> Option<SignalId> {
        let (bus_name, signal_name) = path.split_once('.')?;
        let bus = self.find_bus(bus_name)?;
        self.signal(bus, signal_name).ok()
    }

    /// Looks up a bus by instance name.
    pub fn find_bus(&self, name: &str) -> Option<BusId> {
        let ident = self.interner.get(name)?;
        self.bus_names.get(&ident).copied()
    }

    /// Looks up a process by name.
    pub fn find_process(&self, name: &str) -> Option<ProcessId> {
        let ident = self.interner.get(name)?;
        self.process_names.get(&ident).copied()
    }

    /// Returns the bus with the given ID.
    pub fn bus(&self, id: BusId) -> &Bus {
        &self.buses[id]
    }

    /// Returns the signal declaration with the given ID.
    pub fn signal_decl(&self, id: SignalId) -> &SignalDecl {
        &self.signals[id]
    }

    /// Returns the process declaration with the given ID.
    pub fn process(&self, id: ProcessId) -> &ProcessDecl {
        &self.processes[id]
    }

    /// All busses in instantiation order.
    pub fn buses(&self) -> &Arena<BusId, Bus> {
        &self.buses
    }

    /// All signals in allocation order.
    pub fn signals(&self) -> &Arena<SignalId, SignalDecl> {
        &self.signals
    }

    /// All processes in registration order.
    pub fn processes(&self) -> &Arena<ProcessId, ProcessDecl> {
        &self.processes
    }

    /// Bus instance name.
    pub fn bus_name(&self, id: BusId) -> &str {
        self.interner.resolve(self.buses[id].name)
    }

    /// Process name.
    pub fn process_name(&self, id: ProcessId) -> &str {
        self.interner.resolve(self.processes[id].name)
    }

    /// Human-readable `"Bus.Signal"` path.
    pub fn signal_path(&self, id: SignalId) -> String {
        let decl = &self.signals[id];
        format!(
            "{}.{}",
            self.bus_name(decl.bus),
            self.interner.resolve(decl.name)
        )
    }

    /// Bare signal name without the bus prefix.
    pub fn signal_name(&self, id: SignalId) -> &str {
        self.interner.resolve(self.signals[id].name)
    }

    /// The design's name table.
    pub fn interner(&self) -> &Interner {
        &self.interner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use lockstep_common::{SignalType, Value};

    fn input_schema() -> BusSchema {
        BusSchema::new("Input")
            .signal("Valid", SignalType::Bool, Some(Value::Bool(false)))
            .signal("NextValue", SignalType::Signed { width: 32 }, None)
    }

    #[test]
    fn add_bus_allocates_signals_in_order() {
        let mut design = Design::new();
        let bus = design.add_bus("In", &input_schema()).unwrap();
        assert_eq!(design.bus(bus).signals.len(), 2);
        let valid = design.signal(bus, "Valid").unwrap();
        let next = design.signal(bus, "NextValue").unwrap();
        assert!(valid < next);
        assert_eq!(design.signal_path(next), "In.NextValue");
        assert_eq!(design.signal_decl(valid).init, Some(Value::Bool(false)));
        assert_eq!(design.bus(bus).kind, "Input");
    }

    #[test]
    fn same_schema_twice_gives_distinct_signals() {
        let mut design = Design::new();
        let a = design.add_bus("A", &input_schema()).unwrap();
        let b = design.add_bus("B", &input_schema()).unwrap();
        assert_ne!(
            design.signal(a, "Valid").unwrap(),
            design.signal(b, "Valid").unwrap()
        );
        assert_eq!(design.signals().len(), 4);
    }

    #[test]
    fn init_is_coerced_to_declared_type() {
        let schema = BusSchema::new("Byte").signal(
            "Data",
            SignalType::Unsigned { width: 8 },
            Some(Value::Signed(12)),
        );
        let mut design = Design::new();
        let bus = design.add_bus("B", &schema).unwrap();
        let data = design.signal(bus, "Data").unwrap();
        assert_eq!(design.signal_decl(data).init, Some(Value::Unsigned(12)));
    }

    #[test]
    fn duplicate_bus_rejected() {
        let mut design = Design::new();
        design.add_bus("In", &input_schema()).unwrap();
        let err = design.add_bus("In", &input_schema()).unwrap_err();
        assert_eq!(err, DesignError::DuplicateBus("In".into()));
    }

    #[test]
    fn invalid_schema_rejected() {
        let mut design = Design::new();
        let err = design.add_bus("Empty", &BusSchema::new("Nothing")).unwrap_err();
        assert!(matches!(err, DesignError::Schema(SchemaError::Empty { .. })));
        assert!(design.buses().is_empty());
    }

    #[test]
    fn process_ports_resolve_to_signal_sets() {
        let mut design = Design::new();
        let input = design.add_bus("In", &input_schema()).unwrap();
        let output = design.add_bus("Out", &input_schema()).unwrap();
        let out_valid = design.signal(output, "Valid").unwrap();
        let p = design
            .add_process(
                "inc",
                ProcessKind::Reactive,
                &Ports::new().reads(input).writes_signal(out_valid),
            )
            .unwrap();
        let decl = design.process(p);
        assert_eq!(decl.inputs.len(), 2);
        assert_eq!(decl.outputs.iter().copied().collect::<Vec<_>>(), vec![out_valid]);
        assert_eq!(design.process_name(p), "inc");
        assert_eq!(design.find_process("inc"), Some(p));
    }

    #[test]
    fn duplicate_process_rejected() {
        let mut design = Design::new();
        design
            .add_process("tb", ProcessKind::Driven, &Ports::new())
            .unwrap();
        let err = design
            .add_process("tb", ProcessKind::Reactive, &Ports::new())
            .unwrap_err();
        assert_eq!(err, DesignError::DuplicateProcess("tb".into()));
    }

    #[test]
    fn foreign_handles_rejected() {
        let mut design = Design::new();
        let err = design
            .add_process("p", ProcessKind::Reactive, &Ports::new().reads(BusId::from_raw(9)))
            .unwrap_err();
        assert!(matches!(err, DesignError::UnknownBus { .. }));
        let err = design
            .add_process(
                "q",
                ProcessKind::Reactive,
                &Ports::new().writes_signal(SignalId::from_raw(3)),
            )
            .unwrap_err();
        assert!(matches!(err, DesignError::UnknownSignal(_)));
    }

    #[test]
    fn path_lookup() {
        let mut design = Design::new();
        let bus = design.add_bus("In", &input_schema()).unwrap();
        let next = design.signal(bus, "NextValue").unwrap();
        assert_eq!(design.find_signal("In.NextValue"), Some(next));
        assert_eq!(design.find_signal("In.Missing"), None);
        assert_eq!(design.find_signal("NoDot"), None);
        assert!(design.signal(bus, "Missing").is_err());
    }
}
